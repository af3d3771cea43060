// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod protocol;
pub mod state;
pub mod types;
pub mod ws;
