//! Process configuration loaded from environment variables (and `.env`)

use crate::types::GameConfig;
use std::net::SocketAddr;
use std::str::FromStr;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5663";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub game: GameConfig,
    /// Fixed RNG seed for reproducible sessions (None = seeded from OS entropy)
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 5663)),
            game: GameConfig::default(),
            seed: None,
        }
    }
}

/// Read and parse an env var, warning and returning `None` on garbage
fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let game_defaults = defaults.game.clone();

        let listen_addr = parse_env("KNOWME_LISTEN_ADDR").unwrap_or(defaults.listen_addr);

        let round_time_seconds = parse_env::<f32>("KNOWME_ROUND_TIME_SECONDS")
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(game_defaults.round_time_seconds);

        let game = GameConfig {
            round_time_seconds,
            next_round_delay_ms: parse_env("KNOWME_NEXT_ROUND_DELAY_MS")
                .unwrap_or(game_defaults.next_round_delay_ms),
            max_answer_chars: parse_env("KNOWME_MAX_ANSWER_CHARS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(game_defaults.max_answer_chars),
            max_name_chars: parse_env("KNOWME_MAX_NAME_CHARS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(game_defaults.max_name_chars),
        };

        let seed = parse_env("KNOWME_SEED");
        if let Some(seed) = seed {
            tracing::info!("Using fixed RNG seed {}", seed);
        }

        Self {
            listen_addr,
            game,
            seed,
        }
    }
}
