//! Wire encodings
//!
//! Every connection picks one codec when it upgrades (`?format=json` or
//! `?format=packed`). Server code only ever deals with the typed
//! `ClientMessage`/`ServerMessage` values from `protocol`.

mod packed;

pub use packed::PackedCodec;

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u64),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("empty frame")]
    Empty,
    #[error("unknown message tag {0:?}")]
    UnknownTag(String),
    #[error("malformed field {0:?}")]
    BadField(String),
    #[error("unexpected end of frame")]
    UnexpectedEnd,
    #[error("trailing data after message")]
    TrailingData,
}

/// Turns typed messages into text frames and back
pub trait WireCodec: Send + Sync {
    fn encode(&self, msg: &ServerMessage) -> Result<String, CodecError>;
    fn decode(&self, frame: &str) -> Result<ClientMessage, CodecError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    #[default]
    Json,
    Packed,
}

impl WireFormat {
    pub fn codec(self) -> Box<dyn WireCodec> {
        match self {
            WireFormat::Json => Box::new(JsonCodec),
            WireFormat::Packed => Box::new(PackedCodec),
        }
    }
}

/// Tagged JSON objects carrying a protocol version field `v`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    fn wrap<T: serde::Serialize>(msg: &T) -> Result<String, CodecError> {
        let mut value = serde_json::to_value(msg)?;
        let object = value.as_object_mut().ok_or(CodecError::NotAnObject)?;
        object.insert("v".to_string(), Value::from(PROTOCOL_VERSION));
        Ok(value.to_string())
    }

    fn unwrap<T: serde::de::DeserializeOwned>(frame: &str) -> Result<T, CodecError> {
        let mut value: Value = serde_json::from_str(frame)?;
        let object = value.as_object_mut().ok_or(CodecError::NotAnObject)?;

        // Frames without a version are treated as the current one
        if let Some(v) = object.remove("v") {
            let version = v.as_u64().ok_or_else(|| CodecError::BadField(v.to_string()))?;
            if version != u64::from(PROTOCOL_VERSION) {
                return Err(CodecError::UnsupportedVersion(version));
            }
        }

        drop_malformed_pairs(object);
        Ok(serde_json::from_value(value)?)
    }

    /// Client side of the codec
    pub fn encode_client(&self, msg: &ClientMessage) -> Result<String, CodecError> {
        Self::wrap(msg)
    }

    pub fn decode_server(&self, frame: &str) -> Result<ServerMessage, CodecError> {
        Self::unwrap(frame)
    }
}

/// `submit_profile` pairs whose id is not an `i32` or whose answer is not a
/// string are removed from both lists, so the rest of the profile survives.
/// Only the common prefix of the two lists is looked at, as that is all the
/// server pairs up anyway.
fn drop_malformed_pairs(object: &mut Map<String, Value>) {
    if object.get("t").and_then(Value::as_str) != Some("submit_profile") {
        return;
    }
    let (Some(Value::Array(ids)), Some(Value::Array(answers))) =
        (object.get("question_ids"), object.get("answers"))
    else {
        return;
    };

    let valid_id = |id: &Value| id.as_i64().is_some_and(|n| i32::try_from(n).is_ok());
    let pairs = ids.iter().zip(answers);
    if pairs.clone().all(|(id, answer)| valid_id(id) && answer.is_string()) {
        return;
    }

    let (kept_ids, kept_answers): (Vec<Value>, Vec<Value>) = pairs
        .filter(|(id, answer)| {
            let keep = valid_id(*id) && answer.is_string();
            if !keep {
                tracing::debug!("Dropping malformed profile entry: {} => {}", id, answer);
            }
            keep
        })
        .map(|(id, answer)| (id.clone(), answer.clone()))
        .unzip();

    object.insert("question_ids".to_string(), Value::Array(kept_ids));
    object.insert("answers".to_string(), Value::Array(kept_answers));
}

impl WireCodec for JsonCodec {
    fn encode(&self, msg: &ServerMessage) -> Result<String, CodecError> {
        Self::wrap(msg)
    }

    fn decode(&self, frame: &str) -> Result<ClientMessage, CodecError> {
        Self::unwrap(frame)
    }
}
