//! Wire codec for the session socket.
//!
//! Outbound commands and inbound events travel as JSON text frames tagged by a
//! `type` field. Decoding never panics: anything the client does not
//! understand comes back as a [`CodecError`] for the caller to drop.

use serde_json::Value;

use crate::events::{ClientEvent, ServerEvent};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame is not valid JSON: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("frame has no `type` discriminant")]
    MissingType,
    #[error("unrecognized message type: {0}")]
    UnknownType(String),
    #[error("invalid `{kind}` payload: {source}")]
    InvalidPayload {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode `{kind}` command: {source}")]
    Encode {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

pub fn encode(event: &ClientEvent) -> Result<String, CodecError> {
    serde_json::to_string(event).map_err(|source| CodecError::Encode {
        kind: event.kind(),
        source,
    })
}

pub fn decode(text: &str) -> Result<ServerEvent, CodecError> {
    let value: Value = serde_json::from_str(text).map_err(CodecError::Malformed)?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingType)?
        .to_string();
    if !ServerEvent::KNOWN_TYPES.contains(&kind.as_str()) {
        return Err(CodecError::UnknownType(kind));
    }
    serde_json::from_value(value).map_err(|source| CodecError::InvalidPayload { kind, source })
}
