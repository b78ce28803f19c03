use crate::client::ConfigError;
use crate::types::CodecError;

/// Failures of the local camera / microphone. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("camera / mic access denied")]
    Denied,
    #[error("capture device error: {0}")]
    Device(String),
    #[error("failed to encode capture: {0}")]
    Encode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("not connected")]
    NotConnected,
    #[error("outbound channel is full")]
    Backpressure,
    #[error("message is empty")]
    EmptyMessage,
    #[error("a recording is already in progress")]
    AlreadyRecording,
    #[error("no recording in progress")]
    NotRecording,
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("session task has stopped")]
    Closed,
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}
