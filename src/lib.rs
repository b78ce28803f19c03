mod client;
mod error;
mod identity;

pub mod dispatch;
pub mod media;
pub mod state;

pub use polly_session_types as types;
pub use client::{
    connect, connect_with_config, Config, ConfigBuilder, ConfigError, ConnectionState, Session,
    SessionHandle, Stats,
};
pub use error::{CaptureError, SessionError};
pub use identity::SessionIdentity;
pub use media::{AudioCapture, FrameSource, MediaScheduler, NoCamera, NoMicrophone};
pub use state::{ChatEntry, ChatRole, SessionState};

#[cfg(feature = "utils")]
pub use polly_session_utils as utils;
