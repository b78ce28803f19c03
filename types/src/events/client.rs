use std::time::{SystemTime, UNIX_EPOCH};

use crate::media::{Base64EncodedAudio, Base64EncodedFrame};

/// `frame` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrameEvent {
    /// JPEG frame as a data URL
    data: Base64EncodedFrame,

    /// Client capture time in epoch seconds
    timestamp: f64,
}

impl FrameEvent {
    pub fn new(data: Base64EncodedFrame) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default();
        Self { data, timestamp }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }
}

/// `chat` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatEvent {
    message: String,
}

impl ChatEvent {
    pub fn new(message: String) -> Self {
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `audio_complete` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AudioCompleteEvent {
    /// One finished recording
    data: Base64EncodedAudio,
}

impl AudioCompleteEvent {
    pub fn new(data: Base64EncodedAudio) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}
