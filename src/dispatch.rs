//! State transitions.
//!
//! Every change to [`SessionState`] goes through one of these functions:
//! [`dispatch`] for server events, the `on_*` functions for connection
//! lifecycle and local intents.

use crate::state::{ChatEntry, ChatRole, SessionState};
use crate::types::ServerEvent;

pub const CONNECTION_LOST: &str = "Connection lost unexpectedly. Check backend server.";
pub const TRANSPORT_ERROR: &str = "WebSocket connection error.";
pub const ANALYZING: &str = "Analyzing your performance...";
pub const ANALYSIS_FALLBACK: &str = "Analysis complete.";
/// Stand-in for a recording whose transcript has not arrived yet.
pub const PROCESSING_AUDIO: &str = "[Processing audio...]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Updated,
}

impl Transition {
    pub fn changed(self) -> bool {
        self == Transition::Updated
    }
}

pub fn dispatch(state: &mut SessionState, event: ServerEvent) -> Transition {
    match event {
        ServerEvent::EmotionUpdate(data) => {
            state.emotion = Some(data.into_data());
        }
        ServerEvent::TopicAssigned(data) => {
            let topic = data.into_topic();
            state.chat.push(ChatEntry::system(format!(
                "New topic: {} ({}, {})",
                topic.text(),
                topic.category(),
                topic.difficulty()
            )));
            state.topic = Some(topic);
        }
        // Acknowledgment only; the local recording flag is already set.
        ServerEvent::RecordingStarted => return Transition::Unchanged,
        ServerEvent::RecordingStopped => {
            state.processing = true;
            state.chat.push(ChatEntry::system(ANALYZING));
        }
        ServerEvent::AnalysisComplete(data) => {
            state.processing = false;
            let feedback = data.feedback().unwrap_or(ANALYSIS_FALLBACK);
            state.chat.push(ChatEntry::assistant(feedback));
        }
        ServerEvent::TranscriptionComplete(data) => {
            remove_placeholders(state);
            state
                .chat
                .push(ChatEntry::user(data.transcript()).with_timestamp(data.timestamp()));
        }
        ServerEvent::ChatResponse(data) => {
            state
                .chat
                .push(ChatEntry::assistant(data.message()).with_timestamp(data.timestamp()));
        }
        ServerEvent::Error(data) => {
            state.error = Some(data.message().to_string());
        }
        ServerEvent::SessionEnded(data) => {
            let text = match data.summary().and_then(|summary| summary.dominant_emotion()) {
                Some(dominant) => format!("Session ended. Dominant emotion: {}.", dominant),
                None => "Session ended.".to_string(),
            };
            state.chat.push(ChatEntry::system(text));
        }
    }
    Transition::Updated
}

fn remove_placeholders(state: &mut SessionState) {
    state
        .chat
        .retain(|entry| !(entry.role == ChatRole::User && entry.content == PROCESSING_AUDIO));
}

/// The socket opened: history restarts from the welcome entry.
pub fn on_open(state: &mut SessionState, welcome: &str) {
    state.connected = true;
    state.error = None;
    state.chat = vec![ChatEntry::system(welcome)];
}

pub fn on_close(state: &mut SessionState, clean: bool) {
    state.connected = false;
    if !clean {
        state.error = Some(CONNECTION_LOST.to_string());
    }
}

pub fn on_transport_error(state: &mut SessionState) {
    state.error = Some(TRANSPORT_ERROR.to_string());
}

pub fn on_connect_failed(state: &mut SessionState, reason: &str) {
    state.connected = false;
    state.error = Some(format!("Unable to reach the coaching server: {}", reason));
}

pub fn on_user_chat(state: &mut SessionState, text: &str) {
    state.chat.push(ChatEntry::user(text));
}

pub fn on_recording(state: &mut SessionState, recording: bool) {
    state.recording = recording;
}

/// The recording was uploaded; its transcript replaces the placeholder later.
pub fn on_audio_sent(state: &mut SessionState) {
    state.chat.push(ChatEntry::user(PROCESSING_AUDIO));
}

pub fn on_capture_error(state: &mut SessionState, message: &str) {
    state.capture_error = Some(message.to_string());
}
