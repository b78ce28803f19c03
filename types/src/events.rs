pub mod client;
pub mod server;

use client::*;
use server::*;

/// Commands sent from the client to the coaching backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "frame")]
    Frame(FrameEvent),
    #[serde(rename = "chat")]
    Chat(ChatEvent),
    #[serde(rename = "start_recording")]
    StartRecording,
    #[serde(rename = "stop_recording")]
    StopRecording,
    #[serde(rename = "audio_complete")]
    AudioComplete(AudioCompleteEvent),
    #[serde(rename = "request_new_topic")]
    RequestNewTopic,
}

impl ClientEvent {
    pub fn frame(data: impl Into<String>) -> Self {
        Self::Frame(FrameEvent::new(data.into()))
    }

    pub fn chat(message: impl Into<String>) -> Self {
        Self::Chat(ChatEvent::new(message.into()))
    }

    pub fn audio_complete(data: impl Into<String>) -> Self {
        Self::AudioComplete(AudioCompleteEvent::new(data.into()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Frame(_) => "frame",
            Self::Chat(_) => "chat",
            Self::StartRecording => "start_recording",
            Self::StopRecording => "stop_recording",
            Self::AudioComplete(_) => "audio_complete",
            Self::RequestNewTopic => "request_new_topic",
        }
    }
}

/// Events pushed by the coaching backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "emotion_update")]
    EmotionUpdate(EmotionUpdateEvent),
    #[serde(rename = "topic_assigned")]
    TopicAssigned(TopicAssignedEvent),
    #[serde(rename = "recording_started")]
    RecordingStarted,
    #[serde(rename = "recording_stopped")]
    RecordingStopped,
    #[serde(rename = "analysis_complete")]
    AnalysisComplete(AnalysisCompleteEvent),
    #[serde(rename = "transcription_complete")]
    TranscriptionComplete(TranscriptionCompleteEvent),
    #[serde(rename = "chat_response", alias = "gpt_response")]
    ChatResponse(ChatResponseEvent),
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "session_ended")]
    SessionEnded(SessionEndedEvent),
}

impl ServerEvent {
    /// Every discriminant the client understands, aliases included.
    pub const KNOWN_TYPES: &'static [&'static str] = &[
        "emotion_update",
        "topic_assigned",
        "recording_started",
        "recording_stopped",
        "analysis_complete",
        "transcription_complete",
        "chat_response",
        "gpt_response",
        "error",
        "session_ended",
    ];

    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmotionUpdate(_) => "emotion_update",
            Self::TopicAssigned(_) => "topic_assigned",
            Self::RecordingStarted => "recording_started",
            Self::RecordingStopped => "recording_stopped",
            Self::AnalysisComplete(_) => "analysis_complete",
            Self::TranscriptionComplete(_) => "transcription_complete",
            Self::ChatResponse(_) => "chat_response",
            Self::Error(_) => "error",
            Self::SessionEnded(_) => "session_ended",
        }
    }
}
