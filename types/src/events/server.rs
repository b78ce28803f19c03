use std::collections::BTreeMap;

/// Accepts either a string or a numeric timestamp and keeps it as text.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(number)) => Some(number.to_string()),
        _ => None,
    })
}

/// Output of the backend's facial emotion detector for one frame.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmotionReading {
    /// `None` when no face was found in the frame
    dominant_emotion: Option<String>,

    /// Normalised score of the dominant emotion, 0.0 to 1.0
    #[serde(default)]
    confidence: f64,

    #[serde(default)]
    face_detected: bool,

    /// Normalised score per emotion label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotions: Option<BTreeMap<String, f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_timestamp")]
    timestamp: Option<String>,
}

impl EmotionReading {
    pub fn new(dominant_emotion: &str, confidence: f64, face_detected: bool) -> Self {
        Self {
            dominant_emotion: Some(dominant_emotion.to_string()),
            confidence,
            face_detected,
            emotions: None,
            timestamp: None,
        }
    }

    pub fn dominant_emotion(&self) -> Option<&str> {
        self.dominant_emotion.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn face_detected(&self) -> bool {
        self.face_detected
    }

    pub fn emotions(&self) -> Option<&BTreeMap<String, f64>> {
        self.emotions.as_ref()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// A debate topic assigned by the backend.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Topic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<u32>,

    #[serde(rename = "topic")]
    text: String,

    category: String,

    /// "easy", "medium" or "hard"
    difficulty: String,
}

impl Topic {
    pub fn new(text: &str, category: &str, difficulty: &str) -> Self {
        Self {
            id: None,
            text: text.to_string(),
            category: category.to_string(),
            difficulty: difficulty.to_string(),
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn id(&self) -> Option<u32> {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }
}

/// Result of analysing one finished recording.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    feedback: Option<String>,

    /// Voice metrics and anything else the analyser reports
    #[serde(flatten)]
    metrics: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisResults {
    pub fn with_feedback(mut self, feedback: &str) -> Self {
        self.feedback = Some(feedback.to_string());
        self
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn metrics(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.metrics
    }
}

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmotionSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dominant: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    frames_with_faces: Option<u64>,
}

impl EmotionSummary {
    pub fn dominant(&self) -> Option<&str> {
        self.dominant.as_deref()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn frames_with_faces(&self) -> Option<u64> {
        self.frames_with_faces
    }
}

/// End-of-session statistics.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_duration: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_frames: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    emotion_summary: Option<EmotionSummary>,
}

impl SessionSummary {
    pub fn session_duration(&self) -> Option<f64> {
        self.session_duration
    }

    pub fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    pub fn emotion_summary(&self) -> Option<&EmotionSummary> {
        self.emotion_summary.as_ref()
    }

    pub fn dominant_emotion(&self) -> Option<&str> {
        self.emotion_summary.as_ref().and_then(EmotionSummary::dominant)
    }
}

/// `emotion_update` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EmotionUpdateEvent {
    data: EmotionReading,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frame_number: Option<u64>,
}

impl EmotionUpdateEvent {
    pub fn new(data: EmotionReading) -> Self {
        Self { data, frame_number: None }
    }

    pub fn data(&self) -> &EmotionReading {
        &self.data
    }

    pub fn into_data(self) -> EmotionReading {
        self.data
    }

    pub fn frame_number(&self) -> Option<u64> {
        self.frame_number
    }
}

/// `topic_assigned` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TopicAssignedEvent {
    topic: Topic,
}

impl TopicAssignedEvent {
    pub fn new(topic: Topic) -> Self {
        Self { topic }
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn into_topic(self) -> Topic {
        self.topic
    }
}

/// `analysis_complete` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisCompleteEvent {
    #[serde(default)]
    results: Option<AnalysisResults>,
}

impl AnalysisCompleteEvent {
    pub fn new(results: Option<AnalysisResults>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> Option<&AnalysisResults> {
        self.results.as_ref()
    }

    pub fn feedback(&self) -> Option<&str> {
        self.results.as_ref().and_then(AnalysisResults::feedback)
    }
}

/// `transcription_complete` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptionCompleteEvent {
    transcript: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_timestamp")]
    timestamp: Option<String>,
}

impl TranscriptionCompleteEvent {
    pub fn new(transcript: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            timestamp: None,
        }
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `chat_response` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ChatResponseEvent {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_timestamp")]
    timestamp: Option<String>,
}

impl ChatResponseEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            timestamp: None,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `error` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    message: String,
}

impl ErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// `session_ended` event
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionEndedEvent {
    #[serde(default)]
    summary: Option<SessionSummary>,
}

impl SessionEndedEvent {
    pub fn new(summary: Option<SessionSummary>) -> Self {
        Self { summary }
    }

    pub fn summary(&self) -> Option<&SessionSummary> {
        self.summary.as_ref()
    }
}
