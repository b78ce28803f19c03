pub mod codec;
pub mod events;
pub mod media;

pub use codec::{decode, encode, CodecError};
pub use events::{ClientEvent, ServerEvent};
pub use events::server::{AnalysisResults, EmotionReading, EmotionSummary, SessionSummary, Topic};
