/// Image data encoded as a base64 data URL (`data:image/jpeg;base64,...`)
pub type Base64EncodedFrame = String;

/// Audio data encoded as a base64 data URL (`data:audio/wav;base64,...`)
pub type Base64EncodedAudio = String;
