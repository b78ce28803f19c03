use std::sync::{Arc, Mutex};

use crate::media::FrameSource;
use crate::utils::frame::{encode_jpeg, FRAME_QUALITY};

/// One uncompressed camera image, packed RGB8.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Single-slot mailbox between a camera and the frame tick.
///
/// The camera publishes as fast as it likes; each publish overwrites the
/// previous frame. The tick takes whatever is newest and encodes only that.
#[derive(Debug, Clone)]
pub struct LatestFrame {
    slot: Arc<Mutex<Option<RawFrame>>>,
    quality: u8,
}

impl Default for LatestFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestFrame {
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            quality: FRAME_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality;
        self
    }

    pub fn publish(&self, frame: RawFrame) {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(frame);
        }
    }
}

impl FrameSource for LatestFrame {
    fn capture(&mut self) -> Option<String> {
        let frame = self.slot.lock().ok()?.take()?;
        match encode_jpeg(frame.width, frame.height, &frame.rgb, self.quality) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("failed to encode frame: {:#}", e);
                None
            }
        }
    }

    fn release(&mut self) {
        if let Ok(mut slot) = self.slot.lock() {
            slot.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(shade: u8) -> RawFrame {
        RawFrame {
            width: 2,
            height: 2,
            rgb: vec![shade; 12],
        }
    }

    #[test]
    fn test_capture_takes_latest_once() {
        let camera = LatestFrame::new();
        let mut source = camera.clone();

        assert_eq!(source.capture(), None);

        camera.publish(frame(10));
        camera.publish(frame(200));
        assert!(source.capture().is_some());
        // Already taken; a stale frame is never sent twice.
        assert_eq!(source.capture(), None);
    }
}
