use crate::error::CaptureError;
use crate::media::AudioCapture;
use crate::utils::Microphone;

impl AudioCapture for Microphone {
    fn start(&mut self) -> Result<(), CaptureError> {
        Microphone::start(self).map_err(|e| {
            tracing::error!("failed to start microphone: {:#}", e);
            CaptureError::Device(format!("{:#}", e))
        })
    }

    fn stop(&mut self) -> Result<String, CaptureError> {
        Microphone::stop(self).map_err(|e| CaptureError::Encode(format!("{:#}", e)))
    }

    fn set_muted(&mut self, muted: bool) {
        Microphone::set_muted(self, muted);
    }

    fn release(&mut self) {
        Microphone::release(self);
    }
}
