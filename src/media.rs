//! Outbound media: the periodic frame tick and command-driven recordings.
//!
//! Frames are never queued. A tick either sends the newest frame right now or
//! sends nothing, so a slow or absent connection costs no memory and never
//! delivers stale images later.

#[cfg(feature = "utils")]
mod frame;
#[cfg(feature = "utils")]
mod microphone;

#[cfg(test)]
use mockall::automock;

use crate::error::{CaptureError, SessionError};
use crate::types::ClientEvent;

#[cfg(feature = "utils")]
pub use frame::{LatestFrame, RawFrame};

/// Source of camera frames, polled once per tick.
#[cfg_attr(test, automock)]
pub trait FrameSource: Send {
    /// The newest frame as a JPEG data URL, or `None` when none is ready.
    fn capture(&mut self) -> Option<String>;

    fn release(&mut self);
}

/// A microphone that records one clip at a time.
#[cfg_attr(test, automock)]
pub trait AudioCapture: Send {
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Ends the clip and returns it as a base64 data URL.
    fn stop(&mut self) -> Result<String, CaptureError>;

    fn set_muted(&mut self, muted: bool);

    fn release(&mut self);
}

/// Chat-only sessions run without a camera.
pub struct NoCamera;

impl FrameSource for NoCamera {
    fn capture(&mut self) -> Option<String> {
        None
    }

    fn release(&mut self) {}
}

pub struct NoMicrophone;

impl AudioCapture for NoMicrophone {
    fn start(&mut self) -> Result<(), CaptureError> {
        Err(CaptureError::Device("no microphone configured".to_string()))
    }

    fn stop(&mut self) -> Result<String, CaptureError> {
        Err(CaptureError::Device("no microphone configured".to_string()))
    }

    fn set_muted(&mut self, _muted: bool) {}

    fn release(&mut self) {}
}

/// Outcome of one frame tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Frame(ClientEvent),
    /// Not connected or capture disabled; the device was not touched.
    Skipped,
    /// Capture ran but the camera had nothing new.
    NotReady,
}

/// Gate for every frame tick.
pub fn should_capture(connected: bool, capture_enabled: bool) -> bool {
    connected && capture_enabled
}

pub struct MediaScheduler {
    frames: Box<dyn FrameSource>,
    audio: Box<dyn AudioCapture>,
    capture_enabled: bool,
    recording: bool,
    released: bool,
}

impl MediaScheduler {
    pub fn new(frames: impl FrameSource + 'static, audio: impl AudioCapture + 'static) -> Self {
        Self {
            frames: Box::new(frames),
            audio: Box::new(audio),
            capture_enabled: true,
            recording: false,
            released: false,
        }
    }

    /// No camera and no microphone.
    pub fn disabled() -> Self {
        Self::new(NoCamera, NoMicrophone)
    }

    pub fn capture_enabled(&self) -> bool {
        self.capture_enabled
    }

    pub fn set_capture_enabled(&mut self, enabled: bool) {
        self.capture_enabled = enabled;
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.audio.set_muted(muted);
    }

    pub fn on_tick(&mut self, connected: bool) -> Tick {
        if !should_capture(connected, self.capture_enabled) {
            return Tick::Skipped;
        }
        match self.frames.capture() {
            Some(data) => Tick::Frame(ClientEvent::frame(data)),
            None => Tick::NotReady,
        }
    }

    pub fn start_recording(&mut self) -> Result<(), SessionError> {
        if self.recording {
            return Err(SessionError::AlreadyRecording);
        }
        self.audio.start()?;
        self.recording = true;
        Ok(())
    }

    /// Finishes the active recording as exactly one `audio_complete` command.
    pub fn stop_recording(&mut self) -> Result<ClientEvent, SessionError> {
        if !self.recording {
            return Err(SessionError::NotRecording);
        }
        self.recording = false;
        let data = self.audio.stop()?;
        Ok(ClientEvent::audio_complete(data))
    }

    /// Releases both devices. Safe to call more than once.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.recording = false;
        self.audio.release();
        self.frames.release();
        tracing::debug!("capture devices released");
    }
}

impl Drop for MediaScheduler {
    fn drop(&mut self) {
        self.release();
    }
}
