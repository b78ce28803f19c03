//! Microphone capture for one recording at a time.
//!
//! `cpal::Stream` is not `Send` on every host, so the stream lives on its own
//! thread for as long as the device is open. The handle only flips flags and
//! drains the shared sample buffer, which keeps it `Send`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::StreamConfig;

use crate::audio;
use crate::device;

#[derive(Default)]
struct Shared {
    samples: Mutex<Vec<f32>>,
    recording: AtomicBool,
    muted: AtomicBool,
}

struct Worker {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
    sample_rate: u32,
}

pub struct Microphone {
    device_name: Option<String>,
    shared: Arc<Shared>,
    worker: Option<Worker>,
}

impl Microphone {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            shared: Arc::new(Shared::default()),
            worker: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    /// Opens the input device. A no-op when it is already open.
    pub fn open(&mut self) -> anyhow::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = mpsc::channel::<anyhow::Result<u32>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let shared = self.shared.clone();
        let device_name = self.device_name.clone();

        let handle = std::thread::Builder::new()
            .name("microphone".to_string())
            .spawn(move || {
                let stream = match build_stream(device_name.as_deref(), shared) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Returns once the handle hangs up.
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::debug!("microphone stream closed");
            })?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("microphone thread exited before reporting"))??;
        tracing::info!("microphone open at {} Hz", sample_rate);

        self.worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
            sample_rate,
        });
        Ok(())
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        self.open()?;
        if let Ok(mut samples) = self.shared.samples.lock() {
            samples.clear();
        }
        self.shared.recording.store(true, Ordering::Release);
        Ok(())
    }

    /// Ends the recording and returns it as a WAV data URL.
    pub fn stop(&mut self) -> anyhow::Result<String> {
        self.shared.recording.store(false, Ordering::Release);
        let sample_rate = self
            .worker
            .as_ref()
            .map(|worker| worker.sample_rate)
            .ok_or_else(|| anyhow::anyhow!("microphone is not open"))?;
        let samples = match self.shared.samples.lock() {
            Ok(mut samples) => std::mem::take(&mut *samples),
            Err(_) => return Err(anyhow::anyhow!("microphone buffer poisoned")),
        };
        audio::encode_recording(&samples, sample_rate)
    }

    /// Muted input is recorded as silence.
    pub fn set_muted(&self, muted: bool) {
        self.shared.muted.store(muted, Ordering::Release);
    }

    /// Closes the device. Any recording in progress is discarded.
    pub fn release(&mut self) {
        self.shared.recording.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            drop(worker.shutdown);
            if worker.handle.join().is_err() {
                tracing::error!("microphone thread panicked");
            }
        }
    }
}

impl Drop for Microphone {
    fn drop(&mut self) {
        self.release();
    }
}

fn build_stream(device_name: Option<&str>, shared: Arc<Shared>) -> anyhow::Result<(cpal::Stream, u32)> {
    let input = device::get_or_default_input(device_name)?;
    tracing::info!("Using input device: {:?}", input.name()?);

    let input_config: StreamConfig = input.default_input_config()?.config();
    let channels = input_config.channels as usize;
    let sample_rate = input_config.sample_rate.0;

    let input_data_fn = move |data: &[f32], _: &cpal::InputCallbackInfo| {
        if !shared.recording.load(Ordering::Acquire) {
            return;
        }
        let mono = audio::downmix(data, channels);
        let muted = shared.muted.load(Ordering::Acquire);
        if let Ok(mut samples) = shared.samples.lock() {
            if muted {
                let len = samples.len() + mono.len();
                samples.resize(len, 0.0);
            } else {
                samples.extend_from_slice(&mono);
            }
        }
    };

    let stream = input.build_input_stream(
        &input_config,
        input_data_fn,
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, sample_rate))
}
