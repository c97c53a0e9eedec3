//! Push-fed capture backend.
//!
//! Lets an embedding shell (or a test) hand samples to the pipeline from
//! its own audio source. The source half is cloneable so it can live on
//! whatever thread produces the audio.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::warn;

use crate::error::VoiceError;
use crate::traits::{AudioCapture, CaptureConfig, SampleStream, StreamGuard};
use crate::utils::resample_to_16khz;

/// Producer half: call [`push`](PushAudioSource::push) with raw samples at
/// the rate given at construction.
#[derive(Clone)]
pub struct PushAudioSource {
    sample_rate: u32,
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<f32>>>>>,
}

impl PushAudioSource {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// Feed samples into the active stream. Dropped silently while no
    /// session is listening.
    pub fn push(&self, samples: &[f32]) {
        let guard = self.sender.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            let samples = resample_to_16khz(samples, self.sample_rate);
            if tx.send(samples).is_err() {
                warn!("push source: session stream closed");
            }
        }
    }
}

/// Backend half handed to the session controller.
pub struct PushAudioCapture {
    source: PushAudioSource,
}

impl PushAudioCapture {
    pub fn new(source: PushAudioSource) -> Self {
        Self { source }
    }
}

impl AudioCapture for PushAudioCapture {
    fn start(&mut self, _config: &CaptureConfig) -> Result<SampleStream, VoiceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.source.sender.lock().unwrap() = Some(tx);

        let sender = self.source.sender.clone();
        let guard = StreamGuard::new(move || {
            sender.lock().unwrap().take();
        });
        Ok(SampleStream::new(16_000, rx, guard))
    }
}

/// Create a paired source and capture backend.
pub fn push_capture(sample_rate: u32) -> (PushAudioSource, PushAudioCapture) {
    let source = PushAudioSource::new(sample_rate);
    let capture = PushAudioCapture::new(source.clone());
    (source, capture)
}
