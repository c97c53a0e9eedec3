//! Capture capability boundary.
//!
//! The session logic only ever sees this interface, so the same pipeline
//! runs against a cpal microphone, samples pushed in by an embedding shell,
//! or a test harness.

use tokio::sync::mpsc;

use crate::error::VoiceError;

/// Requested capture parameters. Backends resample to `sample_rate`.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self { sample_rate: 16_000 }
    }
}

/// Runs the backend's teardown when the stream is released, whichever exit
/// path releases it.
pub struct StreamGuard {
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl StreamGuard {
    pub fn new(on_close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            on_close: Some(Box::new(on_close)),
        }
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        if let Some(close) = self.on_close.take() {
            close();
        }
    }
}

/// A live capture stream: batches of mono f32 samples at the negotiated
/// rate, plus the guard keeping the underlying capture alive.
pub struct SampleStream {
    pub sample_rate: u32,
    pub samples: mpsc::UnboundedReceiver<Vec<f32>>,
    guard: Option<StreamGuard>,
}

impl SampleStream {
    pub fn new(
        sample_rate: u32,
        samples: mpsc::UnboundedReceiver<Vec<f32>>,
        guard: StreamGuard,
    ) -> Self {
        Self {
            sample_rate,
            samples,
            guard: Some(guard),
        }
    }

    /// Release the underlying capture while keeping already-buffered
    /// samples readable.
    pub fn close(&mut self) {
        self.guard.take();
    }
}

/// An audio source the session controller can start capturing from.
pub trait AudioCapture: Send {
    fn start(&mut self, config: &CaptureConfig) -> Result<SampleStream, VoiceError>;
}
