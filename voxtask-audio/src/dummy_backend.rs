use crate::error::VoiceError;
use crate::traits::{AudioCapture, CaptureConfig, SampleStream};

/// Stand-in microphone backend for builds without the `backend-cpal`
/// feature. Push-fed capture still works in such builds.
pub struct DummyAudioCapture;

impl DummyAudioCapture {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyAudioCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCapture for DummyAudioCapture {
    fn start(&mut self, _config: &CaptureConfig) -> Result<SampleStream, VoiceError> {
        Err(VoiceError::UnsupportedEnvironment(
            "microphone capture is not compiled in (missing 'backend-cpal' feature)".into(),
        ))
    }
}
