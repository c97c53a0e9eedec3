use thiserror::Error;

/// Errors surfaced by the capture pipeline.
///
/// Per-chunk transcription failures are reported as events rather than
/// returned errors, so a single bad chunk never tears down a session.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("unsupported audio environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("transcription failed: {0}")]
    Transcription(String),
}
