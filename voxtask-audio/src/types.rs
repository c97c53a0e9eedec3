use std::time::Duration;

/// One spectral analysis tick: RMS volume plus smoothed magnitude bins.
/// Produced and consumed within a single processing cycle, never stored.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub volume: f32,
    pub frequency_bins: Vec<f32>,
}

/// A fixed-duration slice of captured audio awaiting transcription.
/// 16 kHz mono f32 samples; `seq` is the submission order.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub seq: u64,
    pub samples: Vec<f32>,
}

/// Live voice-activity state for the running session.
///
/// Exactly one of `speech_duration` / `silence_duration` accumulates at any
/// moment; the other holds whatever value its phase ended with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VadSnapshot {
    pub is_speaking: bool,
    pub volume: f32,
    pub confidence: f32,
    pub background_noise: f32,
    pub speech_duration: Duration,
    pub silence_duration: Duration,
}

/// A timed span of transcribed text. `words`, when an engine provides it,
/// carries the same shape at word granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    /// Start offset in seconds from the beginning of the transcribed audio.
    pub start: f32,
    /// End offset in seconds.
    pub end: f32,
    pub text: String,
    pub confidence: f32,
    pub words: Option<Vec<TranscriptSegment>>,
}

/// Output of one transcription call.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub text: String,
    pub confidence: f32,
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
}

/// Where the session currently is.
///
/// `Error` is transient: the controller falls back to `Idle` after a short
/// display hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Listening,
    Thinking,
    Error,
}

/// Everything a consumer can observe about a running session.
///
/// `Partial` results supersede the previous partial (they are re-readings
/// of the stream so far, not increments); `Final` arrives once per session.
#[derive(Debug, Clone)]
pub enum VoiceEvent {
    State(SessionState),
    SpeechStarted,
    SpeechEnded,
    Level { volume: f32, confidence: f32 },
    Partial(TranscriptionResult),
    Final(TranscriptionResult),
    Error(String),
}
