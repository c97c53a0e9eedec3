//! Voice capture pipeline: adaptive voice-activity detection over a live
//! audio stream, chunked streaming transcription through a serialized
//! queue, and session control that decides when the speaker has finished.
//!
//! This crate is a library for a UI shell to embed:
//! - capture backends live behind the [`traits::AudioCapture`] capability
//!   trait (`cpal` microphone with feature `backend-cpal`, push-fed for
//!   embedders and tests)
//! - [`analyzer`] and [`vad`] turn the stream into speech/silence state
//! - [`scheduler`] serializes engine calls and emits ordered partials
//! - [`completion`] scores partial transcripts for utterance completeness
//! - [`session`] orchestrates all of it behind start/stop/natural-pause

pub mod analyzer;
pub mod completion;
pub mod error;
pub mod push_backend;
pub mod scheduler;
pub mod session;
pub mod traits;
pub mod transcription;
pub mod types;
pub mod utils;
pub mod vad;

#[cfg(feature = "backend-cpal")]
pub mod cpal_backend;

#[cfg(not(feature = "backend-cpal"))]
pub mod dummy_backend;

pub use error::VoiceError;
pub use session::{SessionConfig, VoiceSessionController};
pub use transcription::{TranscribeOptions, TranscriptionEngine, WhisperEngine};
pub use types::{SessionState, TranscriptionResult, VoiceEvent};

#[cfg(feature = "backend-cpal")]
pub use cpal_backend::CpalAudioCapture as MicrophoneCapture;

#[cfg(not(feature = "backend-cpal"))]
pub use dummy_backend::DummyAudioCapture as MicrophoneCapture;
