//! Speech-to-text engine boundary and the Whisper implementation.
//!
//! The engine is constructed and initialized by the caller and injected
//! into the session controller — nothing here is created at load time, and
//! a test double slots in wherever a [`TranscriptionEngine`] is expected.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use tracing::info;

use crate::error::VoiceError;
use crate::types::{TranscriptSegment, TranscriptionResult};

/// whisper.cpp exposes no usable per-utterance confidence; a stable nominal
/// value keeps downstream blending on a consistent scale.
const NOMINAL_CONFIDENCE: f32 = 0.9;

/// Consecutive repeats of a phrase before it is treated as a decoding loop.
const LOOP_MIN_REPEATS: usize = 3;

/// Shortest phrase, in words, considered for loop detection.
const LOOP_MIN_WORDS: usize = 3;

static INSTALL_WHISPER_LOG_HOOKS: Once = Once::new();

/// Per-call transcription options.
#[derive(Debug, Clone, Default)]
pub struct TranscribeOptions {
    /// Language hint, e.g. "en". None lets the engine decide.
    pub language: Option<String>,
    /// Request segment timestamps in the result.
    pub want_timestamps: bool,
}

/// An asynchronous speech-to-text engine.
///
/// The scheduler guarantees calls are never issued concurrently, so
/// implementations don't need their own serialization.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Load models or otherwise prepare the engine. Must complete before
    /// the first `transcribe` call.
    async fn initialize(&mut self) -> Result<(), VoiceError>;

    /// Transcribe 16 kHz mono f32 samples.
    async fn transcribe(
        &self,
        samples: &[f32],
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResult, VoiceError>;
}

/// Local transcription over a whisper.cpp GGML model.
pub struct WhisperEngine {
    model_path: PathBuf,
    context: Option<Arc<whisper_rs::WhisperContext>>,
}

impl WhisperEngine {
    /// `model_path` points at a GGML model file (e.g. `ggml-base.en.bin`).
    /// Nothing is loaded until [`TranscriptionEngine::initialize`].
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            context: None,
        }
    }

    pub fn is_model_available(&self) -> bool {
        self.model_path.exists()
    }

    /// Release the loaded model. The engine can be re-initialized later.
    pub fn cleanup(&mut self) {
        self.context = None;
    }
}

#[async_trait]
impl TranscriptionEngine for WhisperEngine {
    async fn initialize(&mut self) -> Result<(), VoiceError> {
        if self.context.is_some() {
            return Ok(());
        }
        if !self.model_path.exists() {
            return Err(VoiceError::Transcription(format!(
                "whisper model not found at {}; download a GGML model (e.g. ggml-base.en.bin) \
                 from https://huggingface.co/ggerganov/whisper.cpp and place it there",
                self.model_path.display()
            )));
        }

        // Keep whisper.cpp's own stderr chatter out of host UIs.
        INSTALL_WHISPER_LOG_HOOKS.call_once(|| {
            whisper_rs::install_logging_hooks();
        });

        let path = self.model_path.clone();
        let context = tokio::task::spawn_blocking(move || {
            let params = whisper_rs::WhisperContextParameters::default();
            whisper_rs::WhisperContext::new_with_params(path.to_string_lossy().as_ref(), params)
        })
        .await
        .map_err(|e| VoiceError::Transcription(format!("model load task failed: {e}")))?
        .map_err(|e| VoiceError::Transcription(format!("failed to load whisper model: {e}")))?;

        info!(model = %self.model_path.display(), "whisper model loaded");
        self.context = Some(Arc::new(context));
        Ok(())
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        options: &TranscribeOptions,
    ) -> Result<TranscriptionResult, VoiceError> {
        let context = self
            .context
            .clone()
            .ok_or_else(|| VoiceError::Transcription("whisper engine not initialized".into()))?;

        // Inference is CPU-bound and can run for seconds; keep it off the
        // async executor.
        let samples = samples.to_vec();
        let options = options.clone();
        tokio::task::spawn_blocking(move || run_whisper(&context, &samples, &options))
            .await
            .map_err(|e| VoiceError::Transcription(format!("transcription task failed: {e}")))?
    }
}

fn run_whisper(
    context: &whisper_rs::WhisperContext,
    samples: &[f32],
    options: &TranscribeOptions,
) -> Result<TranscriptionResult, VoiceError> {
    let mut state = context
        .create_state()
        .map_err(|e| VoiceError::Transcription(format!("whisper state: {e}")))?;

    let mut params =
        whisper_rs::FullParams::new(whisper_rs::SamplingStrategy::Greedy { best_of: 1 });
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_special(false);
    params.set_print_timestamps(false);
    if let Some(language) = options.language.as_deref() {
        params.set_language(Some(language));
    }

    state
        .full(params, samples)
        .map_err(|e| VoiceError::Transcription(format!("whisper inference: {e}")))?;

    let mut text = String::new();
    let mut segments = Vec::new();
    for i in 0..state.full_n_segments() {
        let Some(segment) = state.get_segment(i) else {
            continue;
        };
        let segment_text = segment.to_string();
        let trimmed = segment_text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(trimmed);

        if options.want_timestamps {
            // Whisper reports centisecond offsets.
            segments.push(TranscriptSegment {
                start: segment.start_timestamp() as f32 / 100.0,
                end: segment.end_timestamp() as f32 / 100.0,
                text: trimmed.to_string(),
                confidence: NOMINAL_CONFIDENCE,
                words: None,
            });
        }
    }

    let text = collapse_repetition_loops(&text);
    let confidence = if text.is_empty() {
        0.0
    } else {
        NOMINAL_CONFIDENCE
    };

    Ok(TranscriptionResult {
        confidence,
        segments,
        language: options.language.clone().unwrap_or_else(|| "auto".to_string()),
        text,
    })
}

/// Collapse decoding-loop hallucinations — the same phrase repeated many
/// times in a row — down to a single occurrence.
pub fn collapse_repetition_loops(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() < LOOP_MIN_WORDS * LOOP_MIN_REPEATS {
        return text.to_string();
    }

    // Longer phrases first: a long loop shouldn't be chewed up piecemeal
    // by one of its sub-phrases.
    for len in (LOOP_MIN_WORDS..=words.len() / LOOP_MIN_REPEATS).rev() {
        for start in 0..=words.len() - len * LOOP_MIN_REPEATS {
            let phrase: Vec<String> = words[start..start + len]
                .iter()
                .map(|w| w.to_lowercase())
                .collect();

            let mut repeats = 1;
            while start + (repeats + 1) * len <= words.len()
                && words[start + repeats * len..start + (repeats + 1) * len]
                    .iter()
                    .map(|w| w.to_lowercase())
                    .eq(phrase.iter().cloned())
            {
                repeats += 1;
            }

            if repeats >= LOOP_MIN_REPEATS {
                let mut kept: Vec<&str> = Vec::with_capacity(words.len() - (repeats - 1) * len);
                kept.extend_from_slice(&words[..start + len]);
                kept.extend_from_slice(&words[start + repeats * len..]);
                return kept.join(" ");
            }
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initialize_reports_missing_model() {
        let mut engine = WhisperEngine::new("/nonexistent/ggml-base.en.bin");
        assert!(!engine.is_model_available());
        let err = engine.initialize().await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn transcribe_requires_initialization() {
        let engine = WhisperEngine::new("/nonexistent/ggml-base.en.bin");
        let err = engine
            .transcribe(&[0.0; 1600], &TranscribeOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }

    #[test]
    fn repetition_loop_is_collapsed() {
        let text = "and I think that's the point and I think that's the point \
                    and I think that's the point and I think that's the point";
        let out = collapse_repetition_loops(text);
        assert_eq!(out.matches("I think").count(), 1);
    }

    #[test]
    fn text_around_the_loop_survives() {
        let text = "first move the meeting. this is fine this is fine this is fine then call back";
        let out = collapse_repetition_loops(text);
        assert!(out.starts_with("first move the meeting."));
        assert!(out.ends_with("then call back"));
        assert_eq!(out.matches("this is fine").count(), 1);
    }

    #[test]
    fn normal_text_is_untouched() {
        let text = "remind me to water the plants on thursday before lunch please";
        assert_eq!(collapse_repetition_loops(text), text);
    }

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(collapse_repetition_loops("done done done"), "done done done");
    }

    #[test]
    fn two_repeats_are_not_a_loop() {
        let text = "I said it twice I said it twice and that is all right";
        assert_eq!(collapse_repetition_loops(text), text);
    }
}
