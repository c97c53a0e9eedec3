//! Voice capture session control.
//!
//! Orchestrates the analyzer, VAD, chunk assembly, and the transcription
//! scheduler, and decides when a natural pause ends the utterance. One
//! controller runs at most one capture session at a time; every exit path
//! — explicit stop, natural pause, start failure, drop — releases the
//! capture stream, the processing loop, and the worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analyzer::{AnalyzerConfig, SpectralAnalyzer};
use crate::completion::completion_confidence;
use crate::error::VoiceError;
use crate::scheduler::{SchedulerEvent, TranscriptionScheduler};
use crate::traits::{AudioCapture, CaptureConfig, SampleStream};
use crate::transcription::{TranscribeOptions, TranscriptionEngine};
use crate::types::{AudioChunk, SessionState, TranscriptionResult, VoiceEvent};
use crate::vad::{AdaptiveVad, VadConfig, VadTransition};

/// Session tuning. Everything is overridable for embedding and tests.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Duration of each streamed chunk.
    pub chunk_ms: u64,
    /// Processing tick; ~60 Hz by default.
    pub frame_interval_ms: u64,
    /// Natural-pause wait at middling completion confidence.
    pub pause_base_ms: u64,
    /// Natural-pause wait once the utterance looks finished (confidence > 0.8).
    pub pause_confident_ms: u64,
    /// Natural-pause wait while the utterance looks unfinished (confidence < 0.5).
    pub pause_hesitant_ms: u64,
    /// The pause wait never drops below this.
    pub pause_floor_ms: u64,
    /// Silence longer than this shaves `long_silence_reduction_ms` off the wait.
    pub long_silence_ms: u64,
    pub long_silence_reduction_ms: u64,
    /// How long Thinking / Error states stay visible before Idle.
    pub state_hold_ms: u64,
    /// Language hint forwarded to the engine.
    pub language: Option<String>,
    pub vad: VadConfig,
    pub analyzer: AnalyzerConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunk_ms: 800,
            frame_interval_ms: 16,
            pause_base_ms: 1_500,
            pause_confident_ms: 800,
            pause_hesitant_ms: 2_500,
            pause_floor_ms: 500,
            long_silence_ms: 2_000,
            long_silence_reduction_ms: 500,
            state_hold_ms: 500,
            language: None,
            vad: VadConfig::default(),
            analyzer: AnalyzerConfig::default(),
        }
    }
}

/// How long to wait in silence, given the current completion confidence and
/// how much silence has already accumulated, before the utterance is done.
fn natural_pause_delay(config: &SessionConfig, completion: f32, silence: Duration) -> Duration {
    let mut delay_ms = if completion > 0.8 {
        config.pause_confident_ms
    } else if completion < 0.5 {
        config.pause_hesitant_ms
    } else {
        config.pause_base_ms
    };
    if silence.as_millis() as u64 > config.long_silence_ms {
        delay_ms = delay_ms
            .saturating_sub(config.long_silence_reduction_ms)
            .max(config.pause_floor_ms);
    }
    Duration::from_millis(delay_ms)
}

enum Command {
    Stop {
        reply: oneshot::Sender<Option<TranscriptionResult>>,
    },
}

struct ActiveSession {
    cmd_tx: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

/// Drives capture sessions: `Idle → Listening → Thinking → Idle`, with
/// `Error` flashing briefly on start failures before falling back to Idle.
pub struct VoiceSessionController {
    engine: Arc<dyn TranscriptionEngine>,
    backend: Box<dyn AudioCapture>,
    config: SessionConfig,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    active: Option<ActiveSession>,
}

impl VoiceSessionController {
    /// The engine is injected already initialized; its lifetime belongs to
    /// the caller.
    pub fn new(
        engine: Arc<dyn TranscriptionEngine>,
        backend: Box<dyn AudioCapture>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        Self {
            engine,
            backend,
            config,
            state_tx,
            state_rx,
            active: None,
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Observe state changes without consuming the voice event stream.
    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state_rx.clone()
    }

    /// Begin capturing and return the session's event stream.
    ///
    /// A session already running is stopped (and fully torn down) first;
    /// there is never more than one live stream per controller.
    pub async fn start(&mut self) -> Result<mpsc::UnboundedReceiver<VoiceEvent>, VoiceError> {
        if self.active.is_some() {
            info!("session already active; stopping it before restart");
            self.stop().await;
        }

        let stream = match self.backend.start(&CaptureConfig::default()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "capture start failed");
                self.flash_error();
                return Err(e);
            }
        };

        let options = TranscribeOptions {
            language: self.config.language.clone(),
            want_timestamps: true,
        };
        let (scheduler, scheduler_events) =
            TranscriptionScheduler::spawn(self.engine.clone(), options);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        self.state_tx.send_replace(SessionState::Listening);
        let _ = event_tx.send(VoiceEvent::State(SessionState::Listening));

        let task = tokio::spawn(run_session(
            self.config.clone(),
            stream,
            scheduler,
            scheduler_events,
            event_tx,
            self.state_tx.clone(),
            cmd_rx,
        ));

        self.active = Some(ActiveSession { cmd_tx, task });
        Ok(event_rx)
    }

    /// Stop capturing and wait for the final transcript.
    ///
    /// Idempotent: stopping an idle controller is a no-op returning `None`.
    /// All capture resources are released before this returns, whichever
    /// sub-timer or caller triggered the stop. If a natural pause already
    /// finalized the session, the result was delivered on the event stream
    /// and this returns `None`.
    pub async fn stop(&mut self) -> Option<TranscriptionResult> {
        let Some(active) = self.active.take() else {
            return None;
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        let result = if active
            .cmd_tx
            .send(Command::Stop { reply: reply_tx })
            .is_ok()
        {
            reply_rx.await.unwrap_or(None)
        } else {
            None
        };
        let _ = active.task.await;
        result
    }

    fn flash_error(&self) {
        self.state_tx.send_replace(SessionState::Error);
        let state_tx = self.state_tx.clone();
        let hold = Duration::from_millis(self.config.state_hold_ms);
        tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            // Fall back only if nothing else moved the state meanwhile.
            state_tx.send_if_modified(|state| {
                if *state == SessionState::Error {
                    *state = SessionState::Idle;
                    true
                } else {
                    false
                }
            });
        });
    }
}

impl Drop for VoiceSessionController {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            // Dropping the loop future releases the capture stream guard.
            active.task.abort();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_session(
    config: SessionConfig,
    mut stream: SampleStream,
    scheduler: TranscriptionScheduler,
    mut scheduler_events: mpsc::UnboundedReceiver<SchedulerEvent>,
    event_tx: mpsc::UnboundedSender<VoiceEvent>,
    state_tx: watch::Sender<SessionState>,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut analyzer = SpectralAnalyzer::new(config.analyzer.clone());
    let mut vad = AdaptiveVad::new(config.vad.clone());

    let chunk_samples = (stream.sample_rate as u64 * config.chunk_ms / 1_000) as usize;
    let mut pending: Vec<f32> = Vec::with_capacity(chunk_samples.max(1));
    let mut next_seq: u64 = 0;
    let mut speech_seen = false;
    let mut completion: f32 = 0.0;
    let mut scheduler_gone = false;
    let mut stop_reply: Option<oneshot::Sender<Option<TranscriptionResult>>> = None;
    let mut last_tick = Instant::now();

    let mut ticker = tokio::time::interval(Duration::from_millis(config.frame_interval_ms.max(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Instant::now();
                let elapsed = now.duration_since(last_tick);
                last_tick = now;

                while let Ok(batch) = stream.samples.try_recv() {
                    analyzer.push_samples(&batch);
                    pending.extend_from_slice(&batch);
                }

                let frame = analyzer.analyze_frame();
                let transition = vad.process_frame(&frame, elapsed);
                let snapshot = vad.snapshot().clone();

                let _ = event_tx.send(VoiceEvent::Level {
                    volume: snapshot.volume,
                    confidence: snapshot.confidence,
                });
                match transition {
                    Some(VadTransition::SpeechStart) => {
                        speech_seen = true;
                        let _ = event_tx.send(VoiceEvent::SpeechStarted);
                    }
                    Some(VadTransition::SpeechEnd) => {
                        let _ = event_tx.send(VoiceEvent::SpeechEnded);
                    }
                    None => {}
                }

                while pending.len() >= chunk_samples {
                    let rest = pending.split_off(chunk_samples);
                    let samples = std::mem::replace(&mut pending, rest);
                    let chunk = AudioChunk { seq: next_seq, samples };
                    next_seq += 1;
                    if !scheduler.submit(chunk) {
                        warn!("transcription worker gone; chunk dropped");
                    }
                }

                // The pause timer effectively re-arms on every speech start,
                // because the VAD zeroes silence_duration there: this only
                // fires after genuine uninterrupted silence follows speech.
                if speech_seen && !snapshot.is_speaking {
                    let wait = natural_pause_delay(&config, completion, snapshot.silence_duration);
                    if snapshot.silence_duration >= wait {
                        debug!(
                            completion,
                            silence_ms = snapshot.silence_duration.as_millis() as u64,
                            "natural pause reached"
                        );
                        break;
                    }
                }
            }
            event = scheduler_events.recv(), if !scheduler_gone => {
                match event {
                    Some(event) => {
                        if let Some(updated) = forward_scheduler_event(&event_tx, event) {
                            completion = updated;
                        }
                    }
                    None => scheduler_gone = true,
                }
            }
            command = cmd_rx.recv() => {
                match command {
                    Some(Command::Stop { reply }) => {
                        stop_reply = Some(reply);
                        break;
                    }
                    // Controller dropped without an explicit stop.
                    None => break,
                }
            }
        }
    }

    vad.reset();

    state_tx.send_replace(SessionState::Thinking);
    let _ = event_tx.send(VoiceEvent::State(SessionState::Thinking));

    // Release the microphone before the potentially slow final pass.
    stream.close();

    if !pending.is_empty() {
        let chunk = AudioChunk {
            seq: next_seq,
            samples: std::mem::take(&mut pending),
        };
        let _ = scheduler.submit(chunk);
    }
    let final_result = scheduler.finish().await;

    // Forward partials produced while the queue drained, ahead of the final.
    while let Ok(event) = scheduler_events.try_recv() {
        forward_scheduler_event(&event_tx, event);
    }

    if let Some(result) = &final_result {
        info!(text = %result.text, "final transcript ready");
        let _ = event_tx.send(VoiceEvent::Final(result.clone()));
    }
    if let Some(reply) = stop_reply {
        let _ = reply.send(final_result.clone());
    }
    // Answer stop calls that raced with a natural pause.
    while let Ok(Command::Stop { reply }) = cmd_rx.try_recv() {
        let _ = reply.send(final_result.clone());
    }

    tokio::time::sleep(Duration::from_millis(config.state_hold_ms)).await;
    state_tx.send_replace(SessionState::Idle);
    let _ = event_tx.send(VoiceEvent::State(SessionState::Idle));
}

/// Returns the updated completion confidence when the event carried a
/// partial transcript.
fn forward_scheduler_event(
    event_tx: &mpsc::UnboundedSender<VoiceEvent>,
    event: SchedulerEvent,
) -> Option<f32> {
    match event {
        SchedulerEvent::Partial { result, .. } => {
            let updated = completion_confidence(&result.text, result.confidence);
            let _ = event_tx.send(VoiceEvent::Partial(result));
            Some(updated)
        }
        SchedulerEvent::ChunkFailed { seq, error } => {
            let _ = event_tx.send(VoiceEvent::Error(format!("chunk {seq}: {error}")));
            None
        }
        SchedulerEvent::FinalFailed { error } => {
            let _ = event_tx.send(VoiceEvent::Error(error));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::default()
    }

    #[test]
    fn pause_shortens_when_the_thought_sounds_finished() {
        let delay = natural_pause_delay(&config(), 0.9, Duration::from_millis(100));
        assert_eq!(delay, Duration::from_millis(800));
    }

    #[test]
    fn pause_stretches_when_the_thought_sounds_unfinished() {
        let delay = natural_pause_delay(&config(), 0.2, Duration::from_millis(100));
        assert_eq!(delay, Duration::from_millis(2_500));
    }

    #[test]
    fn pause_uses_base_between_the_bands() {
        let delay = natural_pause_delay(&config(), 0.6, Duration::from_millis(100));
        assert_eq!(delay, Duration::from_millis(1_500));
    }

    #[test]
    fn long_silence_shaves_the_wait() {
        let delay = natural_pause_delay(&config(), 0.6, Duration::from_millis(2_100));
        assert_eq!(delay, Duration::from_millis(1_000));
    }

    #[test]
    fn the_wait_never_drops_below_the_floor() {
        let delay = natural_pause_delay(&config(), 0.9, Duration::from_millis(2_100));
        // 800 - 500 would be 300; the floor wins.
        assert_eq!(delay, Duration::from_millis(500));
    }
}
