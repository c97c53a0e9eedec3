//! Serialized chunk transcription.
//!
//! A single worker task owns the engine handle: chunks queue in arrival
//! order and at most one transcription call is ever in flight, which keeps
//! a local ML backend from being hammered and guarantees partials arrive in
//! causal order. Stopping drains the queue, then re-transcribes the whole
//! session's audio once for the final, higher-quality result.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::transcription::{TranscribeOptions, TranscriptionEngine};
use crate::types::{AudioChunk, TranscriptionResult};

/// Audio shorter than this (~100 ms at 16 kHz) isn't worth an engine call.
const MIN_TRANSCRIBE_SAMPLES: usize = 1_600;

/// Progress reported by the worker while a session runs.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A chunk finished transcribing. Partials supersede one another; they
    /// are not cumulative.
    Partial {
        seq: u64,
        result: TranscriptionResult,
    },
    /// A chunk failed. The queue keeps draining.
    ChunkFailed { seq: u64, error: String },
    /// The final combined pass failed; `finish` resolves with `None`.
    FinalFailed { error: String },
}

enum Command {
    Chunk(AudioChunk),
    Finish {
        reply: oneshot::Sender<Option<TranscriptionResult>>,
    },
}

/// Handle to the transcription worker for one capture session.
pub struct TranscriptionScheduler {
    cmd_tx: mpsc::UnboundedSender<Command>,
    worker: JoinHandle<()>,
}

impl TranscriptionScheduler {
    /// Spawn the worker. Progress events arrive on the returned receiver.
    pub fn spawn(
        engine: Arc<dyn TranscriptionEngine>,
        options: TranscribeOptions,
    ) -> (Self, mpsc::UnboundedReceiver<SchedulerEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(engine, options, cmd_rx, event_tx));
        (Self { cmd_tx, worker }, event_rx)
    }

    /// Queue a chunk. Returns false once the worker has shut down.
    pub fn submit(&self, chunk: AudioChunk) -> bool {
        self.cmd_tx.send(Command::Chunk(chunk)).is_ok()
    }

    /// Drain every queued chunk, then run the final combined pass over the
    /// session's audio. Blocks until in-flight and queued work is done.
    pub async fn finish(self) -> Option<TranscriptionResult> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(Command::Finish { reply: reply_tx })
            .is_err()
        {
            return None;
        }
        let result = reply_rx.await.unwrap_or(None);
        let _ = self.worker.await;
        result
    }
}

async fn run_worker(
    engine: Arc<dyn TranscriptionEngine>,
    options: TranscribeOptions,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<SchedulerEvent>,
) {
    // Everything heard this session, kept for the final pass. Individual
    // chunk buffers are dropped as soon as their partial pass completes.
    let mut session_audio: Vec<f32> = Vec::new();

    while let Some(command) = cmd_rx.recv().await {
        match command {
            Command::Chunk(chunk) => {
                let seq = chunk.seq;
                session_audio.extend_from_slice(&chunk.samples);

                if chunk.samples.len() < MIN_TRANSCRIBE_SAMPLES {
                    debug!(seq, samples = chunk.samples.len(), "chunk buffered without partial pass");
                    continue;
                }

                match engine.transcribe(&chunk.samples, &options).await {
                    Ok(result) => {
                        debug!(seq, text = %result.text, "chunk transcribed");
                        let _ = event_tx.send(SchedulerEvent::Partial { seq, result });
                    }
                    Err(e) => {
                        warn!(seq, error = %e, "chunk transcription failed");
                        let _ = event_tx.send(SchedulerEvent::ChunkFailed {
                            seq,
                            error: e.to_string(),
                        });
                    }
                }
            }
            Command::Finish { reply } => {
                let final_result = if session_audio.len() >= MIN_TRANSCRIBE_SAMPLES {
                    match engine.transcribe(&session_audio, &options).await {
                        Ok(result) => Some(result),
                        Err(e) => {
                            warn!(error = %e, "final transcription pass failed");
                            let _ = event_tx.send(SchedulerEvent::FinalFailed {
                                error: e.to_string(),
                            });
                            None
                        }
                    }
                } else {
                    debug!(
                        samples = session_audio.len(),
                        "too little audio for a final pass"
                    );
                    None
                };
                let _ = reply.send(final_result);
                break;
            }
        }
    }
}
