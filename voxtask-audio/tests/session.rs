//! End-to-end session behavior against the push-fed backend and a scripted
//! transcription engine: explicit stop, stop idempotence, natural-pause
//! finalization, and error flashing.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use voxtask_audio::error::VoiceError;
use voxtask_audio::push_backend::push_capture;
use voxtask_audio::session::{SessionConfig, VoiceSessionController};
use voxtask_audio::transcription::{TranscribeOptions, TranscriptionEngine};
use voxtask_audio::types::{SessionState, TranscriptionResult, VoiceEvent};
use voxtask_audio::MicrophoneCapture;

#[derive(Default)]
struct ScriptedEngine {
    calls: AtomicUsize,
}

#[async_trait]
impl TranscriptionEngine for ScriptedEngine {
    async fn initialize(&mut self) -> Result<(), VoiceError> {
        Ok(())
    }

    async fn transcribe(
        &self,
        samples: &[f32],
        _options: &TranscribeOptions,
    ) -> Result<TranscriptionResult, VoiceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(TranscriptionResult {
            text: format!("take out the trash ({call}: {} samples)", samples.len()),
            confidence: 0.9,
            segments: Vec::new(),
            language: "en".into(),
        })
    }
}

/// Session tuning tight enough for wall-clock tests.
fn quick_config() -> SessionConfig {
    SessionConfig {
        chunk_ms: 100,
        frame_interval_ms: 5,
        state_hold_ms: 10,
        ..SessionConfig::default()
    }
}

/// In-band (1 kHz) tone samples at 16 kHz.
fn tone(amplitude: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * std::f32::consts::PI * 1_000.0 * i as f32 / 16_000.0).sin())
        .collect()
}

async fn collect_until_closed(events: &mut tokio::sync::mpsc::UnboundedReceiver<VoiceEvent>) -> Vec<VoiceEvent> {
    let mut all = Vec::new();
    while let Some(event) = events.recv().await {
        all.push(event);
    }
    all
}

#[tokio::test]
async fn explicit_stop_returns_final_and_is_idempotent() {
    let (source, capture) = push_capture(16_000);
    let engine = Arc::new(ScriptedEngine::default());
    let mut controller = VoiceSessionController::new(
        engine,
        Box::new(capture),
        SessionConfig {
            // Keep the natural pause out of this test's way.
            pause_base_ms: 60_000,
            pause_confident_ms: 60_000,
            pause_hesitant_ms: 60_000,
            ..quick_config()
        },
    );

    let mut events = controller.start().await.expect("start");
    assert_eq!(controller.state(), SessionState::Listening);

    // ~600 ms of speech-band tone across several chunks.
    for _ in 0..6 {
        source.push(&tone(0.5, 1_600));
        tokio::time::sleep(Duration::from_millis(30)).await;
    }

    let final_result = controller.stop().await;
    assert!(final_result.is_some(), "stop resolves with the final transcript");
    assert_eq!(controller.state(), SessionState::Idle);

    // Second stop: same observable outcome as the first.
    assert!(controller.stop().await.is_none());
    assert_eq!(controller.state(), SessionState::Idle);

    let all = collect_until_closed(&mut events).await;
    let positions: Vec<usize> = [
        all.iter().position(|e| matches!(e, VoiceEvent::State(SessionState::Listening))),
        all.iter().position(|e| matches!(e, VoiceEvent::State(SessionState::Thinking))),
        all.iter().position(|e| matches!(e, VoiceEvent::State(SessionState::Idle))),
    ]
    .iter()
    .map(|p| p.expect("all three states observed"))
    .collect();
    assert!(positions[0] < positions[1] && positions[1] < positions[2]);

    let partial = all.iter().position(|e| matches!(e, VoiceEvent::Partial(_)));
    let final_pos = all.iter().position(|e| matches!(e, VoiceEvent::Final(_)));
    assert!(partial.is_some(), "streaming produced partial transcripts");
    assert!(final_pos.is_some(), "final transcript was published");
    assert!(partial.unwrap() < final_pos.unwrap());
}

#[tokio::test]
async fn natural_pause_finalizes_without_an_explicit_stop() {
    let (source, capture) = push_capture(16_000);
    let engine = Arc::new(ScriptedEngine::default());
    let mut controller = VoiceSessionController::new(
        engine,
        Box::new(capture),
        SessionConfig {
            pause_base_ms: 150,
            pause_confident_ms: 100,
            pause_hesitant_ms: 250,
            pause_floor_ms: 50,
            long_silence_ms: 10_000,
            ..quick_config()
        },
    );

    let mut events = controller.start().await.expect("start");
    let mut states = controller.state_changes();

    // Speak for ~300 ms...
    for _ in 0..3 {
        source.push(&tone(0.5, 1_600));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    // ...then go quiet, still feeding the stream as a live mic would.
    for _ in 0..60 {
        source.push(&vec![0.0; 800]);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let final_result = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if let VoiceEvent::Final(result) = event {
                return Some(result);
            }
        }
        None
    })
    .await
    .expect("final transcript before timeout");
    assert!(final_result.is_some());

    // The controller settles back to Idle on its own.
    tokio::time::timeout(Duration::from_secs(2), async {
        while controller.state() != SessionState::Idle {
            states.changed().await.expect("state channel open");
        }
    })
    .await
    .expect("controller returned to Idle");

    // A stop after the natural pause is a clean no-op.
    assert!(controller.stop().await.is_none());
}

#[tokio::test]
async fn restarting_while_active_replaces_the_session() {
    let (source, capture) = push_capture(16_000);
    let engine = Arc::new(ScriptedEngine::default());
    let mut controller = VoiceSessionController::new(
        engine,
        Box::new(capture),
        SessionConfig {
            pause_base_ms: 60_000,
            pause_confident_ms: 60_000,
            pause_hesitant_ms: 60_000,
            ..quick_config()
        },
    );

    let mut first_events = controller.start().await.expect("first start");
    source.push(&tone(0.5, 3_200));
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second_events = controller.start().await.expect("second start");
    assert_eq!(controller.state(), SessionState::Listening);

    // The first session was finalized: its event stream closed after Idle.
    let first = collect_until_closed(&mut first_events).await;
    assert!(first
        .iter()
        .any(|e| matches!(e, VoiceEvent::State(SessionState::Idle))));

    // The second session is live and still produces events.
    source.push(&tone(0.5, 3_200));
    tokio::time::sleep(Duration::from_millis(50)).await;
    controller.stop().await;
    let second = collect_until_closed(&mut second_events).await;
    assert!(second.iter().any(|e| matches!(e, VoiceEvent::Level { .. })));
}

#[tokio::test]
async fn backend_failure_flashes_error_then_idles() {
    let engine = Arc::new(ScriptedEngine::default());
    // Without the cpal feature this backend always refuses to start; with
    // it, a headless test machine refuses too. Either way start must fail.
    let mut controller = VoiceSessionController::new(
        engine,
        Box::new(MicrophoneCapture::new()),
        quick_config(),
    );

    let err = controller.start().await.err();
    if let Some(err) = err {
        assert!(matches!(
            err,
            VoiceError::UnsupportedEnvironment(_)
                | VoiceError::DeviceUnavailable(_)
                | VoiceError::PermissionDenied(_)
        ));
        assert_eq!(controller.state(), SessionState::Error);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(controller.state(), SessionState::Idle);
        assert!(controller.stop().await.is_none());
    }
    // If a real microphone exists (feature enabled on a dev machine), the
    // start may legitimately succeed; nothing to assert in that case.
}
