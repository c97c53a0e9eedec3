//! Thin command-line shell over the voxtask library: capture one spoken
//! task from the microphone, or parse typed text as if it had been spoken.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use config::Settings;
use tracing_subscriber::EnvFilter;
use voxtask_audio::session::{SessionConfig, VoiceSessionController};
use voxtask_audio::vad::VadConfig;
use voxtask_audio::{MicrophoneCapture, TranscriptionEngine, VoiceEvent, WhisperEngine};
use voxtask_core::parse_spoken_task;

#[derive(Parser, Debug)]
#[command(name = "voxtask", about = "Voice-captured tasks from the terminal", version)]
struct Args {
    /// Verbose logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture one utterance from the microphone and print the parsed task
    Listen {
        /// Whisper GGML model path (overrides settings)
        #[arg(long)]
        model: Option<PathBuf>,
        /// Language hint, e.g. "en"
        #[arg(long)]
        language: Option<String>,
    },
    /// Parse text as if it had been spoken
    Parse { text: String },
}

fn setup_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing(args.verbose);

    match args.command {
        Command::Parse { text } => {
            let task = parse_spoken_task(&text, chrono::Local::now());
            println!("{}", serde_json::to_string_pretty(&task)?);
            Ok(())
        }
        Command::Listen { model, language } => listen(model, language).await,
    }
}

async fn listen(model: Option<PathBuf>, language: Option<String>) -> anyhow::Result<()> {
    let settings = Settings::load();
    let model_path = model
        .or_else(|| settings.resolved_model_path())
        .context("no whisper model path; pass --model or set model_path in settings.toml")?;

    let mut engine = WhisperEngine::new(&model_path);
    engine
        .initialize()
        .await
        .context("failed to initialize transcription")?;

    let session_config = SessionConfig {
        language: language.or_else(|| settings.language.clone()),
        chunk_ms: settings.chunk_ms,
        pause_base_ms: settings.pause_base_ms,
        vad: VadConfig {
            sensitivity: settings.vad_sensitivity,
            ..VadConfig::default()
        },
        ..SessionConfig::default()
    };

    let mut controller = VoiceSessionController::new(
        Arc::new(engine),
        Box::new(MicrophoneCapture::new()),
        session_config,
    );

    println!("Listening — speak your task, pause when done.");
    let mut events = controller.start().await?;

    let mut final_text: Option<String> = None;
    while let Some(event) = events.recv().await {
        match event {
            VoiceEvent::SpeechStarted => eprintln!("[speech]"),
            VoiceEvent::SpeechEnded => eprintln!("[pause]"),
            VoiceEvent::Partial(partial) => eprintln!("  … {}", partial.text),
            VoiceEvent::Final(result) => final_text = Some(result.text),
            VoiceEvent::Error(e) => eprintln!("warning: {e}"),
            VoiceEvent::State(_) | VoiceEvent::Level { .. } => {}
        }
        if final_text.is_some() {
            break;
        }
    }
    controller.stop().await;

    let Some(text) = final_text else {
        bail!("no speech captured");
    };
    let task = parse_spoken_task(&text, chrono::Local::now());
    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(())
}
