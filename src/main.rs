use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use aria_voice::audio::{CapturePipeline, PLAYBACK_SAMPLE_RATE, PlaybackBuffer, PlaybackScheduler};
use aria_voice::live::WsConnector;
use aria_voice::{
    Config, MemoryCategory, MemoryStore, Session, SessionConfig, SessionOptions, Toolbox,
};

/// Aria - real-time voice assistant client
#[derive(Parser)]
#[command(name = "aria", version, about)]
struct Cli {
    /// Path to a configuration file
    #[arg(short, long, env = "ARIA_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable audio devices (for headless hosts without audio hardware)
    #[arg(long, env = "ARIA_DISABLE_AUDIO")]
    disable_audio: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// List remembered facts
    Memories {
        /// Filter by category (personal, preference, task, general)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Delete a remembered fact by id
    Forget {
        /// Fact id (from `aria memories`)
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,aria_voice=info",
        1 => "info,aria_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Memories { category } => list_memories(&config, category.as_deref()),
            Command::Forget { id } => forget_memory(&config, &id),
        };
    }

    run_session(config, cli.disable_audio).await
}

/// Run a conversation session until interrupted or closed by the remote
#[allow(clippy::future_not_send)]
async fn run_session(config: Config, disable_audio: bool) -> anyhow::Result<()> {
    let api_key = config.api_key()?;

    let memory = MemoryStore::load(config.memory_path())?;
    tracing::info!(facts = memory.len(), "memory bank ready");
    let memory = Arc::new(Mutex::new(memory));

    let connector = Arc::new(WsConnector::new(config.endpoint.clone(), api_key));
    let tools = Arc::new(Toolbox::new(memory));

    let session_config = SessionConfig {
        model: config.model.clone(),
        voice: config.voice.clone(),
        system_instruction: config.system_instruction.clone(),
        tools: Toolbox::declarations(),
        input_transcription: true,
        output_transcription: true,
    };

    let options = SessionOptions {
        audio: config.audio.enabled && !disable_audio,
        transcript_capacity: config.transcript_capacity,
        clock: None,
    };

    let mut session = Session::start(connector, session_config, tools, options).await?;
    tracing::info!("aria online - speak when ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
        }
        () = session.closed() => {
            tracing::info!("session ended by remote");
        }
    }

    session.stop().await;

    for entry in session.transcript() {
        tracing::debug!(speaker = ?entry.speaker, text = %entry.text, "transcript");
    }

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let captured: Arc<Mutex<Vec<f32>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_buffer = Arc::clone(&captured);

    let mut capture = CapturePipeline::new()?;
    capture.start(move |chunk| {
        // Meter on decoded samples so the full path is exercised
        if let Ok(buffer) =
            aria_voice::audio::decode_to_playback_buffer(&chunk.data, 16000, 1)
        {
            if let Ok(mut samples) = sink_buffer.lock() {
                samples.extend_from_slice(buffer.samples());
            }
        }
    })?;

    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = captured
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave through the scheduler
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let mut playback = PlaybackScheduler::new()?;
    playback.start()?;

    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (PLAYBACK_SAMPLE_RATE as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), PLAYBACK_SAMPLE_RATE);

    let handle = playback.handle();
    handle.schedule(PlaybackBuffer::from_samples(samples, PLAYBACK_SAMPLE_RATE, 1));

    tokio::time::sleep(Duration::from_secs_f32(duration_secs + 0.5)).await;
    playback.stop();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// List remembered facts
fn list_memories(config: &Config, category: Option<&str>) -> anyhow::Result<()> {
    let filter = match category {
        Some(raw) => Some(
            MemoryCategory::from_str_value(raw)
                .ok_or_else(|| anyhow::anyhow!("unknown category: {raw}"))?,
        ),
        None => None,
    };

    let store = MemoryStore::load(config.memory_path())?;
    let facts = store.list(filter);

    if facts.is_empty() {
        println!("No memories stored.");
        return Ok(());
    }

    for fact in facts {
        println!(
            "{}  [{}]  {}  {}",
            fact.timestamp.format("%Y-%m-%d %H:%M"),
            fact.category,
            fact.id,
            fact.content
        );
    }

    Ok(())
}

/// Delete a remembered fact
fn forget_memory(config: &Config, id: &str) -> anyhow::Result<()> {
    let mut store = MemoryStore::load(config.memory_path())?;

    if store.remove(id)? {
        println!("Forgot {id}");
    } else {
        println!("No memory with id {id}");
    }

    Ok(())
}
