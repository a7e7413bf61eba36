use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use astra_gateway::capture::{Microphone, SAMPLE_RATE, UtteranceDetector, rms};
use astra_gateway::playback::{AudioPlayback, StopFlag};
use astra_gateway::providers::{SpeechSynthesizer, TextToSpeech};
use astra_gateway::{Config, Session};

/// Astra - Conversational avatar gateway
#[derive(Parser)]
#[command(name = "astra", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long, env = "ASTRA_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Begin the conversation immediately instead of waiting for a renderer
    #[arg(long)]
    auto_start: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the text to speech system.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,astra_gateway=info",
        1 => "info,astra_gateway=debug",
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
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    tracing::info!(
        port = config.server.port,
        model = %config.chat_model,
        "starting astra gateway"
    );

    let session = Session::new(config, cli.auto_start)?;

    // Ctrl-C turns into a shutdown request
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    tracing::info!("astra gateway ready");
    session.run(&mut shutdown_rx).await?;

    Ok(())
}

/// Meter the microphone through the utterance detector
#[allow(
    clippy::future_not_send,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Watching the default input device at {SAMPLE_RATE} Hz for {duration}s.");
    println!("Say something; the level should jump and an utterance should land.\n");

    let mut mic = Microphone::open()?;
    mic.start()?;
    let mut detector = UtteranceDetector::new();

    for _ in 0..duration * 2 {
        tokio::time::sleep(Duration::from_millis(500)).await;

        let samples = mic.drain();
        let level = rms(&samples);
        let complete = detector.process(&samples);

        let bar = (level * 400.0).min(40.0) as usize;
        let state = if detector.is_capturing() {
            "speech"
        } else {
            "quiet"
        };
        println!("{:<40}  {level:.4}  {state}", "#".repeat(bar));

        if complete {
            let utterance = detector.take_utterance();
            let secs = utterance.len() as f32 / SAMPLE_RATE as f32;
            println!("-- captured a {secs:.1}s utterance --");
        }
    }

    mic.stop();
    println!("\nA flat meter means the device delivered only silence.");
    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000.0_f32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let samples: Vec<f32> = (0..(sample_rate as usize * 2))
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let t = i as f32 / sample_rate;
            (t * frequency * std::f32::consts::TAU).sin() * 0.3
        })
        .collect();

    playback.play_samples(samples, &StopFlag::default())?;

    println!("Done. If you heard a tone, your speaker is working!");
    Ok(())
}

/// Test TTS output
#[allow(clippy::future_not_send)]
async fn test_tts(text: &str) -> anyhow::Result<()> {
    let config = Config::load()?;
    let api_key = config
        .api_keys
        .openai
        .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY is required for TTS"))?;

    println!("Synthesizing: {text}");

    let synth = TextToSpeech::new_openai(
        api_key,
        config.voice.tts_voice,
        config.voice.tts_speed,
        config.voice.tts_model,
    )?;
    let audio = synth.synthesize(text).await?;

    println!("Got {} bytes of audio, playing...", audio.len());

    let playback = AudioPlayback::new()?;
    playback.play_mp3(&audio, &StopFlag::default())?;

    println!("Done!");
    Ok(())
}
