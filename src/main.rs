use std::process::ExitCode;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use parley::config::{SpeechOptions, popular_voices};
use parley::input::ConsoleDisplay;
use parley::voice::{
    AudioCapture, AudioPlayback, Recognizer, RecognitionOutcome, SpeechRecognizer, SpeechToText,
    Transcriber, calculate_energy,
};
use parley::{Config, Session};

/// Parley - voice-first input with typed fallback
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Never listen; answers are always typed
    #[arg(long, env = "PARLEY_NO_VOICE")]
    no_voice: bool,

    /// Never speak
    #[arg(long, env = "PARLEY_MUTE")]
    mute: bool,

    /// Play each capture back before recognition
    #[arg(long)]
    debug_audio: bool,

    /// Recognition language tag (e.g. "en-US")
    #[arg(long)]
    language: Option<String>,

    /// Synthesis voice id
    #[arg(long)]
    voice: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask a question and print the answer
    Ask {
        /// Question shown to the operator
        prompt: String,
        /// Text spoken instead of the written question
        #[arg(long)]
        spoken: Option<String>,
    },
    /// Speak text
    Say {
        /// Text to speak
        text: String,
        /// Speak even when speech is disabled
        #[arg(long)]
        force: bool,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Record one phrase, play it back and transcribe it
    TestVoice,
    /// List well-known voices
    Voices,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Ask { prompt, spoken } => ask(&config, &prompt, spoken.as_deref()).await,
        Command::Say { text, force } => say(&config, &text, force).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::TestVoice => test_voice(&config).await,
        Command::Voices => {
            list_voices(&config);
            Ok(())
        }
    }
}

/// Load configuration and apply CLI overrides on top
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load()?;

    let overrides = SpeechOptions {
        listen_for_responses: cli.no_voice.then_some(false),
        enabled: cli.mute.then_some(false),
        debug_audio: cli.debug_audio.then_some(true),
        language: cli.language.clone(),
        voice_id: cli.voice.clone(),
        ..SpeechOptions::default()
    };
    config.speech = config.speech.merged(&overrides)?;

    Ok(config)
}

async fn ask(config: &Config, prompt: &str, spoken: Option<&str>) -> anyhow::Result<()> {
    let mut session = Session::from_config(config);
    let answer = session.arbitrator().request_input(prompt, spoken).await;
    println!("{answer}");
    Ok(())
}

async fn say(config: &Config, text: &str, force: bool) -> anyhow::Result<()> {
    let session = Session::from_config(config);
    let outcome = session.speaker().announce_with(text, None, force).await;
    println!("Speech {outcome}");
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    tokio::task::spawn_blocking(move || meter(duration)).await??;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Print one level line per second; the stream stays on this thread
fn meter(duration: u64) -> anyhow::Result<()> {
    let capture = AudioCapture::open_default()?;
    println!("Device: {}", capture.device_name());
    println!("Sample rate: {} Hz", capture.sample_rate());
    println!("---");

    let (tx, rx) = mpsc::channel();
    let stream = capture.start(tx)?;

    for i in 0..duration {
        let deadline = Instant::now() + Duration::from_secs(1);
        let mut samples = Vec::new();
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(chunk) => samples.extend(chunk),
                Err(mpsc::RecvTimeoutError::Timeout) => break,
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    anyhow::bail!("capture stream closed");
                }
            }
        }

        let energy = calculate_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    drop(stream);
    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    // 2 seconds of 440Hz at 24kHz, resampled to the device rate on playback
    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!(
        "Playing {} samples at {} Hz (device runs at {} Hz)...",
        samples.len(),
        sample_rate,
        playback.sample_rate()
    );

    playback.play(samples, sample_rate).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Record one phrase, play it back, then transcribe it
async fn test_voice(config: &Config) -> anyhow::Result<()> {
    let transcriber: Arc<dyn Transcriber> = Arc::new(SpeechToText::from_config(config)?);
    let playback = AudioPlayback::new()?;

    let shared = parley::config::SharedSpeechConfig::new(config.speech.clone());
    let mut recognizer = SpeechRecognizer::initialize(
        shared,
        Some(transcriber),
        Arc::new(playback),
        Arc::new(ConsoleDisplay),
        config.temp_dir.clone(),
    );

    if !recognizer.is_available() {
        anyhow::bail!("no microphone available");
    }

    println!("You will hear your recording before it is transcribed.\n");
    let outcome = recognizer
        .capture_and_recognize("Say something after the prompt...", true)
        .await;

    match outcome {
        RecognitionOutcome::Text(text) => println!("Heard: \"{text}\""),
        other => {
            println!("{}", other.failure_hint());
            if let RecognitionOutcome::ServiceError(reason) = other {
                println!("  cause: {reason}");
            }
        }
    }

    Ok(())
}

fn list_voices(config: &Config) {
    println!("Popular voices (* = configured):");
    for (id, description) in popular_voices() {
        let marker = if *id == config.speech.voice_id { "*" } else { " " };
        println!(" {marker} {id}  {description}");
    }
}
