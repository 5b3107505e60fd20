use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use murmur::audio::{list_input_devices, CpalInput};
use murmur::{AudioMonitor, Config, EncodedSegment, MonitorEvent, Synthesizer, TranscriptionClient};

/// Murmur - voice activity detection and speech capture pipeline
#[derive(Parser)]
#[command(name = "murmur", version, about)]
struct Cli {
    /// Bearer credential for the transcription service
    #[arg(long, env = "MURMUR_API_KEY", hide_env_values = true)]
    credential: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Capture speech, transcribe each utterance, and print it
    Listen {
        /// Speak each transcript back through the host speech engine
        #[arg(long)]
        speak_back: bool,
    },
    /// List input devices
    Devices,
    /// Transcribe a WAV file
    Transcribe {
        /// Path to a PCM WAV file
        file: std::path::PathBuf,
    },
    /// Render text as speech
    Speak {
        /// Text to speak
        #[arg(default_value = "Merhaba! Ses sentezi çalışıyor.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,murmur=info",
        1 => "info,murmur=debug",
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

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    let credential = cli.credential;

    match cli.command {
        Some(Command::Devices) => cmd_devices(),
        Some(Command::Transcribe { file }) => cmd_transcribe(&config, credential, &file).await,
        Some(Command::Speak { text }) => cmd_speak(&config, &text).await,
        Some(Command::Listen { speak_back }) => {
            cmd_listen(config, credential, speak_back).await
        }
        None => cmd_listen(config, credential, false).await,
    }
}

fn cmd_devices() -> anyhow::Result<()> {
    let devices = list_input_devices()?;
    if devices.is_empty() {
        println!("no input devices found");
        return Ok(());
    }
    for name in devices {
        println!("{name}");
    }
    Ok(())
}

/// Run the live capture pipeline until interrupted
async fn cmd_listen(
    config: Config,
    credential: Option<String>,
    speak_back: bool,
) -> anyhow::Result<()> {
    let source = CpalInput::new(
        config.voice.input_device.clone(),
        config.voice.sample_rate,
        config.voice.frame_size,
    );
    let mut monitor = AudioMonitor::new(Box::new(source), config.monitor_config());
    let events = monitor.events();

    let stt = Arc::new(TranscriptionClient::from_config(&config.stt));
    let synth = Arc::new(Synthesizer::from_config(&config.tts));

    monitor.start()?;
    tracing::info!(
        threshold = config.voice.threshold,
        silence_delay_ms = config.voice.silence_delay.as_millis() as u64,
        "listening; press ctrl-c to stop"
    );

    // The monitor owns the device stream on this thread; events are drained
    // here and each finished utterance is transcribed off the capture path.
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    'outer: loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break 'outer,
            _ = ticker.tick() => {
                while let Ok(event) = events.try_recv() {
                    match event {
                        MonitorEvent::VolumeChange(volume) => {
                            tracing::trace!(volume, "level");
                        }
                        MonitorEvent::SpeechStart => {
                            tracing::info!("speech started");
                        }
                        MonitorEvent::SpeechEnd(segment) => {
                            handle_segment(
                                segment,
                                Arc::clone(&stt),
                                Arc::clone(&synth),
                                credential.clone(),
                                speak_back,
                            );
                        }
                    }
                }
            }
        }
    }

    monitor.stop();
    Ok(())
}

/// Transcribe one finished segment without blocking frame delivery
fn handle_segment(
    segment: EncodedSegment,
    stt: Arc<TranscriptionClient>,
    synth: Arc<Synthesizer>,
    credential: Option<String>,
    speak_back: bool,
) {
    if segment.is_empty() {
        return;
    }

    tokio::spawn(async move {
        match stt.transcribe(&segment, credential.as_deref()).await {
            Ok(text) => {
                println!("{text}");
                if speak_back {
                    let _handle = synth.speak(&text);
                }
            }
            Err(e) => {
                // Per-utterance failure; the capture session keeps running.
                tracing::error!(error = %e, "transcription failed");
            }
        }
    });
}

async fn cmd_transcribe(
    config: &Config,
    credential: Option<String>,
    file: &std::path::Path,
) -> anyhow::Result<()> {
    let segment = load_wav_segment(file)?;
    let stt = TranscriptionClient::from_config(&config.stt);
    let text = stt.transcribe(&segment, credential.as_deref()).await?;
    println!("{text}");
    Ok(())
}

async fn cmd_speak(config: &Config, text: &str) -> anyhow::Result<()> {
    let synth = Synthesizer::from_config(&config.tts);
    if !synth.is_available() {
        println!("no speech engine available on this host");
        return Ok(());
    }

    let spoken = synth.speak(text).finished().await;
    if spoken {
        println!("spoken");
    } else {
        println!("synthesis did not complete");
    }
    Ok(())
}

/// Wrap an existing WAV file as a segment for the transcription boundary
fn load_wav_segment(path: &std::path::Path) -> anyhow::Result<EncodedSegment> {
    let wav = std::fs::read(path)?;

    let (samples, duration) = {
        let reader = hound::WavReader::new(std::io::Cursor::new(&wav))?;
        let spec = reader.spec();
        let duration =
            Duration::from_secs_f64(f64::from(reader.duration()) / f64::from(spec.sample_rate));
        (reader.len() as usize, duration)
    };

    Ok(EncodedSegment {
        wav,
        samples,
        duration,
    })
}
