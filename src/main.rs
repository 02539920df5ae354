use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use allie::api::ApiServerBuilder;
use allie::config::{self, ClientConfig};
use allie::history::SWEEP_INTERVAL;
use allie::voice::{
    AudioCaptureSession, AudioRouting, CpalMicrophone, CpalSpeaker, Microphone, ModeSwitch,
    PLAYBACK_SAMPLE_RATE, Pcm, SpeechOptions, SpeechOutcome, SpeechPlayback, rms,
};
use allie::{
    BackendClient, Config, Conversation, ConversationHistory, PersonalityMode,
    ResponseOrchestrator, TurnOutcome, db,
};

/// Allie - voice assistant and backend relay
#[derive(Parser)]
#[command(name = "allie", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Starting personality (friendly, sassy, motivational, humorous)
    #[arg(short, long, env = "ALLIE_PERSONALITY", global = true)]
    personality: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the backend relay
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Type to Allie, one turn per line
    Chat {
        /// Speak replies aloud
        #[arg(long)]
        speak: bool,
    },
    /// Ask a single question
    Ask {
        /// Question text
        text: String,
        /// Speak the reply aloud
        #[arg(long)]
        speak: bool,
    },
    /// Record one spoken turn and answer it
    Listen {
        /// Stop recording after this many seconds
        #[arg(short, long, default_value = "8")]
        seconds: u64,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Speak text through the relay's TTS
    Say {
        /// Text to speak
        #[arg(default_value = "Hi, I'm Allie. Text to speech is working.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,allie=info",
        1 => "info,allie=debug",
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
    let mut config = Config::load()?;
    if let Some(name) = &cli.personality {
        config.client.personality = PersonalityMode::from_str(name);
    }

    match cli.command {
        Command::Serve { port } => serve(config, port).await,
        Command::Chat { speak } => chat(&config.client, speak).await,
        Command::Ask { text, speak } => ask(&config.client, &text, speak).await,
        Command::Listen { seconds } => listen(&config.client, seconds).await,
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker().await,
        Command::Say { text } => say(&config.client, &text).await,
    }
}

/// Run the relay until ctrl-c
async fn serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.relay.port = port;
    }

    config::ensure_parent(&config.relay.db_path)?;
    let pool = db::init(&config.relay.db_path)?;

    let server = ApiServerBuilder::from_config(pool, &config.relay).build();

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutting down");
            }
            shutdown.cancel();
        }
    });

    tracing::info!(port = config.relay.port, "allie relay starting");
    server.run(shutdown).await?;
    Ok(())
}

/// Wire a conversation against the relay
fn conversation(
    client: &ClientConfig,
    speak: bool,
) -> anyhow::Result<Conversation<CpalMicrophone>> {
    let backend = Arc::new(BackendClient::new(&client.backend_url)?);
    let routing: Arc<dyn AudioRouting> = Arc::new(ModeSwitch::new());

    std::fs::create_dir_all(&client.recordings_dir)?;
    let capture = AudioCaptureSession::new(
        CpalMicrophone::new(),
        Arc::clone(&routing),
        &client.recordings_dir,
    );

    let orchestrator = ResponseOrchestrator::new(backend.clone(), ConversationHistory::new())
        .with_mode(client.personality)
        .with_language(&client.language);

    let conversation = Conversation::new(
        capture,
        backend.clone(),
        orchestrator,
        &client.language,
    );
    if !speak {
        return Ok(conversation);
    }

    let playback = SpeechPlayback::new(backend, Arc::new(CpalSpeaker::new()), routing);
    Ok(conversation.with_speech(
        Arc::new(playback),
        SpeechOptions::for_language(&client.language),
    ))
}

/// Cancel the running turn on ctrl-c; a second ctrl-c while idle exits
fn spawn_ctrl_c(conversation: &Conversation<CpalMicrophone>, quit: CancellationToken) {
    let canceller = conversation.canceller();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !canceller.cancel() {
                quit.cancel();
                break;
            }
        }
    });
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Replied { reply, speech, .. } => {
            println!("Allie: {}", reply.text);
            if *speech == Some(SpeechOutcome::Cancelled) {
                println!("(stopped)");
            }
        }
        TurnOutcome::NoTranscript => println!("(didn't catch that)"),
        TurnOutcome::Cancelled => println!("(cancelled)"),
    }
}

/// Interactive text conversation
#[allow(clippy::future_not_send)]
async fn chat(client: &ClientConfig, speak: bool) -> anyhow::Result<()> {
    let mut conversation = conversation(client, speak)?;
    let quit = CancellationToken::new();
    spawn_ctrl_c(&conversation, quit.clone());

    let pruner = conversation
        .orchestrator()
        .history()
        .spawn_pruner(SWEEP_INTERVAL, quit.clone());

    println!(
        "Talking to Allie ({} mode). Type /mode <name> to switch, /quit to leave.",
        conversation.orchestrator().mode()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            () = quit.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        if line == "/quit" {
            break;
        }
        if let Some(name) = line.strip_prefix("/mode") {
            let mode = PersonalityMode::from_str(name.trim());
            let intro = conversation.switch_personality(mode).await;
            println!("(mode: {mode})\nAllie: {intro}");
            continue;
        }
        if line.is_empty() {
            continue;
        }

        let outcome = conversation.submit_text(line).await;
        print_outcome(&outcome);
    }

    quit.cancel();
    pruner.await?;
    conversation.end_session();
    Ok(())
}

/// Single question
#[allow(clippy::future_not_send)]
async fn ask(client: &ClientConfig, text: &str, speak: bool) -> anyhow::Result<()> {
    let mut conversation = conversation(client, speak)?;
    spawn_ctrl_c(&conversation, CancellationToken::new());

    let outcome = conversation.submit_text(text).await;
    print_outcome(&outcome);
    Ok(())
}

/// Record until Enter or timeout, then answer aloud
#[allow(clippy::future_not_send)]
async fn listen(client: &ClientConfig, seconds: u64) -> anyhow::Result<()> {
    let mut conversation = conversation(client, true)?;
    let quit = CancellationToken::new();

    conversation.start_recording()?;
    println!("Listening... press Enter when done ({seconds}s max)");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let interrupted = tokio::select! {
        _ = lines.next_line() => false,
        () = tokio::time::sleep(Duration::from_secs(seconds)) => false,
        _ = tokio::signal::ctrl_c() => true,
    };

    if interrupted {
        conversation.abort_recording();
        println!("(recording discarded)");
        return Ok(());
    }

    spawn_ctrl_c(&conversation, quit);
    let outcome = conversation.finish_turn().await?;
    if let TurnOutcome::Replied { transcript, .. } = &outcome {
        println!("You: {transcript}");
    }
    print_outcome(&outcome);
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut mic = CpalMicrophone::new();
    if !mic.request_permission() {
        anyhow::bail!("no usable microphone");
    }
    mic.begin()?;

    println!("Sample rate: {} Hz", mic.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = mic.peek_buffer();
        let energy = rms(&samples);
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

        mic.clear_buffer();
    }

    mic.end()?;

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let frequency = 440.0_f32;
    let num_samples = PLAYBACK_SAMPLE_RATE * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {PLAYBACK_SAMPLE_RATE} Hz...", samples.len());

    CpalSpeaker::new()
        .play_pcm(
            Pcm {
                samples,
                sample_rate: PLAYBACK_SAMPLE_RATE,
            },
            CancellationToken::new(),
        )
        .await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl list sinks short");
    println!("  2. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Speak text through the relay
async fn say(client: &ClientConfig, text: &str) -> anyhow::Result<()> {
    let backend = Arc::new(BackendClient::new(&client.backend_url)?);
    let playback = SpeechPlayback::new(
        backend,
        Arc::new(CpalSpeaker::new()),
        Arc::new(ModeSwitch::new()),
    );

    let canceller = playback.canceller();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    match playback
        .speak(text, &SpeechOptions::for_language(&client.language))
        .await?
    {
        SpeechOutcome::Finished => println!("If you heard the speech, TTS is working!"),
        SpeechOutcome::Cancelled => println!("(stopped)"),
    }
    Ok(())
}
