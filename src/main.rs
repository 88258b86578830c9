use std::fs;
use std::path::{Path, PathBuf};

use anyhow::anyhow;
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use waav_voice_client::{
    ClientConfig, ConversationBackend, EventNormalizer, FinalizeOutcome, HttpBackend, InboundEvent,
    TranscriptBuffer,
};

/// WaaV voice client - session diagnostics
#[derive(Parser, Debug)]
#[command(name = "waav-voice-client")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch an ephemeral credential from the backend to verify connectivity
    Check,

    /// Replay a JSON-lines capture of inbound channel frames
    Replay {
        /// Capture file, one frame per line
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let config = if let Some(config_path) = cli.config {
        info!("Loading configuration from {}", config_path.display());
        ClientConfig::from_file(&config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        ClientConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command {
        Commands::Check => check(&config).await,
        Commands::Replay { file } => replay(&config, &file),
    }
}

async fn check(config: &ClientConfig) -> anyhow::Result<()> {
    let backend = HttpBackend::from_config(config)?;
    info!(backend = %config.backend_url, "Requesting ephemeral credential");

    let credential = backend
        .fetch_credential()
        .await
        .map_err(|e| anyhow!("Backend check failed: {}", e.user_message()))?;

    println!(
        "Backend OK: received a credential ({} chars) from {}",
        credential.len(),
        config.backend_url
    );
    Ok(())
}

fn replay(config: &ClientConfig, file: &Path) -> anyhow::Result<()> {
    let capture = fs::read_to_string(file)
        .map_err(|e| anyhow!("Failed to read {}: {}", file.display(), e))?;

    let mut normalizer = EventNormalizer::new();
    let mut transcript = TranscriptBuffer::new(&config.assistant_prefix, &config.user_prefix);
    let mut frames = 0usize;

    for line in capture.lines().map(str::trim).filter(|l| !l.is_empty()) {
        frames += 1;
        match normalizer.normalize_text(line) {
            InboundEvent::UserUtteranceFinalized { transcript: text } => {
                let text = text.trim();
                if !text.is_empty() {
                    println!("{}", transcript.push_user_line(text));
                }
            }
            InboundEvent::FunctionCallInvoked(call) => {
                println!(
                    "[function] {} call_id={} arguments={}",
                    call.name,
                    call.call_id.as_deref().unwrap_or("-"),
                    serde_json::Value::Object(call.arguments)
                );
                transcript.clear_streaming();
            }
            InboundEvent::ResponseStarted => {
                transcript.start_streaming();
            }
            InboundEvent::ResponseDelta { accumulated, .. } => {
                if !transcript.is_streaming() {
                    transcript.start_streaming();
                }
                transcript.update_streaming(&accumulated);
            }
            InboundEvent::ResponseDone { transcript: None } => transcript.clear_streaming(),
            InboundEvent::ResponseDone {
                transcript: Some(text),
            } => {
                if let FinalizeOutcome::Committed { line, .. } = transcript.finalize(&text) {
                    println!("{line}");
                }
            }
            InboundEvent::Error { message } => println!("[error] {message}"),
            other => debug!(event = other.name(), "Skipping frame"),
        }
    }

    info!(
        frames,
        user_lines = transcript.user_lines().len(),
        assistant_lines = transcript.committed_lines().len(),
        "Replay finished"
    );
    Ok(())
}
