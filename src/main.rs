use std::sync::Arc;

use anyhow::{Context, Result};
use channel_scribe::transcription::BackendKind;
use channel_scribe::{
    create_router, AppState, Config, RecorderService, RelayTransport, SessionRegistry,
    TranscriptionWorker,
};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "channel-scribe", version, about = "Voice channel recorder and transcriber")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(short, long, default_value = "config/channel-scribe")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control surface
    Serve,
    /// Transcribe a stored recording by name
    Transcribe {
        name: String,
        #[arg(long, value_parser = parse_backend)]
        backend: Option<BackendKind>,
    },
    /// List stored recordings
    List,
}

fn parse_backend(value: &str) -> Result<BackendKind, String> {
    match value {
        "local-engine" => Ok(BackendKind::LocalEngine),
        "cloud-engine" => Ok(BackendKind::CloudEngine),
        other => Err(format!(
            "unknown backend `{other}` (expected local-engine or cloud-engine)"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    info!("Loaded config: {}", cfg.service.name);
    info!(
        "Recording {}Hz, {} channels, transcription via {}",
        cfg.audio.sample_rate, cfg.audio.channels, cfg.transcription.backend
    );

    let storage = cfg.storage_layout();
    let relay = Arc::new(RelayTransport::new(cfg.voice.frame_queue_capacity));
    let worker = TranscriptionWorker::new(storage.clone(), cfg.transcription.clone());
    let service = Arc::new(RecorderService::new(
        SessionRegistry::new(cfg.session_config()),
        relay.clone(),
        storage,
        worker,
        cfg.voice.clone(),
    ));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("HTTP control surface listening on {}", addr);

            let app = create_router(AppState::new(service, relay));
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("Shutdown signal received");
                })
                .await
                .context("HTTP server failed")?;
        }
        Command::Transcribe { name, backend } => {
            let outcome = service.transcribe(&name, backend).await?;
            info!(
                "Transcript written to {} ({} segments, {} inaudible)",
                outcome.transcript_path.display(),
                outcome.segments,
                outcome.inaudible_segments
            );
            println!("{}", outcome.text);
        }
        Command::List => {
            for recording in service.list_recordings().await? {
                println!(
                    "{}  {}  {} bytes",
                    recording.date, recording.name, recording.size_bytes
                );
            }
        }
    }

    Ok(())
}
