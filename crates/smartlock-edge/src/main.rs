//! Smart lock edge daemon.
//!
//! Wires the orchestrator to the serial link, camera, recognizer, database
//! and remote control server, then runs until SIGINT or SIGTERM. SIGHUP
//! reloads enrolled faces, e.g. after `smartlock-edge enroll`.

mod cli;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Args, Command};
use smartlock_core::{EdgeConfig, config::RecognitionBackend};
use smartlock_hardware::{
    Camera, CommandSink, FaceRecognizer, SerialReader,
    mock::{MockCamera, MockRecognizer, MockSerialLink},
    serial,
};
use smartlock_orchestrator::{
    Enroller, FfmpegMerger, KnownFaceCache, Orchestrator, OrchestratorContext, PipelineSettings,
};
use smartlock_remote::{RemoteServer, RemoteServerConfig};
use smartlock_storage::{Database, DatabaseConfig, PersistenceGateway, SqliteGateway};
use std::{path::Path, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args.config)?;

    match args.command {
        Command::Run { simulate_serial } => run(config, simulate_serial).await,
        Command::Enroll { name, image } => enroll(config, &name, &image).await,
        Command::CheckConfig => {
            print!("{}", config.to_toml().context("failed to render configuration")?);
            Ok(())
        }
    }
}

fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Load the configuration file, falling back to defaults when it is missing.
fn load_config(path: &Path) -> Result<EdgeConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Configuration file not found, using defaults");
        return Ok(EdgeConfig::default());
    }
    let config = EdgeConfig::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;
    info!(path = %path.display(), "Configuration loaded");
    Ok(config)
}

async fn open_database(config: &EdgeConfig) -> Result<(Database, Arc<SqliteGateway>)> {
    let db = Database::new(DatabaseConfig::from(&config.database))
        .await
        .with_context(|| format!("failed to open database {}", config.database.path.display()))?;
    let gateway = Arc::new(SqliteGateway::new(db.pool().clone()));
    Ok((db, gateway))
}

/// Camera and recognizer for the configured backend.
fn vision_backend(backend: RecognitionBackend) -> (Box<dyn Camera>, Arc<dyn FaceRecognizer>) {
    match backend {
        RecognitionBackend::Simulated => {
            info!("Using simulated camera and recognizer");
            let (camera, _camera) = MockCamera::new();
            let (recognizer, _faces) = MockRecognizer::simulated();
            (Box::new(camera), Arc::new(recognizer))
        }
    }
}

async fn run(config: EdgeConfig, simulate_serial: bool) -> Result<()> {
    let (db, gateway) = open_database(&config).await?;

    // The mock handle keeps the in-process link connected while the daemon runs.
    let (reader, sink, _serial_handle): (Box<dyn SerialReader>, Arc<dyn CommandSink>, _) =
        if simulate_serial {
            info!("Using in-process serial link");
            let (reader, writer, handle) = MockSerialLink::new();
            (Box::new(reader), Arc::new(writer), Some(handle))
        } else {
            let (reader, writer) = serial::open(
                &config.serial.port,
                config.serial.baud_rate,
                config.serial.read_timeout(),
            )
            .with_context(|| format!("failed to open serial port {}", config.serial.port))?;
            (Box::new(reader), Arc::new(writer), None)
        };

    let (camera, recognizer) = vision_backend(config.recognition.backend);
    let cancel = CancellationToken::new();

    let ctx = OrchestratorContext::new(
        sink,
        recognizer,
        Arc::new(FfmpegMerger::new(config.capture.ffmpeg.clone())),
        gateway,
        PipelineSettings::from(&config),
    )
    .with_cancel_token(cancel.clone());

    let remote_config = RemoteServerConfig::try_from(&config.remote)?;
    let server = RemoteServer::bind(remote_config, ctx.remote_handler()).await?;
    let handle = Orchestrator::start(ctx, reader, camera)
        .await
        .context("failed to start orchestrator")?;
    let server_task = tokio::spawn(server.serve(cancel.clone()));
    let hangup_task = tokio::spawn(reload_on_hangup(handle.context().clone())?);

    shutdown_signal().await?;
    info!("Shutting down");
    cancel.cancel();

    handle.shutdown().await?;
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Remote server stopped with error"),
        Err(e) => warn!(error = %e, "Remote server task failed"),
    }
    if let Err(e) = hangup_task.await {
        warn!(error = %e, "Reload task failed");
    }
    db.close().await;
    info!("Stopped");
    Ok(())
}

async fn enroll(config: EdgeConfig, name: &str, image: &Path) -> Result<()> {
    if !image.is_file() {
        bail!("image {} does not exist", image.display());
    }
    let (db, gateway) = open_database(&config).await?;
    let (_camera, recognizer) = vision_backend(config.recognition.backend);

    let enroller = Enroller::new(recognizer, gateway, Arc::new(KnownFaceCache::default()));
    let record = enroller
        .enroll(name, image)
        .await
        .with_context(|| format!("failed to enroll {name}"))?;

    println!(
        "enrolled {name} (identity {}, embedding {}{})",
        record.identity_id,
        record.embedding_id,
        if record.identity_created { ", new identity" } else { "" }
    );
    db.close().await;
    Ok(())
}

/// Reload known faces on every SIGHUP until shutdown.
///
/// The handler is registered before this returns, so a SIGHUP sent right
/// after startup cannot terminate the process.
#[cfg(unix)]
fn reload_on_hangup<G: PersistenceGateway + 'static>(
    ctx: OrchestratorContext<G>,
) -> Result<impl Future<Output = ()> + Send> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("failed to register SIGHUP")?;
    Ok(async move {
        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    match ctx.reload_known_faces().await {
                        Ok(count) => info!(encodings = count, "Known faces reloaded on SIGHUP"),
                        Err(e) => warn!(error = %e, "Known face reload failed"),
                    }
                }
            }
        }
    })
}

#[cfg(not(unix))]
fn reload_on_hangup<G: PersistenceGateway + 'static>(
    ctx: OrchestratorContext<G>,
) -> Result<impl Future<Output = ()> + Send> {
    Ok(async move { ctx.cancel.cancelled().await })
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).context("failed to register SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("failed to register SIGINT")?;

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigint.recv() => info!("Received SIGINT"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    info!("Received Ctrl-C");
    Ok(())
}
