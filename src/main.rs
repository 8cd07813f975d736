use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use curved_carousel::config::Configuration;
use curved_carousel::events::{CarouselCommand, LoadImage, LoaderEvent};
use curved_carousel::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "curved-carousel",
    version,
    about = "infinitely looping curved image carousel"
)]
struct Args {
    /// Path to YAML config; defaults apply when omitted
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,
    /// Start with auto-scroll paused
    #[arg(long)]
    paused: bool,
    /// Image file or directory to show instead of the configured list (repeatable)
    #[arg(long = "image", value_name = "PATH")]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG controls level, default = info
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,wgpu=warn,winit=warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        paused,
        images,
    } = Args::parse();

    let mut cfg = match config.as_ref() {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    };
    if paused {
        cfg.start_paused = true;
    }
    if !images.is_empty() {
        cfg.images = images;
    }
    let mut cfg = cfg.validated().context("invalid configuration values")?;
    cfg.images = tasks::files::discover_images(&cfg.images)?;
    tracing::info!("Loaded configuration:\n{:#?}", cfg);

    let (load_tx, load_rx) = mpsc::unbounded_channel::<LoadImage>(); // Viewer -> Loader
    let (loaded_tx, loaded_rx) = mpsc::channel::<LoaderEvent>(cfg.images.len().max(1)); // Loader -> Viewer
    let (control_tx, control_rx) = mpsc::channel::<CarouselCommand>(16); // External -> Viewer

    let cancel = CancellationToken::new();

    // Ctrl-D/Ctrl-C tear the carousel down. The stdin reader is a detached
    // thread so a pending read never holds up runtime shutdown.
    if io::stdin().is_terminal() {
        let cancel = cancel.clone();
        std::thread::spawn(move || {
            let mut sink = Vec::new();
            match io::stdin().read_to_end(&mut sink) {
                Ok(_) => tracing::info!("stdin closed; initiating shutdown"),
                Err(err) => tracing::warn!("stdin watcher failed: {err}"),
            }
            cancel.cancel();
        });
    } else {
        tracing::debug!("stdin is not a terminal; skipping shutdown watcher");
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        let control = control_tx.clone();
        tokio::spawn(async move {
            match signal(SignalKind::user_defined1()) {
                Ok(mut sigusr1) => loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        received = sigusr1.recv() => {
                            if received.is_none() {
                                break;
                            }
                            tracing::info!("SIGUSR1 received; toggling pause");
                            if let Err(err) = control.send(CarouselCommand::TogglePause).await {
                                tracing::warn!("failed to forward pause toggle: {err}");
                                break;
                            }
                        }
                    }
                },
                Err(err) => tracing::warn!("failed to register SIGUSR1 handler: {err}"),
            }
        });
    }

    let mut tasks = JoinSet::new();

    // Loader
    tasks.spawn({
        let cancel = cancel.clone();
        let max_in_flight = cfg.loader_max_concurrent_decodes;
        async move {
            tasks::loader::run(load_rx, loaded_tx, cancel, max_in_flight)
                .await
                .context("loader task failed")
        }
    });

    // The window runs on this thread and returns once it closes or cancellation fires
    if let Err(e) = tasks::viewer::run_windowed(
        cfg,
        load_tx,
        loaded_rx,
        control_rx,
        cancel.clone(),
    )
    .context("viewer failed")
    {
        tracing::error!("{e:?}");
    }
    drop(control_tx);
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
