use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

use photo_slideshow::clock::TokioClock;
use photo_slideshow::config::Configuration;
use photo_slideshow::engine::{SequencingEngine, simulate_show};
use photo_slideshow::events::{Displayed, RemoteCommand};
use photo_slideshow::ordering::RngShuffler;
use photo_slideshow::render::WatchRenderSink;
use photo_slideshow::settings::{MemorySettingsStore, SettingsStore, YamlSettingsStore};
use photo_slideshow::tasks;

#[derive(Debug, Parser)]
#[command(
    name = "photo-slideshow",
    version,
    about = "Slideshow sequencer for a networked photo frame"
)]
struct Args {
    /// Path to YAML config
    #[arg(value_name = "CONFIG")]
    config: PathBuf,
    /// Deterministic RNG seed for random order (overrides shuffle-seed)
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Print the first N images the slideshow would show and exit
    #[arg(long = "dry-run", value_name = "ITERATIONS")]
    dry_run: Option<usize>,
    /// Start paused regardless of the autoplay setting
    #[arg(long)]
    paused: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // init tracing (RUST_LOG controls level, default = info)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let Args {
        config,
        seed,
        dry_run,
        paused,
    } = Args::parse();

    let cfg = Configuration::from_yaml_file(&config)
        .with_context(|| format!("failed to load configuration from {}", config.display()))?
        .validated()
        .context("invalid configuration values")?;
    tracing::info!(
        "Loaded configuration from {}:\n{:#?}",
        config.display(),
        cfg
    );
    let seed = seed.or(cfg.shuffle_seed);

    let saved_settings = cfg
        .settings_path
        .as_ref()
        .map(|path| Arc::new(YamlSettingsStore::open(path, cfg.settings.clone())));
    let store: Arc<dyn SettingsStore> = match &saved_settings {
        Some(saved) => Arc::clone(saved) as Arc<dyn SettingsStore>,
        None => Arc::new(MemorySettingsStore::new(cfg.settings.clone())),
    };
    let images = cfg.load_images().context("failed to load images")?;

    if let Some(iterations) = dry_run {
        run_dry_run(&cfg, images, &store.settings(), iterations, seed);
        return Ok(());
    }

    let settings = store.settings();
    let (sink, frames) = WatchRenderSink::new(settings.overlay_visible);
    let mut engine = SequencingEngine::new(
        sink,
        TokioClock,
        Box::new(RngShuffler::from_seed(seed)),
        &settings,
    );
    if cfg.autoplay && !paused {
        engine.request_playback();
    }
    engine.load_source(images);

    // Channels (small/bounded)
    let (commands_tx, commands_rx) = mpsc::channel::<RemoteCommand>(32); // Control -> Player
    let (displayed_tx, displayed_rx) = mpsc::channel::<Displayed>(16); // Display -> Player

    let cancel = CancellationToken::new();

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
        if let Some(saved) = saved_settings {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                match signal(SignalKind::hangup()) {
                    Ok(mut sighup) => loop {
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            received = sighup.recv() => {
                                if received.is_none() {
                                    break;
                                }
                                tracing::info!(path = %saved.path().display(), "SIGHUP received; reloading settings");
                                if !saved.reload() {
                                    tracing::debug!("settings file unchanged");
                                }
                            }
                        }
                    },
                    Err(err) => tracing::warn!("failed to register SIGHUP handler: {err}"),
                }
            });
        }
    }

    let mut tasks = JoinSet::new();

    // Control socket
    #[cfg(unix)]
    {
        let socket_path = cfg.control_socket_path.clone();
        let commands_tx = commands_tx.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            tasks::control::run(socket_path, commands_tx, cancel)
                .await
                .context("control task failed")
        });
    }
    drop(commands_tx);

    // Display
    tasks.spawn({
        let crossfade = cfg.crossfade;
        let cancel = cancel.clone();
        async move {
            tasks::display::run(frames, crossfade, displayed_tx, cancel)
                .await
                .context("display task failed")
        }
    });

    // Player
    tasks.spawn({
        let store = Arc::clone(&store);
        let cancel = cancel.clone();
        async move {
            let engine = tasks::player::run(engine, commands_rx, store, displayed_rx, cancel)
                .await
                .context("player task failed")?;
            tracing::info!(
                status = ?engine.status(),
                current = ?engine.current_image().map(|image| image.id),
                "final playback state"
            );
            Ok(())
        }
    });

    // Any task ending brings the others down with it.
    if let Some(res) = tasks.join_next().await {
        log_task_result(res);
    }
    cancel.cancel();

    // Drain JoinSet (wait for other tasks to complete)
    while let Some(res) = tasks.join_next().await {
        log_task_result(res);
    }

    Ok(())
}

fn log_task_result(res: Result<Result<()>, tokio::task::JoinError>) {
    match res {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("task error: {e:?}"),
        Err(e) => tracing::error!("join error: {e}"),
    }
}

fn run_dry_run(
    cfg: &Configuration,
    images: Vec<photo_slideshow::events::ImageDescriptor>,
    settings: &photo_slideshow::config::SlideshowSettings,
    iterations: usize,
    seed: Option<u64>,
) {
    let interval = settings
        .interval()
        .map(|interval| humantime::format_duration(interval).to_string())
        .unwrap_or_else(|| "(invalid)".to_string());
    println!(
        "# slideshow dry run\n# images: {}\n# order: {}\n# interval: {}\n# iterations: {}\n# seed: {}\n",
        images.len(),
        settings.order,
        interval,
        iterations,
        seed.map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );

    if images.is_empty() {
        match &cfg.manifest_path {
            Some(manifest) => println!("(no images listed in {})", manifest.display()),
            None => println!(
                "(no images discovered under {})",
                cfg.photo_library_path.display()
            ),
        }
        return;
    }

    let plan = simulate_show(images, settings, iterations, seed);
    println!("# planned order:");
    for (idx, image) in plan.iter().enumerate() {
        println!("  {:>4}: [{}] {}", idx + 1, image.id, image.title);
    }
}
