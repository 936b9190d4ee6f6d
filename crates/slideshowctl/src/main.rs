use std::io::Write;
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config_model::OrderMode;
use photo_slideshow::config::DEFAULT_CONTROL_SOCKET_PATH;
use photo_slideshow::events::{ImageDescriptor, NavigateAction, RemoteCommand};
use photo_slideshow::library;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "slideshowctl",
    about = "Send a remote command to the photo slideshow"
)]
struct Args {
    /// Slideshow control socket.
    #[arg(long, default_value = DEFAULT_CONTROL_SOCKET_PATH)]
    control_socket: PathBuf,

    /// Logging level (error|warn|info|debug|trace).
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Print the JSON instead of sending it.
    #[arg(long)]
    print: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the next image.
    Next,
    /// Show the previous image.
    Prev,
    /// Pause a playing slideshow or resume a paused one.
    Toggle,
    /// Change the playback settings.
    Settings {
        /// Seconds per image.
        #[arg(long)]
        speed: f64,
        /// sequential, alphabetical or random.
        #[arg(long)]
        order: OrderMode,
        /// Show or hide the title overlay.
        #[arg(long)]
        overlay: Option<bool>,
    },
    /// Show one image and stop cycling.
    Show {
        #[arg(long)]
        id: u64,
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Replace the playable set with the images of a manifest and play it.
    Play {
        /// YAML list of image descriptors.
        #[arg(long)]
        manifest: PathBuf,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long)]
        order: Option<OrderMode>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level)?;

    let command = build_command(args.command)?;
    let payload = serde_json::to_vec(&command).context("failed to encode command")?;

    if args.print {
        println!("{}", String::from_utf8_lossy(&payload));
        return Ok(());
    }

    send(&args.control_socket, &payload)?;
    info!(kind = command.kind(), "command sent");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    let filter = EnvFilter::builder()
        .parse(level)
        .with_context(|| format!("invalid log level '{level}'"))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn build_command(command: Command) -> Result<RemoteCommand> {
    let remote = match command {
        Command::Next => RemoteCommand::Navigate {
            action: NavigateAction::Next,
        },
        Command::Prev => RemoteCommand::Navigate {
            action: NavigateAction::Prev,
        },
        Command::Toggle => RemoteCommand::Navigate {
            action: NavigateAction::TogglePause,
        },
        Command::Settings {
            speed,
            order,
            overlay,
        } => RemoteCommand::Settings {
            speed,
            order,
            overlay_visible: overlay,
        },
        Command::Show {
            id,
            url,
            title,
            description,
        } => RemoteCommand::DirectImage {
            image: ImageDescriptor {
                id,
                url,
                title,
                description,
                tags: Vec::new(),
            },
        },
        Command::Play {
            manifest,
            speed,
            order,
        } => {
            let images = library::load_manifest(&manifest)?;
            debug!(images = images.len(), "selection built from manifest");
            RemoteCommand::Selection {
                images,
                speed,
                order,
            }
        }
    };
    Ok(remote)
}

fn send(socket: &Path, payload: &[u8]) -> Result<()> {
    let mut stream = UnixStream::connect(socket).with_context(|| {
        format!("failed to connect to control socket at {}", socket.display())
    })?;
    stream
        .write_all(payload)
        .context("failed to send command")?;
    // The slideshow reads until end of stream.
    stream
        .shutdown(Shutdown::Write)
        .context("failed to finish command")?;
    Ok(())
}
