use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;
use tokio::net::{UnixListener, UnixStream};
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::RemoteCommand;

const READ_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_REQUEST_BYTES: u64 = 4 * 1024 * 1024;

/// Accept remote commands on a unix socket and forward them to the player.
///
/// Each connection carries one or more JSON documents and is closed by the
/// client once written. Connections are served one after another so commands
/// reach the player in arrival order.
pub async fn run(
    socket_path: PathBuf,
    commands_tx: Sender<RemoteCommand>,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = bind(&socket_path)?;
    info!(path = %socket_path.display(), "control socket listening");

    loop {
        select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok((stream, _addr)) => stream,
                    Err(err) => {
                        warn!(error = %err, "failed to accept control connection");
                        continue;
                    }
                };
                let Some(payload) = read_request(stream).await else {
                    continue;
                };
                for command in decode_commands(&payload) {
                    debug!(kind = command.kind(), "remote command received");
                    if commands_tx.send(command).await.is_err() {
                        debug!("player gone; control socket stopping");
                        cleanup(&socket_path);
                        return Ok(());
                    }
                }
            }
        }
    }

    cleanup(&socket_path);
    Ok(())
}

fn bind(path: &Path) -> Result<UnixListener> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    match fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale control socket"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to remove stale socket {}", path.display()));
        }
    }
    UnixListener::bind(path)
        .with_context(|| format!("failed to bind control socket at {}", path.display()))
}

async fn read_request(stream: UnixStream) -> Option<Vec<u8>> {
    let mut payload = Vec::new();
    let mut limited = stream.take(MAX_REQUEST_BYTES);
    match timeout(READ_TIMEOUT, limited.read_to_end(&mut payload)).await {
        Ok(Ok(_)) => Some(payload),
        Ok(Err(err)) => {
            warn!(error = %err, "failed to read control request");
            None
        }
        Err(_) => {
            warn!(
                timeout = %humantime::format_duration(READ_TIMEOUT),
                "control client did not finish its request in time"
            );
            None
        }
    }
}

fn cleanup(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to remove control socket");
        }
    }
}

/// Decode a stream of concatenated JSON documents.
///
/// A malformed document ends decoding for the rest of the payload; everything
/// decoded before it is kept. Well-formed JSON that is not a known command is
/// skipped individually.
pub fn decode_commands(payload: &[u8]) -> Vec<RemoteCommand> {
    let mut commands = Vec::new();
    let stream = serde_json::Deserializer::from_slice(payload).into_iter::<serde_json::Value>();
    for value in stream {
        let value = match value {
            Ok(value) => value,
            Err(err) => {
                warn!(error = %err, "dropping malformed control payload");
                break;
            }
        };
        match serde_json::from_value::<RemoteCommand>(value) {
            Ok(command) => commands.push(command),
            Err(err) => warn!(error = %err, "ignoring unrecognized remote command"),
        }
    }
    commands
}
