use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{Displayed, NowShowing, ShowContent};

struct Crossfade {
    serial: u64,
    image_id: Option<u64>,
    done_at: Instant,
}

/// Headless display surface: runs a crossfade for every new frame.
///
/// A frame that arrives mid-fade cancels the running fade and starts its own;
/// fades never stack. Each completed fade is reported on `displayed_tx`.
pub async fn run(
    mut frames: watch::Receiver<NowShowing>,
    crossfade: Duration,
    displayed_tx: Sender<Displayed>,
    cancel: CancellationToken,
) -> Result<()> {
    // A frame published before we subscribed still needs its fade.
    let initial = frames.borrow_and_update().clone();
    let mut last_serial = initial.serial;
    let mut overlay_visible = initial.overlay_visible;
    let mut in_flight = start_fade(&initial, crossfade);

    loop {
        let done_at = in_flight.as_ref().map(|fade| fade.done_at);

        select! {
            _ = cancel.cancelled() => break,

            changed = frames.changed() => {
                if changed.is_err() {
                    debug!("render sink dropped; display stopping");
                    break;
                }
                let frame = frames.borrow_and_update().clone();
                if frame.overlay_visible != overlay_visible {
                    overlay_visible = frame.overlay_visible;
                    info!(overlay_visible, "overlay visibility changed");
                }
                if frame.serial == last_serial {
                    continue;
                }
                last_serial = frame.serial;

                if let Some(previous) = in_flight.take() {
                    debug!(
                        superseded = previous.serial,
                        by = frame.serial,
                        "crossfade cancelled by newer frame"
                    );
                }
                in_flight = start_fade(&frame, crossfade);
            }

            _ = sleep_until(done_at.unwrap_or_else(Instant::now)), if done_at.is_some() => {
                if let Some(fade) = in_flight.take() {
                    let shown = Displayed {
                        serial: fade.serial,
                        image_id: fade.image_id,
                    };
                    if displayed_tx.send(shown).await.is_err() {
                        debug!("displayed receiver closed");
                    }
                }
            }
        }
    }

    Ok(())
}

fn start_fade(frame: &NowShowing, crossfade: Duration) -> Option<Crossfade> {
    match &frame.content {
        ShowContent::Image { image, title, .. } => {
            debug!(id = image.id, title = %title, url = %image.url, "crossfade started");
        }
        ShowContent::Placeholder => info!("no images; showing placeholder"),
        ShowContent::Idle => return None,
    }
    Some(Crossfade {
        serial: frame.serial,
        image_id: frame.image_id(),
        done_at: Instant::now() + crossfade,
    })
}
