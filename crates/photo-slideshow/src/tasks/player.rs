use std::sync::Arc;

use anyhow::Result;
use config_model::SlideshowSettings;
use tokio::select;
use tokio::sync::mpsc::Receiver;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::engine::SequencingEngine;
use crate::events::{Displayed, RemoteCommand};
use crate::remote;
use crate::render::RenderSink;
use crate::settings::SettingsStore;

/// Owns the engine and feeds it from every event source, one event at a time.
///
/// Sources:
/// - the engine's own auto-advance deadline,
/// - remote commands (applied in arrival order),
/// - settings changes from the settings store,
/// - displayed notifications from the display (informational).
///
/// Returns the engine once cancelled so callers can inspect the final state.
pub async fn run<S, C>(
    mut engine: SequencingEngine<S, C>,
    mut commands: Receiver<RemoteCommand>,
    store: Arc<dyn SettingsStore>,
    mut displayed_rx: Receiver<Displayed>,
    cancel: CancellationToken,
) -> Result<SequencingEngine<S, C>>
where
    S: RenderSink,
    C: Clock,
{
    let mut settings = store.subscribe();
    // Catch up on anything published before we subscribed.
    apply_settings(&mut engine, &settings.latest());
    let mut commands_open = true;
    let mut settings_open = true;
    let mut displayed_open = true;

    loop {
        let deadline = engine.next_deadline();

        select! {
            biased;

            _ = cancel.cancelled() => break,

            maybe_cmd = commands.recv(), if commands_open => {
                match maybe_cmd {
                    Some(command) => {
                        let saved = settings_to_save(&command, &store.settings());
                        remote::apply(&mut engine, command);
                        if let Some(Err(err)) = saved.map(|saved| store.update(saved)) {
                            warn!(error = %err, "remote settings not saved");
                        }
                    }
                    None => {
                        // Transport gone; keep playing what we have.
                        debug!("command channel closed");
                        commands_open = false;
                    }
                }
            }

            changed = settings.changed(), if settings_open => {
                match changed {
                    Some(latest) => apply_settings(&mut engine, &latest),
                    None => {
                        warn!("settings store closed; keeping current settings");
                        settings_open = false;
                    }
                }
            }

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                engine.on_timer();
            }

            maybe_disp = displayed_rx.recv(), if displayed_open => {
                match maybe_disp {
                    Some(Displayed { serial, image_id }) => {
                        debug!(serial, image_id, "displayed");
                    }
                    None => displayed_open = false,
                }
            }
        }
    }

    info!("player stopped");
    Ok(engine)
}

/// React to a change made through the settings store (another client or an
/// edited settings file).
pub fn apply_settings<S, C>(engine: &mut SequencingEngine<S, C>, settings: &SlideshowSettings)
where
    S: RenderSink,
    C: Clock,
{
    engine.set_interval_secs(settings.speed);
    engine.set_order(settings.order);
    engine.sink_mut().set_overlay_visible(settings.overlay_visible);
}

fn settings_to_save(
    command: &RemoteCommand,
    current: &SlideshowSettings,
) -> Option<SlideshowSettings> {
    match *command {
        RemoteCommand::Settings {
            speed,
            order,
            overlay_visible,
        } => {
            let mut saved = SlideshowSettings {
                speed,
                order,
                overlay_visible: overlay_visible.unwrap_or(current.overlay_visible),
            };
            // The engine ignores a bad speed but still takes the order.
            if saved.interval().is_none() {
                saved.speed = current.speed;
            }
            Some(saved)
        }
        _ => None,
    }
}
