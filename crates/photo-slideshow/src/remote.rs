//! Translation of inbound remote commands into engine calls.
//!
//! This is the only path by which external commands reach the engine. Each
//! command is applied in full before the next one is looked at, and always
//! against the engine's current state (a timer tick may have moved it since
//! the command was sent).

use tracing::debug;

use crate::clock::Clock;
use crate::engine::SequencingEngine;
use crate::events::{NavigateAction, RemoteCommand};
use crate::render::RenderSink;

pub fn apply<S, C>(engine: &mut SequencingEngine<S, C>, command: RemoteCommand)
where
    S: RenderSink,
    C: Clock,
{
    debug!(kind = command.kind(), "applying remote command");
    match command {
        RemoteCommand::DirectImage { image } => {
            engine.jump_to(image);
            engine.pause();
        }
        RemoteCommand::Selection {
            images,
            speed,
            order,
        } => {
            if let Some(speed) = speed {
                engine.set_interval_secs(speed);
            }
            if let Some(order) = order {
                engine.set_order(order);
            }
            engine.load_source(images);
            engine.play();
        }
        RemoteCommand::Navigate { action } => match action {
            NavigateAction::Next => engine.advance(),
            NavigateAction::Prev => engine.retreat(),
            NavigateAction::TogglePause => {
                if engine.is_playing() {
                    engine.pause();
                } else {
                    engine.play();
                }
            }
        },
        RemoteCommand::Settings {
            speed,
            order,
            overlay_visible,
        } => {
            engine.set_interval_secs(speed);
            engine.set_order(order);
            if let Some(visible) = overlay_visible {
                engine.sink_mut().set_overlay_visible(visible);
            }
        }
    }
}
