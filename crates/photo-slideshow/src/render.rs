use tokio::sync::watch;

use crate::events::{ImageDescriptor, NowShowing, ShowContent};

/// Presentation side of the slideshow. Calls are fire-and-forget: a sink that
/// is still fading in the previous frame must let the newer call supersede it.
pub trait RenderSink {
    fn render(&mut self, image: &ImageDescriptor, title: &str, description: &str);

    /// Shown while the active list is empty.
    fn render_placeholder(&mut self);

    fn set_overlay_visible(&mut self, visible: bool);
}

/// Publishes each render call as the latest [`NowShowing`] value.
///
/// A watch channel keeps only the newest frame, so slow subscribers skip
/// stale frames instead of queueing them.
#[derive(Debug)]
pub struct WatchRenderSink {
    tx: watch::Sender<NowShowing>,
}

impl WatchRenderSink {
    pub fn new(overlay_visible: bool) -> (Self, watch::Receiver<NowShowing>) {
        let (tx, rx) = watch::channel(NowShowing {
            serial: 0,
            content: ShowContent::Idle,
            overlay_visible,
        });
        (Self { tx }, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<NowShowing> {
        self.tx.subscribe()
    }

    fn publish(&mut self, content: ShowContent) {
        self.tx.send_modify(|now| {
            now.serial += 1;
            now.content = content;
        });
    }
}

impl RenderSink for WatchRenderSink {
    fn render(&mut self, image: &ImageDescriptor, title: &str, description: &str) {
        self.publish(ShowContent::Image {
            image: image.clone(),
            title: title.to_owned(),
            description: description.to_owned(),
        });
    }

    fn render_placeholder(&mut self) {
        self.publish(ShowContent::Placeholder);
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        self.tx.send_if_modified(|now| {
            if now.overlay_visible == visible {
                false
            } else {
                now.overlay_visible = visible;
                true
            }
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    Image(ImageDescriptor),
    Placeholder,
    Overlay(bool),
}

/// Keeps every render call in memory. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Vec<RenderEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[RenderEvent] {
        &self.events
    }

    /// Ids of rendered images, in call order.
    pub fn rendered_ids(&self) -> Vec<u64> {
        self.events
            .iter()
            .filter_map(|event| match event {
                RenderEvent::Image(image) => Some(image.id),
                _ => None,
            })
            .collect()
    }

    pub fn rendered_images(&self) -> impl Iterator<Item = &ImageDescriptor> {
        self.events.iter().filter_map(|event| match event {
            RenderEvent::Image(image) => Some(image),
            _ => None,
        })
    }

    pub fn placeholder_count(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, RenderEvent::Placeholder))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl RenderSink for RecordingSink {
    fn render(&mut self, image: &ImageDescriptor, _title: &str, _description: &str) {
        self.events.push(RenderEvent::Image(image.clone()));
    }

    fn render_placeholder(&mut self) {
        self.events.push(RenderEvent::Placeholder);
    }

    fn set_overlay_visible(&mut self, visible: bool) {
        self.events.push(RenderEvent::Overlay(visible));
    }
}
