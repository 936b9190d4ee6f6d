use config_model::OrderMode;
use serde::{Deserialize, Serialize};

/// One playable image. Owned by whichever list currently holds it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageDescriptor {
    pub id: u64,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigateAction {
    Next,
    Prev,
    TogglePause,
}

/// Instruction arriving from another client (admin console, control CLI).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RemoteCommand {
    /// Show this image now and stop cycling.
    DirectImage { image: ImageDescriptor },
    /// Replace the playable set and start playing it.
    Selection {
        images: Vec<ImageDescriptor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        order: Option<OrderMode>,
    },
    Navigate { action: NavigateAction },
    #[serde(rename_all = "kebab-case")]
    Settings {
        speed: f64,
        order: OrderMode,
        #[serde(
            default,
            alias = "overlayVisible",
            skip_serializing_if = "Option::is_none"
        )]
        overlay_visible: Option<bool>,
    },
}

impl RemoteCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteCommand::DirectImage { .. } => "direct-image",
            RemoteCommand::Selection { .. } => "selection",
            RemoteCommand::Navigate { .. } => "navigate",
            RemoteCommand::Settings { .. } => "settings",
        }
    }
}

/// What the display surface should currently present.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ShowContent {
    /// Nothing rendered yet.
    #[default]
    Idle,
    /// The active list is empty.
    Placeholder,
    Image {
        image: ImageDescriptor,
        title: String,
        description: String,
    },
}

/// Latest render request published by the engine.
///
/// `serial` increases with every render call so subscribers can tell a new
/// frame apart from an overlay-only change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowShowing {
    pub serial: u64,
    pub content: ShowContent,
    pub overlay_visible: bool,
}

impl NowShowing {
    pub fn image_id(&self) -> Option<u64> {
        match &self.content {
            ShowContent::Image { image, .. } => Some(image.id),
            _ => None,
        }
    }
}

/// Emitted by the display once a frame's crossfade has completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Displayed {
    pub serial: u64,
    pub image_id: Option<u64>,
}
