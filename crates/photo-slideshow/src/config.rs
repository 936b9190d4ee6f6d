use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::events::ImageDescriptor;
use crate::library;

pub use config_model::{OrderMode, SlideshowSettings};

pub const DEFAULT_CONTROL_SOCKET_PATH: &str = "/run/photo-slideshow/control.sock";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Root directory to scan recursively for images.
    pub photo_library_path: PathBuf,
    /// YAML list of image descriptors; replaces the directory scan when set.
    pub manifest_path: Option<PathBuf>,
    /// Unix domain socket accepting remote commands.
    #[serde(default = "Configuration::default_control_socket_path")]
    pub control_socket_path: PathBuf,
    /// Where playback settings are persisted. In-memory only when unset.
    pub settings_path: Option<PathBuf>,
    /// Playback settings used until the settings store has its own.
    pub settings: SlideshowSettings,
    /// Length of the crossfade between two images.
    #[serde(with = "humantime_serde")]
    pub crossfade: Duration,
    /// Start cycling as soon as the library is loaded.
    pub autoplay: bool,
    /// Deterministic seed for the random order.
    pub shuffle_seed: Option<u64>,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.manifest_path.is_some() || !self.photo_library_path.as_os_str().is_empty(),
            "either photo-library-path or manifest-path must be set"
        );
        ensure!(
            !self.control_socket_path.as_os_str().is_empty(),
            "control-socket-path must not be empty"
        );
        ensure!(
            self.control_socket_path.file_name().is_some(),
            "control-socket-path must include a socket file name"
        );
        if let Some(path) = &self.settings_path {
            ensure!(
                path.file_name().is_some(),
                "settings-path must include a file name"
            );
        }
        ensure!(
            self.crossfade < self.settings.interval().unwrap_or(Duration::MAX),
            "crossfade must be shorter than settings.speed"
        );
        self.settings
            .validate()
            .context("invalid settings configuration")?;
        Ok(self)
    }

    /// The playable set: the manifest when configured, otherwise a scan of
    /// the photo library.
    pub fn load_images(&self) -> Result<Vec<ImageDescriptor>> {
        match &self.manifest_path {
            Some(manifest) => library::load_manifest(manifest),
            None => library::discover_images(&self.photo_library_path),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::new(),
            manifest_path: None,
            control_socket_path: Self::default_control_socket_path(),
            settings_path: None,
            settings: SlideshowSettings::default(),
            crossfade: Self::default_crossfade(),
            autoplay: true,
            shuffle_seed: None,
        }
    }
}

impl Configuration {
    fn default_control_socket_path() -> PathBuf {
        PathBuf::from(DEFAULT_CONTROL_SOCKET_PATH)
    }

    const fn default_crossfade() -> Duration {
        Duration::from_secs(1)
    }
}
