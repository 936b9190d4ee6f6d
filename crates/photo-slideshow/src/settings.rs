use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config_model::SlideshowSettings;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Source of truth for the user-facing playback settings.
pub trait SettingsStore: Send + Sync {
    fn settings(&self) -> SlideshowSettings;

    /// Validate, store and broadcast new settings.
    fn update(&self, settings: SlideshowSettings) -> Result<()>;

    /// Change notifications. Dropping the subscription unsubscribes.
    fn subscribe(&self) -> SettingsSubscription;
}

#[derive(Debug)]
pub struct SettingsSubscription {
    rx: watch::Receiver<SlideshowSettings>,
}

impl SettingsSubscription {
    /// Wait for the next change. `None` once the store has gone away.
    pub async fn changed(&mut self) -> Option<SlideshowSettings> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    pub fn latest(&self) -> SlideshowSettings {
        self.rx.borrow().clone()
    }
}

/// In-process store; nothing survives a restart.
#[derive(Debug)]
pub struct MemorySettingsStore {
    tx: watch::Sender<SlideshowSettings>,
}

impl MemorySettingsStore {
    pub fn new(initial: SlideshowSettings) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    /// Publish without validation. Returns whether anything changed.
    fn publish(&self, settings: SlideshowSettings) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == settings {
                false
            } else {
                *current = settings;
                true
            }
        })
    }
}

impl SettingsStore for MemorySettingsStore {
    fn settings(&self) -> SlideshowSettings {
        self.tx.borrow().clone()
    }

    fn update(&self, settings: SlideshowSettings) -> Result<()> {
        settings.validate()?;
        if self.publish(settings) {
            debug!("settings updated");
        }
        Ok(())
    }

    fn subscribe(&self) -> SettingsSubscription {
        SettingsSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// Store persisted as a small YAML document so settings survive restarts.
#[derive(Debug)]
pub struct YamlSettingsStore {
    path: PathBuf,
    fallback: SlideshowSettings,
    inner: MemorySettingsStore,
}

impl YamlSettingsStore {
    /// Open the store, falling back to `fallback` when the file is missing or
    /// unusable.
    pub fn open(path: impl Into<PathBuf>, fallback: SlideshowSettings) -> Self {
        let path = path.into();
        let initial = read_settings(&path).unwrap_or_else(|| fallback.clone());
        info!(path = %path.display(), ?initial, "settings store opened");
        Self {
            path,
            fallback,
            inner: MemorySettingsStore::new(initial),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pick up edits made to the file by someone else.
    pub fn reload(&self) -> bool {
        let settings = read_settings(&self.path).unwrap_or_else(|| self.fallback.clone());
        let changed = self.inner.publish(settings);
        if changed {
            info!(path = %self.path.display(), "settings reloaded from disk");
        }
        changed
    }

    fn persist(&self, settings: &SlideshowSettings) -> Result<()> {
        let yaml = serde_yaml::to_string(settings).context("failed to serialize settings")?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let tmp = self.path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml).with_context(|| format!("failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

impl SettingsStore for YamlSettingsStore {
    fn settings(&self) -> SlideshowSettings {
        self.inner.settings()
    }

    fn update(&self, settings: SlideshowSettings) -> Result<()> {
        settings.validate()?;
        self.persist(&settings)?;
        self.inner.publish(settings);
        Ok(())
    }

    fn subscribe(&self) -> SettingsSubscription {
        self.inner.subscribe()
    }
}

fn read_settings(path: &Path) -> Option<SlideshowSettings> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no saved settings; using defaults");
            return None;
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to read saved settings");
            return None;
        }
    };
    let settings: SlideshowSettings = match serde_yaml::from_str(&contents) {
        Ok(settings) => settings,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "ignoring unparsable saved settings");
            return None;
        }
    };
    if let Err(err) = settings.validate() {
        warn!(path = %path.display(), error = %err, "ignoring invalid saved settings");
        return None;
    }
    Some(settings)
}
