use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Serialize};

pub use order::OrderMode;
pub use settings::SlideshowSettings;

mod order {
    use super::*;

    /// How the next image of the active list is chosen.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case")]
    pub enum OrderMode {
        #[default]
        Sequential,
        Alphabetical,
        Random,
    }

    impl OrderMode {
        pub const ALL: [OrderMode; 3] = [
            OrderMode::Sequential,
            OrderMode::Alphabetical,
            OrderMode::Random,
        ];

        pub fn as_str(self) -> &'static str {
            match self {
                OrderMode::Sequential => "sequential",
                OrderMode::Alphabetical => "alphabetical",
                OrderMode::Random => "random",
            }
        }
    }

    impl fmt::Display for OrderMode {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    impl FromStr for OrderMode {
        type Err = anyhow::Error;

        fn from_str(value: &str) -> Result<Self> {
            let normalized = value.trim().to_ascii_lowercase();
            match normalized.as_str() {
                "sequential" => Ok(OrderMode::Sequential),
                "alphabetical" => Ok(OrderMode::Alphabetical),
                "random" => Ok(OrderMode::Random),
                other => bail!(
                    "unknown order '{}' (expected sequential, alphabetical or random)",
                    other
                ),
            }
        }
    }
}

mod settings {
    use super::*;

    /// User-facing playback settings shared by the display and remote controllers.
    #[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
    #[serde(rename_all = "kebab-case", default)]
    pub struct SlideshowSettings {
        /// Seconds each image stays on screen before auto-advance.
        pub speed: f64,
        pub order: OrderMode,
        /// Whether the title/description overlay is drawn over the photo.
        #[serde(alias = "overlayVisible")]
        pub overlay_visible: bool,
    }

    impl SlideshowSettings {
        const DEFAULT_SPEED_SECONDS: f64 = 10.0;

        /// Interval between automatic advances, or `None` when `speed` cannot drive a timer.
        pub fn interval(&self) -> Option<Duration> {
            if !self.speed.is_finite() || self.speed <= 0.0 {
                return None;
            }
            Duration::try_from_secs_f64(self.speed).ok()
        }

        pub fn validate(&self) -> Result<()> {
            ensure!(
                self.speed.is_finite() && self.speed > 0.0,
                "settings.speed must be a positive number of seconds"
            );
            ensure!(
                self.interval().is_some(),
                "settings.speed is too large to schedule"
            );
            Ok(())
        }
    }

    impl Default for SlideshowSettings {
        fn default() -> Self {
            Self {
                speed: Self::DEFAULT_SPEED_SECONDS,
                order: OrderMode::default(),
                overlay_visible: true,
            }
        }
    }
}
