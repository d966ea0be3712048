//! Configuration for the move detector.

use crate::core::windowing::extract_size;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Samples per classification window (N)
    pub window_size: usize,

    /// Fraction of each window carried over from the previous one, in [0, 1)
    pub overlap: f64,

    /// Predictions at or below this confidence are ignored
    pub confidence_threshold: f64,

    /// Trailing identical confident predictions required to confirm a move (K)
    pub consensus_size: usize,

    /// Time after start before any classification happens
    #[serde(with = "duration_millis")]
    pub warmup: Duration,

    /// Minimum spacing between dispatch-eligible evaluations.
    /// Derived from window size and overlap when unset.
    #[serde(with = "option_duration_millis")]
    pub eval_interval: Option<Duration>,

    /// Moves that must be sent before a logout is accepted
    pub logout_min_sent: u64,

    /// Pre-shared AES key (16, 24 or 32 bytes)
    pub secret_key: String,

    /// Padding block size for outbound events
    pub block_size: usize,

    /// Serial link settings
    pub serial: SerialConfig,

    /// Centroid model file used by the classifier
    pub model_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: 128,
            overlap: 0.75,
            confidence_threshold: 0.75,
            consensus_size: 2,
            warmup: Duration::from_millis(61_500),
            eval_interval: None,
            logout_min_sent: 40,
            secret_key: "1234123412341234".to_string(),
            block_size: 32,
            serial: SerialConfig::default(),
            model_path: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wearable-move-detector")
            .join("config.json")
    }

    /// Fresh samples read per window once overlap is active.
    pub fn extract_size(&self) -> usize {
        extract_size(self.window_size, self.overlap)
    }

    /// Evaluation spacing, either configured or looked up from the window shape.
    pub fn eval_interval(&self) -> Duration {
        self.eval_interval
            .unwrap_or_else(|| default_eval_interval(self.window_size, self.overlap))
    }

    /// Check that the values describe a runnable detector.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be positive".into()));
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(ConfigError::Invalid(format!(
                "overlap must be in [0, 1), got {}",
                self.overlap
            )));
        }
        if self.extract_size() == 0 {
            return Err(ConfigError::Invalid(format!(
                "overlap {} leaves no fresh samples in a window of {}",
                self.overlap, self.window_size
            )));
        }
        if self.consensus_size == 0 {
            return Err(ConfigError::Invalid("consensus_size must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "confidence_threshold must be in [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if ![16, 24, 32].contains(&self.secret_key.len()) {
            return Err(ConfigError::Invalid(format!(
                "secret_key must be 16, 24 or 32 bytes, got {}",
                self.secret_key.len()
            )));
        }
        if self.block_size == 0 || self.block_size % 16 != 0 || self.block_size > 255 {
            return Err(ConfigError::Invalid(format!(
                "block_size must be a positive multiple of 16 up to 255, got {}",
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Best-case evaluation spacing measured for each deployed window shape.
pub fn default_eval_interval(window_size: usize, overlap: f64) -> Duration {
    let overlap_pct = (overlap * 100.0).round() as u32;
    let millis = match (window_size, overlap_pct) {
        (128, 75) => 1000,
        (128, 50) => 1160,
        (128, 25) => 1020,
        (128, 0) => 880,
        (64, 75) => 1400,
        (64, 50) => 1080,
        (64, 25) => 1260,
        _ => 940,
    };
    Duration::from_millis(millis)
}

/// Configuration for the serial link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path of the serial port
    pub path: String,
    pub baud_rate: u32,
    /// Per-read timeout on the port
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Pause between handshake steps
    #[serde(with = "duration_millis")]
    pub handshake_interval: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/serial0".to_string(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(3),
            handshake_interval: Duration::from_millis(500),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde support for optional Duration as milliseconds.
mod option_duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
