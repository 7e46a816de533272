use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional engine configuration file inside the data directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the local data directory for sleeploops.
///
/// # Errors
///
/// Returns an error if the local data directory cannot be determined.
pub fn get_data_dir() -> Result<PathBuf> {
    let mut path =
        dirs::data_local_dir().ok_or_else(|| anyhow::anyhow!("Failed to get local data dir"))?;
    path.push("sleeploops");
    Ok(path)
}

/// Tunables that are not exposed as user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Two sessions starting closer than this are treated as the same sleep
    pub dedup_window_minutes: u64,
    /// Upper bound for a single device signal read
    pub signal_timeout_ms: u64,
    /// Length of one sleep cycle
    pub cycle_minutes: u32,
    /// Time it usually takes to fall asleep
    pub fall_asleep_buffer_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dedup_window_minutes: 60,
            signal_timeout_ms: 2_000,
            cycle_minutes: 90,
            fall_asleep_buffer_minutes: 15,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file, falling back to defaults when the file is absent
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Load `config.toml` from the data directory
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory is unknown or the file is malformed
    pub fn load_default() -> Result<Self> {
        Self::load(&get_data_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Dedup window in milliseconds
    #[must_use]
    pub fn dedup_window_ms(&self) -> i64 {
        i64::try_from(self.dedup_window_minutes.saturating_mul(60_000)).unwrap_or(i64::MAX)
    }

    #[must_use]
    pub const fn signal_timeout(&self) -> Duration {
        Duration::from_millis(self.signal_timeout_ms)
    }
}
