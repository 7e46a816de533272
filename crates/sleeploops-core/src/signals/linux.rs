use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::DeviceSignalSource;
use crate::error::SignalError;

/// Reads power and backlight state from sysfs
pub struct SysfsSignals {
    class_root: PathBuf,
}

impl SysfsSignals {
    #[must_use]
    pub fn new() -> Self {
        Self::with_root("/sys/class")
    }

    /// Use a different sysfs class directory (mostly useful for tests)
    #[must_use]
    pub fn with_root(class_root: impl Into<PathBuf>) -> Self {
        Self {
            class_root: class_root.into(),
        }
    }

    async fn devices(&self, class: &str) -> Result<Vec<PathBuf>, SignalError> {
        let dir = self.class_root.join(class);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SignalError::Unavailable(format!("{} missing", dir.display())))
            }
            Err(e) => return Err(e.into()),
        };

        let mut devices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            devices.push(entry.path());
        }
        devices.sort();
        Ok(devices)
    }

    async fn batteries(&self) -> Result<Vec<PathBuf>, SignalError> {
        let mut batteries = Vec::new();
        for device in self.devices("power_supply").await? {
            if read_attr(&device, "type").await.as_deref() == Some("Battery") {
                batteries.push(device);
            }
        }
        Ok(batteries)
    }
}

impl Default for SysfsSignals {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceSignalSource for SysfsSignals {
    async fn charging_state(&self) -> Result<bool, SignalError> {
        let devices = self.devices("power_supply").await?;
        if devices.is_empty() {
            return Err(SignalError::Unavailable("no power supplies".to_string()));
        }

        for device in devices {
            match read_attr(&device, "type").await.as_deref() {
                Some("Mains" | "USB") => {
                    if read_attr(&device, "online").await.as_deref() == Some("1") {
                        return Ok(true);
                    }
                }
                Some("Battery") => {
                    if matches!(
                        read_attr(&device, "status").await.as_deref(),
                        Some("Charging" | "Full")
                    ) {
                        return Ok(true);
                    }
                }
                _ => {}
            }
        }
        Ok(false)
    }

    async fn brightness(&self) -> Result<f64, SignalError> {
        let device = self
            .devices("backlight")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SignalError::Unavailable("no backlight".to_string()))?;

        let current = parse_number(&device, "brightness").await?;
        let max = parse_number(&device, "max_brightness").await?;
        if max <= 0.0 {
            return Err(SignalError::Parse(format!(
                "{}: max_brightness is {max}",
                device.display()
            )));
        }
        Ok(current / max)
    }

    async fn battery_level(&self) -> Result<f64, SignalError> {
        let battery = self
            .batteries()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SignalError::Unavailable("no battery".to_string()))?;

        let capacity = parse_number(&battery, "capacity").await?;
        Ok(capacity / 100.0)
    }
}

async fn read_attr(device: &Path, name: &str) -> Option<String> {
    tokio::fs::read_to_string(device.join(name))
        .await
        .ok()
        .map(|s| s.trim().to_string())
}

async fn parse_number(device: &Path, name: &str) -> Result<f64, SignalError> {
    let raw = tokio::fs::read_to_string(device.join(name)).await?;
    raw.trim().parse::<f64>().map_err(|e| {
        SignalError::Parse(format!("{}/{name}: {e}", device.display()))
    })
}
