//! Ambient device signals and the sleep likelihood score built from them.

use async_trait::async_trait;
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};

use crate::clock::Clock;
use crate::error::SignalError;

#[cfg(target_os = "linux")]
pub mod linux;

/// Fallback when the charging state cannot be read: assume unplugged
pub const DEFAULT_CHARGING: bool = false;
/// Fallback when brightness cannot be read: assume a bright, least sleep-like screen
pub const DEFAULT_BRIGHTNESS: f64 = 1.0;
/// Fallback when the battery level cannot be read
pub const DEFAULT_BATTERY_LEVEL: f64 = 1.0;

/// Platform source of raw device readings
///
/// Every read may fail; callers substitute the fail-safe defaults above.
#[async_trait]
pub trait DeviceSignalSource: Send + Sync {
    /// Whether the device is plugged in (charging or full)
    async fn charging_state(&self) -> Result<bool, SignalError>;

    /// Screen brightness normalized to [0, 1]
    async fn brightness(&self) -> Result<f64, SignalError>;

    /// Battery level normalized to [0, 1]
    async fn battery_level(&self) -> Result<f64, SignalError>;
}

/// Source used on platforms without a native implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSignals;

#[async_trait]
impl DeviceSignalSource for UnavailableSignals {
    async fn charging_state(&self) -> Result<bool, SignalError> {
        Err(SignalError::Unavailable("charging state".to_string()))
    }

    async fn brightness(&self) -> Result<f64, SignalError> {
        Err(SignalError::Unavailable("screen brightness".to_string()))
    }

    async fn battery_level(&self) -> Result<f64, SignalError> {
        Err(SignalError::Unavailable("battery level".to_string()))
    }
}

/// Create platform-specific signal source
#[must_use]
pub fn create_signal_source() -> Arc<dyn DeviceSignalSource> {
    #[cfg(target_os = "linux")]
    {
        Arc::new(linux::SysfsSignals::new())
    }

    #[cfg(not(target_os = "linux"))]
    {
        Arc::new(UnavailableSignals)
    }
}

/// One sampled set of signals together with the derived score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub is_charging: bool,
    pub brightness: f64,
    pub battery_level: f64,
    pub hour_of_day: u32,
    pub sleep_likelihood: f64,
}

/// Combine signals into a sleep likelihood in [0, 1]
///
/// Contributions are additive:
/// - charging (likely bedside): 0.3
/// - brightness below 0.3: 0.2, below 0.5: 0.1
/// - battery above 0.2 (normal usage, not a low-battery anomaly): 0.1
/// - 23:00-05:00: 0.4, otherwise 21:00-07:00: 0.2
#[must_use]
pub fn score_signals(is_charging: bool, brightness: f64, battery_level: f64, hour: u32) -> f64 {
    let mut score = 0.0;

    if is_charging {
        score += 0.3;
    }

    if brightness < 0.3 {
        score += 0.2;
    } else if brightness < 0.5 {
        score += 0.1;
    }

    if battery_level > 0.2 {
        score += 0.1;
    }

    // Late night wins over the broader evening/early-morning window
    if hour >= 23 || hour < 5 {
        score += 0.4;
    } else if hour >= 21 || hour < 7 {
        score += 0.2;
    }

    f64::clamp(score, 0.0, 1.0)
}

/// Samples device signals and reduces them to a sleep likelihood
pub struct SignalAggregator {
    source: Arc<dyn DeviceSignalSource>,
    clock: Arc<dyn Clock>,
    read_timeout: Duration,
}

impl SignalAggregator {
    #[must_use]
    pub fn new(
        source: Arc<dyn DeviceSignalSource>,
        clock: Arc<dyn Clock>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            source,
            clock,
            read_timeout,
        }
    }

    pub async fn read_charging_state(&self) -> bool {
        read_or_default(
            "charging state",
            self.source.charging_state(),
            self.read_timeout,
            DEFAULT_CHARGING,
        )
        .await
    }

    pub async fn read_brightness(&self) -> f64 {
        let value = read_or_default(
            "brightness",
            self.source.brightness(),
            self.read_timeout,
            DEFAULT_BRIGHTNESS,
        )
        .await;
        normalize(value, DEFAULT_BRIGHTNESS)
    }

    pub async fn read_battery_level(&self) -> f64 {
        let value = read_or_default(
            "battery level",
            self.source.battery_level(),
            self.read_timeout,
            DEFAULT_BATTERY_LEVEL,
        )
        .await;
        normalize(value, DEFAULT_BATTERY_LEVEL)
    }

    /// Current sleep likelihood in [0, 1]
    pub async fn compute_sleep_likelihood(&self) -> f64 {
        self.snapshot().await.sleep_likelihood
    }

    /// Sample every signal concurrently and score them
    pub async fn snapshot(&self) -> SignalSnapshot {
        let hour_of_day = self.clock.now().hour();
        let (is_charging, brightness, battery_level) = tokio::join!(
            self.read_charging_state(),
            self.read_brightness(),
            self.read_battery_level()
        );

        let snapshot = SignalSnapshot {
            is_charging,
            brightness,
            battery_level,
            hour_of_day,
            sleep_likelihood: score_signals(is_charging, brightness, battery_level, hour_of_day),
        };
        log::debug!("Sleep detection signals: {snapshot:?}");
        snapshot
    }
}

async fn read_or_default<T, F>(name: &str, read: F, limit: Duration, fallback: T) -> T
where
    F: Future<Output = Result<T, SignalError>>,
{
    let err = match tokio::time::timeout(limit, read).await {
        Ok(Ok(value)) => return value,
        Ok(Err(e)) => e,
        Err(_) => SignalError::Timeout(limit),
    };
    log::debug!("{name} unavailable, using default: {err}");
    fallback
}

fn normalize(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}
