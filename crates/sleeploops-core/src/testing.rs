//! Fakes shared by the unit tests.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeZone};
use sleeploops_storage::SleepSession;
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::SignalError;
use crate::notifier::{NotificationContent, NotificationHandle, Notifier};
use crate::signals::DeviceSignalSource;
use crate::store::SessionRepository;

/// 2024-01-`day` `hour`:`minute` at UTC+0
pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .unwrap()
        .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
        .unwrap()
}

pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }
}

pub struct FakeSignals {
    readings: Option<(bool, f64, f64)>,
    stall: bool,
}

impl FakeSignals {
    pub fn new(charging: bool, brightness: f64, battery_level: f64) -> Self {
        Self {
            readings: Some((charging, brightness, battery_level)),
            stall: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            readings: None,
            stall: false,
        }
    }

    /// Every read hangs far longer than any test timeout
    pub fn stalled(mut self) -> Self {
        self.stall = true;
        self
    }

    async fn read<T>(&self, pick: impl Fn((bool, f64, f64)) -> T) -> Result<T, SignalError> {
        if self.stall {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.readings
            .map(pick)
            .ok_or_else(|| SignalError::Unavailable("fake".to_string()))
    }
}

#[async_trait]
impl DeviceSignalSource for FakeSignals {
    async fn charging_state(&self) -> Result<bool, SignalError> {
        self.read(|r| r.0).await
    }

    async fn brightness(&self) -> Result<f64, SignalError> {
        self.read(|r| r.1).await
    }

    async fn battery_level(&self) -> Result<f64, SignalError> {
        self.read(|r| r.2).await
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    fail: bool,
    presented: Mutex<Vec<NotificationContent>>,
    scheduled: Mutex<Vec<(NotificationHandle, NotificationContent, u64)>>,
    cancelled: Mutex<Vec<NotificationHandle>>,
    cancel_all_calls: Mutex<usize>,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn presented(&self) -> Vec<NotificationContent> {
        self.presented.lock().unwrap().clone()
    }

    pub fn scheduled(&self) -> Vec<(NotificationHandle, NotificationContent, u64)> {
        self.scheduled.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn cancel_all_calls(&self) -> usize {
        *self.cancel_all_calls.lock().unwrap()
    }
}

impl Notifier for RecordingNotifier {
    fn present_immediate(&self, content: &NotificationContent) -> Result<()> {
        if self.fail {
            bail!("notifications denied");
        }
        self.presented.lock().unwrap().push(content.clone());
        Ok(())
    }

    fn schedule_at(
        &self,
        content: &NotificationContent,
        delay_seconds: u64,
    ) -> Result<NotificationHandle> {
        if self.fail {
            bail!("notifications denied");
        }
        let mut scheduled = self.scheduled.lock().unwrap();
        let handle = NotificationHandle(format!("n{}", scheduled.len() + 1));
        scheduled.push((handle.clone(), content.clone(), delay_seconds));
        Ok(handle)
    }

    fn cancel(&self, handle: &NotificationHandle) -> Result<()> {
        self.cancelled.lock().unwrap().push(handle.clone());
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        *self.cancel_all_calls.lock().unwrap() += 1;
        Ok(())
    }
}

/// Repository whose every call fails
pub struct FailingRepository;

impl SessionRepository for FailingRepository {
    fn list_sessions(&self) -> Result<Vec<SleepSession>> {
        Err(anyhow!("disk unavailable"))
    }

    fn insert_session(&self, _start: i64, _end: Option<i64>, _auto: bool) -> Result<i64> {
        Err(anyhow!("disk unavailable"))
    }

    fn delete_session(&self, _id: i64) -> Result<()> {
        Err(anyhow!("disk unavailable"))
    }

    fn update_session_end(&self, _id: i64, _end: i64) -> Result<()> {
        Err(anyhow!("disk unavailable"))
    }

    fn drop_all(&self) -> Result<()> {
        Err(anyhow!("disk unavailable"))
    }
}
