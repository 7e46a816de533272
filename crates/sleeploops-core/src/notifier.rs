use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Title and body of a local notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

impl NotificationContent {
    #[must_use]
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }
}

/// Opaque handle used to cancel a scheduled notification
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationHandle(pub String);

impl fmt::Display for NotificationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host notification scheduler
pub trait Notifier: Send + Sync {
    /// Show a notification right away
    fn present_immediate(&self, content: &NotificationContent) -> Result<()>;

    /// Schedule a notification `delay_seconds` from now
    fn schedule_at(
        &self,
        content: &NotificationContent,
        delay_seconds: u64,
    ) -> Result<NotificationHandle>;

    fn cancel(&self, handle: &NotificationHandle) -> Result<()>;

    fn cancel_all(&self) -> Result<()>;
}

/// Notifier that only logs, for hosts without a notification centre
#[derive(Debug, Default)]
pub struct LogNotifier {
    pending: Mutex<BTreeMap<NotificationHandle, NotificationContent>>,
}

impl LogNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications scheduled through this instance and not cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if the internal lock is poisoned
    pub fn pending_count(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, BTreeMap<NotificationHandle, NotificationContent>>> {
        self.pending
            .lock()
            .map_err(|_| anyhow!("Notifier lock poisoned"))
    }
}

impl Notifier for LogNotifier {
    fn present_immediate(&self, content: &NotificationContent) -> Result<()> {
        log::info!("[notification] {}: {}", content.title, content.body);
        Ok(())
    }

    fn schedule_at(
        &self,
        content: &NotificationContent,
        delay_seconds: u64,
    ) -> Result<NotificationHandle> {
        let handle = NotificationHandle(Uuid::new_v4().to_string());
        log::info!(
            "[notification] scheduled {handle} in {delay_seconds}s: {}",
            content.title
        );
        self.lock()?.insert(handle.clone(), content.clone());
        Ok(handle)
    }

    fn cancel(&self, handle: &NotificationHandle) -> Result<()> {
        // Handles from a previous process are unknown here; cancelling them is not an error
        if self.lock()?.remove(handle).is_some() {
            log::info!("[notification] cancelled {handle}");
        }
        Ok(())
    }

    fn cancel_all(&self) -> Result<()> {
        let mut pending = self.lock()?;
        log::info!("[notification] cancelled all ({} pending)", pending.len());
        pending.clear();
        Ok(())
    }
}
