//! Persistence seams used by the engine.
//!
//! The engine only talks to these traits; `sleeploops_storage::Database`
//! implements both on top of SQLite.

use anyhow::Result;
use sleeploops_storage::{Database, SleepSession};

/// Preference keys shared with the key-value store
pub mod keys {
    pub const LAST_ACTIVE_TIME: &str = "lastActiveTime";
    pub const TRACKING_ENABLED: &str = "activityTrackingEnabled";
    pub const SLEEP_THRESHOLD: &str = "sleepThreshold";
    pub const BEDTIME_REMINDER: &str = "wakeNotif";
    pub const WEEKDAY_ALARM_PREFIX: &str = "schedule:";
}

/// Durable storage for sleep sessions
pub trait SessionRepository: Send + Sync {
    fn list_sessions(&self) -> Result<Vec<SleepSession>>;

    /// Insert a session and return the id assigned by storage
    fn insert_session(&self, start: i64, end: Option<i64>, auto_detected: bool) -> Result<i64>;

    fn delete_session(&self, id: i64) -> Result<()>;

    fn update_session_end(&self, id: i64, end: i64) -> Result<()>;

    fn drop_all(&self) -> Result<()>;
}

/// String key-value storage for preferences
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// Every entry whose key starts with `prefix`, ordered by key
    fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>>;
}

impl SessionRepository for Database {
    fn list_sessions(&self) -> Result<Vec<SleepSession>> {
        Database::list_sessions(self)
    }

    fn insert_session(&self, start: i64, end: Option<i64>, auto_detected: bool) -> Result<i64> {
        Database::insert_session(self, start, end, auto_detected)
    }

    fn delete_session(&self, id: i64) -> Result<()> {
        if !Database::delete_session(self, id)? {
            log::debug!("Session {id} was not in storage");
        }
        Ok(())
    }

    fn update_session_end(&self, id: i64, end: i64) -> Result<()> {
        Database::update_session_end(self, id, end)
    }

    fn drop_all(&self) -> Result<()> {
        let dropped = self.drop_all_sessions()?;
        log::info!("Dropped {dropped} stored sessions");
        Ok(())
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.get_preference(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.set_preference(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.remove_preference(key)
    }

    fn clear(&self) -> Result<()> {
        self.clear_preferences()
    }

    fn entries_with_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>> {
        self.preferences_with_prefix(prefix)
    }
}
