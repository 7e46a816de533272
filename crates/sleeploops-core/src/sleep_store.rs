use anyhow::Result;
use sleeploops_storage::SleepSession;
use std::sync::Arc;

use crate::notifier::{NotificationContent, Notifier};
use crate::store::{KeyValueStore, SessionRepository};

/// Callback invoked with the full session list after every change
pub type SessionListener = Box<dyn Fn(&[SleepSession]) + Send + Sync>;

/// In-memory session list backed by a session repository
///
/// The in-memory list is authoritative. Writes to the repository are best
/// effort: a failed write is logged and the in-memory change is kept.
pub struct SleepStore {
    repository: Arc<dyn SessionRepository>,
    preferences: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    sessions: Vec<SleepSession>,
    listeners: Vec<SessionListener>,
}

impl SleepStore {
    #[must_use]
    pub fn new(
        repository: Arc<dyn SessionRepository>,
        preferences: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repository,
            preferences,
            notifier,
            sessions: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Replace the in-memory list with what the repository holds
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be read; the current list is kept
    pub fn load(&mut self) -> Result<()> {
        self.sessions = self.repository.list_sessions()?;
        log::info!("Loaded {} sleep sessions", self.sessions.len());
        self.notify_listeners();
        Ok(())
    }

    #[must_use]
    pub fn sessions(&self) -> &[SleepSession] {
        &self.sessions
    }

    /// The session still waiting for its end, if any
    #[must_use]
    pub fn active_session(&self) -> Option<&SleepSession> {
        self.sessions.iter().find(|s| s.is_open())
    }

    /// Register an observer for session list changes
    pub fn subscribe(&mut self, listener: SessionListener) {
        self.listeners.push(listener);
    }

    /// Whether any session starts within `window_ms` of `start`
    #[must_use]
    pub fn has_session_near(&self, start: i64, window_ms: i64) -> bool {
        self.sessions
            .iter()
            .any(|s| (s.start - start).abs() < window_ms)
    }

    /// Open a manual session at `now_ms`
    ///
    /// At most one session may be open; if one already is, its id is returned
    /// and nothing is written.
    pub fn start_session(&mut self, now_ms: i64) -> Option<i64> {
        if let Some(open) = self.active_session() {
            log::info!("Session {} is already open", open.id);
            return Some(open.id);
        }

        match self.repository.insert_session(now_ms, None, false) {
            Ok(id) => {
                self.sessions.push(SleepSession {
                    id,
                    start: now_ms,
                    end: None,
                    auto_detected: false,
                });
                log::info!("Started sleep session {id}");
                self.notify_listeners();
                Some(id)
            }
            Err(e) => {
                log::error!("Error starting session: {e:#}");
                None
            }
        }
    }

    /// Close the open session at `now_ms`
    pub fn end_session(&mut self, now_ms: i64) -> Option<i64> {
        let session = self.sessions.iter_mut().find(|s| s.is_open())?;
        session.end = Some(now_ms);
        let id = session.id;

        if let Err(e) = self.repository.update_session_end(id, now_ms) {
            log::error!("Error ending session {id}: {e:#}");
        } else {
            log::info!("Ended sleep session {id}");
        }
        self.notify_listeners();
        Some(id)
    }

    /// Persist an inferred session and tell the user about it
    ///
    /// Duplicate checks are the caller's job. Returns `None` if the repository
    /// rejected the write.
    pub fn create_auto_detected_session(&mut self, start: i64, end: i64) -> Option<i64> {
        let id = match self.repository.insert_session(start, Some(end), true) {
            Ok(id) => id,
            Err(e) => {
                log::error!("Error creating auto-detected session: {e:#}");
                return None;
            }
        };

        self.sessions.push(SleepSession {
            id,
            start,
            end: Some(end),
            auto_detected: true,
        });
        log::info!("Auto-detected sleep session {id}");
        self.notify_listeners();

        let content = NotificationContent::new(
            "Sleep detected",
            format!("Looks like you slept for {}.", format_duration(end - start)),
        );
        if let Err(e) = self.notifier.present_immediate(&content) {
            log::warn!("Failed to present sleep notification: {e:#}");
        }

        Some(id)
    }

    /// Remove a session; returns whether it was in the list
    pub fn delete_session(&mut self, id: i64) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| s.id != id);
        if self.sessions.len() == before {
            return false;
        }

        if let Err(e) = self.repository.delete_session(id) {
            log::error!("Error deleting session {id}: {e:#}");
        }
        self.notify_listeners();
        true
    }

    /// Wipe sessions, scheduled notifications and every stored preference
    pub fn reset_app(&mut self) {
        self.sessions.clear();

        if let Err(e) = self.repository.drop_all() {
            log::error!("Error dropping sessions: {e:#}");
        }
        if let Err(e) = self.notifier.cancel_all() {
            log::warn!("Failed to cancel notifications: {e:#}");
        }
        if let Err(e) = self.preferences.clear() {
            log::error!("Error clearing preferences: {e:#}");
        }

        log::info!("Application data reset");
        self.notify_listeners();
    }

    fn notify_listeners(&self) {
        for listener in &self.listeners {
            listener(&self.sessions);
        }
    }
}

/// Render a millisecond span as `7h 30m`
#[must_use]
pub fn format_duration(ms: i64) -> String {
    let minutes = ms.max(0) / 60_000;
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingRepository, RecordingNotifier};
    use sleeploops_storage::Database;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_with(db: &Arc<Database>, notifier: &Arc<RecordingNotifier>) -> SleepStore {
        SleepStore::new(db.clone(), db.clone(), notifier.clone())
    }

    #[test]
    fn test_start_and_end_manual_session() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = store_with(&db, &notifier);

        let id = store.start_session(1_000).unwrap();
        assert_eq!(store.active_session().map(|s| s.id), Some(id));

        // A second start keeps the single open session
        assert_eq!(store.start_session(2_000), Some(id));
        assert_eq!(store.sessions().len(), 1);

        assert_eq!(store.end_session(9_000), Some(id));
        assert!(store.active_session().is_none());
        assert_eq!(store.end_session(10_000), None);

        let stored = db.list_sessions().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].end, Some(9_000));
        assert!(!stored[0].auto_detected);
    }

    #[test]
    fn test_auto_detected_session_persists_and_notifies() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = store_with(&db, &notifier);

        let id = store
            .create_auto_detected_session(0, 8 * 3_600_000)
            .unwrap();

        let stored = db.list_sessions().unwrap();
        assert_eq!(stored[0].id, id);
        assert!(stored[0].auto_detected);
        assert_eq!(stored[0].end, Some(8 * 3_600_000));

        let presented = notifier.presented();
        assert_eq!(presented.len(), 1);
        assert!(presented[0].body.contains("8h 0m"));
    }

    #[test]
    fn test_notification_failure_keeps_session() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::failing());
        let mut store = store_with(&db, &notifier);

        assert!(store.create_auto_detected_session(0, 60_000).is_some());
        assert_eq!(store.sessions().len(), 1);
        assert_eq!(db.list_sessions().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_failure_leaves_list_untouched() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = SleepStore::new(Arc::new(FailingRepository), db, notifier.clone());

        assert_eq!(store.create_auto_detected_session(0, 60_000), None);
        assert_eq!(store.start_session(0), None);
        assert!(store.sessions().is_empty());
        assert!(notifier.presented().is_empty());
    }

    #[test]
    fn test_has_session_near_uses_strict_window() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = store_with(&db, &notifier);
        store.create_auto_detected_session(10_000_000, 20_000_000);

        assert!(store.has_session_near(10_000_000 + 3_599_999, 3_600_000));
        assert!(store.has_session_near(10_000_000 - 3_599_999, 3_600_000));
        assert!(!store.has_session_near(10_000_000 + 3_600_000, 3_600_000));
    }

    #[test]
    fn test_delete_session() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = store_with(&db, &notifier);
        let id = store.create_auto_detected_session(0, 1_000).unwrap();

        assert!(store.delete_session(id));
        assert!(!store.delete_session(id));
        assert!(db.list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_load_and_listeners() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_session(5, Some(10), false).unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = store_with(&db, &notifier);

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        store.subscribe(Box::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        store.load().unwrap();
        assert_eq!(store.sessions().len(), 1);
        store.start_session(100);
        store.end_session(200);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reset_app_clears_everything() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let notifier = Arc::new(RecordingNotifier::default());
        let mut store = store_with(&db, &notifier);
        store.create_auto_detected_session(0, 1_000);
        KeyValueStore::set(db.as_ref(), "sleepThreshold", "45").unwrap();

        store.reset_app();

        assert!(store.sessions().is_empty());
        assert!(db.list_sessions().unwrap().is_empty());
        assert_eq!(KeyValueStore::get(db.as_ref(), "sleepThreshold").unwrap(), None);
        assert_eq!(notifier.cancel_all_calls(), 1);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0h 0m");
        assert_eq!(format_duration(90 * 60_000), "1h 30m");
        assert_eq!(format_duration(-5), "0h 0m");
    }
}
