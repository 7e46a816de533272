use serde::{Deserialize, Serialize};

/// Sleep session - one inferred or user-declared sleep interval
///
/// Timestamps are milliseconds since the Unix epoch. `end == None` marks an
/// open session that has not been closed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepSession {
    pub id: i64,
    pub start: i64,
    pub end: Option<i64>,
    pub auto_detected: bool,
}

impl SleepSession {
    /// Check whether the session is still ongoing
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Session length in milliseconds, `None` while the session is open
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.end.map(|end| end - self.start)
    }
}
