use chrono::{DateTime, FixedOffset, Local};

/// Source of wall-clock time in the user's local offset
///
/// Hour-of-day decisions are made in the offset carried by the returned value.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Clock backed by the operating system's local time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}
