//! Sleep cycle arithmetic for bedtime and wake-up suggestions.

use chrono::{DateTime, Duration, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;

/// Cycle counts offered as bedtime/wake-up suggestions, longest night first
pub const SUGGESTED_CYCLES: [u32; 3] = [5, 4, 3];

/// Cycle counts used for wake times counted from now
pub const DEFAULT_WAKE_CYCLE_COUNTS: [u32; 3] = [4, 5, 6];

/// A suggested time and how many full cycles it allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSuggestion {
    pub cycles: u32,
    pub time: DateTime<FixedOffset>,
}

/// Sleep cycle calculator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepCycles {
    cycle_minutes: u32,
    buffer_minutes: u32,
}

impl Default for SleepCycles {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl SleepCycles {
    #[must_use]
    pub const fn new(cycle_minutes: u32, buffer_minutes: u32) -> Self {
        Self {
            cycle_minutes,
            buffer_minutes,
        }
    }

    #[must_use]
    pub const fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.cycle_minutes, config.fall_asleep_buffer_minutes)
    }

    #[must_use]
    pub const fn cycle_minutes(&self) -> u32 {
        self.cycle_minutes
    }

    /// When to go to bed to wake up at `wake` after whole cycles
    #[must_use]
    pub fn bedtime_suggestions(&self, wake: DateTime<FixedOffset>) -> Vec<CycleSuggestion> {
        SUGGESTED_CYCLES
            .iter()
            .map(|&cycles| CycleSuggestion {
                cycles,
                time: wake - self.night_length(cycles),
            })
            .collect()
    }

    /// When to wake up after going to bed at `sleep`
    #[must_use]
    pub fn wake_suggestions(&self, sleep: DateTime<FixedOffset>) -> Vec<CycleSuggestion> {
        SUGGESTED_CYCLES
            .iter()
            .map(|&cycles| CycleSuggestion {
                cycles,
                time: sleep + self.night_length(cycles),
            })
            .collect()
    }

    /// Wake times after `counts` cycles starting right now, without the buffer
    #[must_use]
    pub fn recommended_wake_times(
        &self,
        now: DateTime<FixedOffset>,
        counts: &[u32],
    ) -> Vec<DateTime<FixedOffset>> {
        counts
            .iter()
            .map(|&n| now + Duration::minutes(i64::from(n) * i64::from(self.cycle_minutes)))
            .collect()
    }

    fn night_length(&self, cycles: u32) -> Duration {
        Duration::minutes(
            i64::from(cycles) * i64::from(self.cycle_minutes) + i64::from(self.buffer_minutes),
        )
    }
}
