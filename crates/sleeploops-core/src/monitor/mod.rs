//! Activity monitor: turns app lifecycle transitions into sleep sessions.

use anyhow::{bail, Result};
use chrono::{DateTime, FixedOffset, Timelike};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::signals::{SignalAggregator, SignalSnapshot};
use crate::sleep_store::SleepStore;
use crate::store::{keys, KeyValueStore};

pub const DEFAULT_SLEEP_THRESHOLD_MINUTES: u32 = 30;

/// Default collision window for auto-detected sessions (one hour)
pub const DEFAULT_DEDUP_WINDOW_MS: i64 = 3_600_000;

/// Inactivity that began at or after this hour looks like going to bed
const NIGHT_HOURS_START: u32 = 22;
/// ...or before this hour, for people who stay up late
const NIGHT_HOURS_END: u32 = 4;
/// Coming back before this hour looks like waking up
const MORNING_HOURS_END: u32 = 10;

/// How much a confident signal reading shrinks the threshold
const LIKELIHOOD_THRESHOLD_WEIGHT: f64 = 0.3;
/// Likelihood above which the hour-of-day condition is waived
const SIGNAL_OVERRIDE_LIKELIHOOD: f64 = 0.7;

/// Coarse app visibility reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Active,
    Inactive,
    Background,
}

impl LifecyclePhase {
    /// `Active` is the only foreground phase; the other two count as away
    #[must_use]
    pub const fn is_foreground(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Background => "background",
        })
    }
}

impl FromStr for LifecyclePhase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" | "foreground" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "background" => Ok(Self::Background),
            other => bail!("Unknown lifecycle phase: {other}"),
        }
    }
}

/// Mutable monitor state, loaded from preferences at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityState {
    pub last_active_time: Option<DateTime<FixedOffset>>,
    pub phase: LifecyclePhase,
    pub is_tracking: bool,
    pub sleep_threshold_minutes: u32,
}

impl ActivityState {
    /// State of a fresh install
    #[must_use]
    pub const fn fresh(phase: LifecyclePhase) -> Self {
        Self {
            last_active_time: None,
            phase,
            is_tracking: true,
            sleep_threshold_minutes: DEFAULT_SLEEP_THRESHOLD_MINUTES,
        }
    }
}

/// Result of measuring one inactivity gap
#[derive(Debug, Clone, PartialEq)]
pub enum GapOutcome {
    /// Nothing recorded to measure against
    NoBaseline,
    /// Gap not longer than the configured threshold
    TooShort { gap_minutes: f64 },
    /// Gap long enough, but neither the hour nor the signals point to sleep
    NotSleep {
        gap_minutes: f64,
        adjusted_threshold: f64,
        snapshot: SignalSnapshot,
    },
    /// Gap classified as sleep; `session_id` is `None` when the session was
    /// a duplicate or could not be stored
    Sleep {
        gap_minutes: f64,
        adjusted_threshold: f64,
        snapshot: SignalSnapshot,
        session_id: Option<i64>,
    },
}

/// Shrink the threshold as sleep likelihood grows
#[must_use]
pub fn adjusted_threshold(threshold_minutes: u32, sleep_likelihood: f64) -> f64 {
    f64::from(threshold_minutes) * (1.0 - sleep_likelihood * LIKELIHOOD_THRESHOLD_WEIGHT)
}

/// Decision policy for a gap that already exceeded the plain threshold
///
/// Sleep if the gap beats the adjusted threshold and either the hours fit
/// (went away late at night, or came back in the morning) or the signals are
/// confident on their own.
#[must_use]
pub fn is_sleep_gap(
    last_active_hour: u32,
    current_hour: u32,
    gap_minutes: f64,
    adjusted_threshold: f64,
    sleep_likelihood: f64,
) -> bool {
    if gap_minutes <= adjusted_threshold {
        return false;
    }
    let night_hours = last_active_hour >= NIGHT_HOURS_START
        || last_active_hour < NIGHT_HOURS_END
        || current_hour < MORNING_HOURS_END;

    night_hours || sleep_likelihood > SIGNAL_OVERRIDE_LIKELIHOOD
}

/// Watches lifecycle transitions and records inferred sleep sessions
pub struct ActivityMonitor {
    state: ActivityState,
    preferences: Arc<dyn KeyValueStore>,
    store: Arc<Mutex<SleepStore>>,
    aggregator: SignalAggregator,
    clock: Arc<dyn Clock>,
    dedup_window_ms: i64,
}

impl ActivityMonitor {
    /// Create a monitor, restoring tracking state from preferences
    #[must_use]
    pub fn new(
        initial_phase: LifecyclePhase,
        preferences: Arc<dyn KeyValueStore>,
        store: Arc<Mutex<SleepStore>>,
        aggregator: SignalAggregator,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = load_state(preferences.as_ref(), initial_phase);
        log::info!(
            "Activity monitor ready (tracking: {}, threshold: {} min, last active: {:?})",
            state.is_tracking,
            state.sleep_threshold_minutes,
            state.last_active_time
        );

        Self {
            state,
            preferences,
            store,
            aggregator,
            clock,
            dedup_window_ms: DEFAULT_DEDUP_WINDOW_MS,
        }
    }

    /// Override the dedup window
    #[must_use]
    pub fn with_dedup_window(mut self, window_ms: i64) -> Self {
        self.dedup_window_ms = window_ms;
        self
    }

    #[must_use]
    pub fn state(&self) -> &ActivityState {
        &self.state
    }

    #[must_use]
    pub fn signals(&self) -> &SignalAggregator {
        &self.aggregator
    }

    /// React to a lifecycle transition
    ///
    /// Returns the gap evaluation when the app came back to the foreground.
    pub async fn handle_phase_change(&mut self, next: LifecyclePhase) -> Option<GapOutcome> {
        let was_away = !self.state.phase.is_foreground();
        let is_active = next.is_foreground();
        self.state.phase = next;

        if !self.state.is_tracking {
            return None;
        }

        if was_away && is_active {
            Some(self.evaluate_gap().await)
        } else if !was_away && !is_active {
            let now = self.clock.now();
            self.record_last_active(now);
            None
        } else {
            None
        }
    }

    /// Measure the time since the app was last active and classify it
    pub async fn evaluate_gap(&mut self) -> GapOutcome {
        let Some(last_active) = self.state.last_active_time else {
            return GapOutcome::NoBaseline;
        };

        let now = self.clock.now();
        #[allow(clippy::cast_precision_loss)]
        let gap_minutes = (now - last_active).num_milliseconds() as f64 / 60_000.0;
        let threshold = self.state.sleep_threshold_minutes;

        let outcome = if gap_minutes <= f64::from(threshold) {
            GapOutcome::TooShort { gap_minutes }
        } else {
            let snapshot = self.aggregator.snapshot().await;
            let adjusted = adjusted_threshold(threshold, snapshot.sleep_likelihood);

            if is_sleep_gap(
                last_active.hour(),
                now.hour(),
                gap_minutes,
                adjusted,
                snapshot.sleep_likelihood,
            ) {
                let session_id = self.create_sleep_session(last_active, now).await;
                GapOutcome::Sleep {
                    gap_minutes,
                    adjusted_threshold: adjusted,
                    snapshot,
                    session_id,
                }
            } else {
                GapOutcome::NotSleep {
                    gap_minutes,
                    adjusted_threshold: adjusted,
                    snapshot,
                }
            }
        };

        log::debug!("Gap evaluated: {outcome:?}");
        self.record_last_active(now);
        outcome
    }

    /// Record a detected sleep unless a session already starts near `sleep_time`
    pub async fn create_sleep_session(
        &self,
        sleep_time: DateTime<FixedOffset>,
        wake_time: DateTime<FixedOffset>,
    ) -> Option<i64> {
        let start = sleep_time.timestamp_millis();
        let mut store = self.store.lock().await;

        if store.has_session_near(start, self.dedup_window_ms) {
            log::info!("Sleep session already exists for this time period");
            return None;
        }

        store.create_auto_detected_session(start, wake_time.timestamp_millis())
    }

    /// Turn inference on or off
    ///
    /// Re-enabling drops the baseline: time spent untracked is not an
    /// inactivity gap, so measuring starts again at the next foreground to
    /// away transition.
    pub fn set_tracking(&mut self, enabled: bool) {
        if enabled && !self.state.is_tracking {
            self.clear_last_active();
        }
        self.state.is_tracking = enabled;
        self.persist(keys::TRACKING_ENABLED, &enabled.to_string());
        log::info!("Activity tracking {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Change the minimum inactivity gap
    ///
    /// # Errors
    ///
    /// Returns an error if `minutes` is zero
    pub fn set_threshold(&mut self, minutes: u32) -> Result<()> {
        if minutes == 0 {
            bail!("Sleep threshold must be a positive number of minutes");
        }
        self.state.sleep_threshold_minutes = minutes;
        self.persist(keys::SLEEP_THRESHOLD, &minutes.to_string());
        log::info!("Sleep threshold set to {minutes} minutes");
        Ok(())
    }

    /// Forget everything but the current phase, as after a fresh install
    pub fn reset(&mut self) {
        self.state = ActivityState::fresh(self.state.phase);
    }

    fn record_last_active(&mut self, now: DateTime<FixedOffset>) {
        self.state.last_active_time = Some(now);
        self.persist(keys::LAST_ACTIVE_TIME, &now.to_rfc3339());
    }

    fn clear_last_active(&mut self) {
        self.state.last_active_time = None;
        if let Err(e) = self.preferences.remove(keys::LAST_ACTIVE_TIME) {
            log::warn!("Failed to clear {}: {e:#}", keys::LAST_ACTIVE_TIME);
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.preferences.set(key, value) {
            log::warn!("Failed to persist {key}: {e:#}");
        }
    }
}

fn load_state(preferences: &dyn KeyValueStore, phase: LifecyclePhase) -> ActivityState {
    let mut state = ActivityState::fresh(phase);

    match preferences.get(keys::TRACKING_ENABLED) {
        Ok(value) => state.is_tracking = value.as_deref() != Some("false"),
        Err(e) => log::warn!("Failed to load tracking preference: {e:#}"),
    }

    match preferences.get(keys::SLEEP_THRESHOLD) {
        Ok(Some(raw)) => match raw.trim().parse::<u32>() {
            Ok(minutes) if minutes > 0 => state.sleep_threshold_minutes = minutes,
            _ => log::warn!("Ignoring invalid sleep threshold {raw:?}"),
        },
        Ok(None) => {}
        Err(e) => log::warn!("Failed to load sleep threshold: {e:#}"),
    }

    match preferences.get(keys::LAST_ACTIVE_TIME) {
        Ok(Some(raw)) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(time) => state.last_active_time = Some(time),
            Err(e) => log::warn!("Ignoring invalid last active time {raw:?}: {e}"),
        },
        Ok(None) => {}
        Err(e) => log::warn!("Failed to load last active time: {e:#}"),
    }

    state
}
