//! Bedtime reminders and weekly wake-up alarms.
//!
//! Each reminder is a scheduled notification whose handle is kept in the
//! key-value store, so rescheduling can cancel the previous one even after a
//! restart.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::notifier::{NotificationContent, NotificationHandle, Notifier};
use crate::store::{keys, KeyValueStore};

/// Persisted bedtime reminder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedtimeReminder {
    pub wake: DateTime<FixedOffset>,
    pub id: NotificationHandle,
}

/// Persisted weekly alarm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekdayAlarm {
    /// Alarm time as milliseconds since the epoch
    pub time: i64,
    pub notification_id: NotificationHandle,
}

/// What an upcoming notification is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderKind {
    Bedtime,
    WakeAlarm(Weekday),
}

/// A pending reminder or alarm with the time it fires next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpcomingReminder {
    pub kind: ReminderKind,
    pub time: DateTime<FixedOffset>,
    pub id: NotificationHandle,
}

/// Schedules reminders through the notifier and remembers their handles
pub struct Reminders {
    preferences: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
}

impl Reminders {
    #[must_use]
    pub fn new(preferences: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            preferences,
            notifier,
        }
    }

    /// Schedule the wind-down reminder for the next `at`, replacing the previous one
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be scheduled or its handle cannot be stored
    pub fn schedule_bedtime_reminder(
        &self,
        at: NaiveTime,
        now: DateTime<FixedOffset>,
    ) -> Result<BedtimeReminder> {
        if let Some(previous) = self.bedtime_reminder()? {
            self.cancel_quietly(&previous.id);
        }

        let target = next_occurrence(at, now);
        let delay = u64::try_from((target - now).num_seconds()).unwrap_or(1);
        let content = NotificationContent::new(
            "Time to wind down",
            format!("Planned bedtime: {}", at.format("%H:%M")),
        );
        let id = self.notifier.schedule_at(&content, delay)?;

        let reminder = BedtimeReminder { wake: target, id };
        self.preferences.set(
            keys::BEDTIME_REMINDER,
            &serde_json::to_string(&reminder)?,
        )?;
        log::info!("Bedtime reminder set for {target} ({delay}s from now)");
        Ok(reminder)
    }

    /// The stored bedtime reminder, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be read
    pub fn bedtime_reminder(&self) -> Result<Option<BedtimeReminder>> {
        let Some(raw) = self.preferences.get(keys::BEDTIME_REMINDER)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(reminder) => Ok(Some(reminder)),
            Err(e) => {
                log::warn!("Ignoring unreadable bedtime reminder: {e}");
                Ok(None)
            }
        }
    }

    /// Cancel and forget the bedtime reminder
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be updated
    pub fn cancel_bedtime_reminder(&self) -> Result<bool> {
        let Some(reminder) = self.bedtime_reminder()? else {
            return Ok(false);
        };
        self.cancel_quietly(&reminder.id);
        self.preferences.remove(keys::BEDTIME_REMINDER)?;
        log::info!("Bedtime reminder cancelled");
        Ok(true)
    }

    /// Schedule the wake-up alarm for `day` of the current week
    ///
    /// The target keeps the week's date even when it already passed today;
    /// such alarms fire after one second.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification cannot be scheduled or its handle cannot be stored
    pub fn schedule_weekday_alarm(
        &self,
        day: Weekday,
        at: NaiveTime,
        now: DateTime<FixedOffset>,
    ) -> Result<WeekdayAlarm> {
        let key = alarm_key(day);
        if let Some(previous) = self.weekday_alarm(day)? {
            self.cancel_quietly(&previous.notification_id);
        }

        let target = date_in_current_week(day, at, now);
        let delay = u64::try_from((target - now).num_seconds().max(1)).unwrap_or(1);
        let content = NotificationContent::new(
            "Time to wake up",
            format!("Good morning! It's {}.", weekday_name(day)),
        );
        let notification_id = self.notifier.schedule_at(&content, delay)?;

        let alarm = WeekdayAlarm {
            time: target.timestamp_millis(),
            notification_id,
        };
        self.preferences.set(&key, &serde_json::to_string(&alarm)?)?;
        log::info!("Wake alarm for {} set ({delay}s from now)", weekday_name(day));
        Ok(alarm)
    }

    /// The stored alarm for `day`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be read
    pub fn weekday_alarm(&self, day: Weekday) -> Result<Option<WeekdayAlarm>> {
        self.preferences
            .get(&alarm_key(day))?
            .map(|raw| serde_json::from_str(&raw).context("Malformed weekday alarm"))
            .transpose()
    }

    /// Cancel and forget the alarm for `day`
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be updated
    pub fn cancel_weekday_alarm(&self, day: Weekday) -> Result<bool> {
        let Some(alarm) = self.weekday_alarm(day)? else {
            return Ok(false);
        };
        self.cancel_quietly(&alarm.notification_id);
        self.preferences.remove(&alarm_key(day))?;
        Ok(true)
    }

    /// All stored weekly alarms, Sunday first
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be read
    pub fn upcoming_alarms(&self) -> Result<Vec<(Weekday, WeekdayAlarm)>> {
        let mut alarms = Vec::new();
        for (key, raw) in self.preferences.entries_with_prefix(keys::WEEKDAY_ALARM_PREFIX)? {
            let day = key
                .strip_prefix(keys::WEEKDAY_ALARM_PREFIX)
                .and_then(|idx| idx.parse::<u32>().ok())
                .and_then(weekday_from_sunday);
            match (day, serde_json::from_str::<WeekdayAlarm>(&raw)) {
                (Some(day), Ok(alarm)) => alarms.push((day, alarm)),
                _ => log::warn!("Skipping malformed alarm entry {key}"),
            }
        }
        alarms.sort_by_key(|(day, _)| day.num_days_from_sunday());
        Ok(alarms)
    }

    /// The bedtime reminder and every weekly alarm, soonest first
    ///
    /// Weekly alarms are listed at their next occurrence after `now`, keeping
    /// the wall-clock time they were set for.
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be read
    pub fn upcoming(&self, now: DateTime<FixedOffset>) -> Result<Vec<UpcomingReminder>> {
        let mut upcoming = Vec::new();

        if let Some(reminder) = self.bedtime_reminder()? {
            upcoming.push(UpcomingReminder {
                kind: ReminderKind::Bedtime,
                time: reminder.wake,
                id: reminder.id,
            });
        }

        for (day, alarm) in self.upcoming_alarms()? {
            let Some(time) = next_alarm_time(day, &alarm, now) else {
                log::warn!("Skipping alarm for {} with invalid time", weekday_name(day));
                continue;
            };
            upcoming.push(UpcomingReminder {
                kind: ReminderKind::WakeAlarm(day),
                time,
                id: alarm.notification_id,
            });
        }

        upcoming.sort_by_key(|r| r.time);
        Ok(upcoming)
    }

    /// Cancel one entry of the upcoming list
    ///
    /// # Errors
    ///
    /// Returns an error if the key-value store cannot be updated
    pub fn cancel(&self, kind: ReminderKind) -> Result<bool> {
        match kind {
            ReminderKind::Bedtime => self.cancel_bedtime_reminder(),
            ReminderKind::WakeAlarm(day) => self.cancel_weekday_alarm(day),
        }
    }

    fn cancel_quietly(&self, handle: &NotificationHandle) {
        if let Err(e) = self.notifier.cancel(handle) {
            log::warn!("Failed to cancel notification {handle}: {e:#}");
        }
    }
}

fn alarm_key(day: Weekday) -> String {
    format!("{}{}", keys::WEEKDAY_ALARM_PREFIX, day.num_days_from_sunday())
}

fn weekday_from_sunday(idx: u32) -> Option<Weekday> {
    match idx {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// First moment strictly after `now` whose wall-clock time is `at`
#[must_use]
pub fn next_occurrence(at: NaiveTime, now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let offset = *now.offset();
    let today = now.date_naive().and_time(at);
    let candidate = offset_datetime(today, offset);
    if candidate <= now {
        candidate + Duration::days(1)
    } else {
        candidate
    }
}

fn date_in_current_week(
    day: Weekday,
    at: NaiveTime,
    now: DateTime<FixedOffset>,
) -> DateTime<FixedOffset> {
    let mut delta =
        i64::from(day.num_days_from_sunday()) - i64::from(now.weekday().num_days_from_sunday());
    if delta < 0 {
        delta += 7;
    }
    let date = now.date_naive() + Duration::days(delta);
    offset_datetime(date.and_time(at), *now.offset())
}

/// Next firing of a weekly alarm strictly after `now`, at its stored wall-clock time
fn next_alarm_time(
    day: Weekday,
    alarm: &WeekdayAlarm,
    now: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    let at = DateTime::from_timestamp_millis(alarm.time)?
        .with_timezone(now.offset())
        .time();
    let target = date_in_current_week(day, at, now);
    Some(if target <= now {
        target + Duration::days(7)
    } else {
        target
    })
}

fn offset_datetime(
    local: chrono::NaiveDateTime,
    offset: FixedOffset,
) -> DateTime<FixedOffset> {
    DateTime::from_naive_utc_and_offset(local - offset, offset)
}
