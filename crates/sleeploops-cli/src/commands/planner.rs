//! Bedtime planning: cycle suggestions, the wind-down reminder and weekly alarms

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::Subcommand;
use sleeploops_core::{
    cycles::DEFAULT_WAKE_CYCLE_COUNTS,
    reminders::{next_occurrence, ReminderKind, UpcomingReminder},
    CycleSuggestion,
};
use tabled::{Table, Tabled};

use super::helpers::{format_clock, format_millis, open_context, parse_time_of_day, parse_weekday};

#[derive(Subcommand, Debug)]
pub enum AlarmAction {
    /// Set the wake-up alarm for a weekday of the current week
    Set {
        /// Weekday name (mon) or number (0 = Sunday)
        day: String,
        /// Wake-up time (HH:MM)
        time: String,
    },
    /// Cancel the alarm for a weekday
    Cancel {
        /// Weekday name (mon) or number (0 = Sunday)
        day: String,
    },
    /// List the wind-down reminder and weekly alarms, soonest first
    List,
}

#[derive(Tabled)]
struct SuggestionRow {
    #[tabled(rename = "Cycles")]
    cycles: u32,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Sleep")]
    sleep: String,
}

#[derive(Tabled)]
struct UpcomingRow {
    #[tabled(rename = "Reminder")]
    what: String,
    #[tabled(rename = "When")]
    time: String,
    #[tabled(rename = "Notification")]
    notification: String,
}

fn suggestion_rows(suggestions: &[CycleSuggestion], cycle_minutes: u32) -> Vec<SuggestionRow> {
    suggestions
        .iter()
        .map(|s| {
            let minutes = s.cycles * cycle_minutes;
            SuggestionRow {
                cycles: s.cycles,
                time: format_clock(&s.time),
                sleep: format!("{}h {:02}m", minutes / 60, minutes % 60),
            }
        })
        .collect()
}

pub fn handle_suggest(wake: Option<&str>, sleep: Option<&str>) -> Result<()> {
    let ctx = open_context()?;
    let now = ctx.now();
    let cycles = ctx.cycles();
    let cycle_minutes = cycles.cycle_minutes();

    if let Some(wake) = wake {
        let wake = next_occurrence(parse_time_of_day(wake)?, now);
        println!("To wake up at {}, go to bed at:", format_clock(&wake));
        let rows = suggestion_rows(&cycles.bedtime_suggestions(wake), cycle_minutes);
        println!("{}", Table::new(rows));
    } else if let Some(sleep) = sleep {
        let sleep = next_occurrence(parse_time_of_day(sleep)?, now);
        println!("Going to bed at {}, wake up at:", format_clock(&sleep));
        let rows = suggestion_rows(&cycles.wake_suggestions(sleep), cycle_minutes);
        println!("{}", Table::new(rows));
    } else {
        println!("Going to sleep now ({}), wake up at:", format_clock(&now));
        for (count, time) in DEFAULT_WAKE_CYCLE_COUNTS
            .iter()
            .zip(cycles.recommended_wake_times(now, &DEFAULT_WAKE_CYCLE_COUNTS))
        {
            println!("  {} ({count} cycles)", format_clock(&time));
        }
    }
    Ok(())
}

pub fn handle_remind(time: Option<&str>, cancel: bool) -> Result<()> {
    let ctx = open_context()?;
    if cancel {
        if ctx.reminders().cancel_bedtime_reminder()? {
            println!("Wind-down reminder cancelled");
        } else {
            println!("No wind-down reminder set");
        }
        return Ok(());
    }

    match time {
        Some(time) => {
            let reminder = ctx
                .reminders()
                .schedule_bedtime_reminder(parse_time_of_day(time)?, ctx.now())?;
            println!(
                "Wind-down reminder set for {} (id {})",
                format_clock(&reminder.wake),
                reminder.id
            );
        }
        None => match ctx.reminders().bedtime_reminder()? {
            Some(reminder) => println!("Wind-down reminder: {}", format_clock(&reminder.wake)),
            None => println!("No wind-down reminder set"),
        },
    }
    Ok(())
}

pub fn handle_alarm(action: AlarmAction) -> Result<()> {
    let ctx = open_context()?;
    let reminders = ctx.reminders();
    let now = ctx.now();

    match action {
        AlarmAction::Set { day, time } => {
            let day = parse_weekday(&day)?;
            let alarm = reminders.schedule_weekday_alarm(day, parse_time_of_day(&time)?, now)?;
            println!(
                "Alarm for {day} set to {}",
                format_millis(alarm.time, now.offset())
            );
        }
        AlarmAction::Cancel { day } => {
            let day = parse_weekday(&day)?;
            if reminders.cancel(ReminderKind::WakeAlarm(day))? {
                println!("Alarm for {day} cancelled");
            } else {
                println!("No alarm set for {day}");
            }
        }
        AlarmAction::List => {
            let upcoming = reminders.upcoming(now)?;
            if upcoming.is_empty() {
                println!("No reminders or alarms set");
            } else {
                println!("{}", Table::new(upcoming_rows(&upcoming)));
            }
        }
    }
    Ok(())
}

fn upcoming_rows(upcoming: &[UpcomingReminder]) -> Vec<UpcomingRow> {
    upcoming
        .iter()
        .map(|r| UpcomingRow {
            what: match r.kind {
                ReminderKind::Bedtime => "Wind down".to_string(),
                ReminderKind::WakeAlarm(day) => format!("Wake up ({day})"),
            },
            time: format_datetime(&r.time),
            notification: r.id.to_string(),
        })
        .collect()
}

fn format_datetime(time: &DateTime<FixedOffset>) -> String {
    time.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};
    use sleeploops_core::{notifier::NotificationHandle, SleepCycles};

    fn utc(day: u32, hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 1, day, hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_suggestion_rows() {
        let suggestions = SleepCycles::default().bedtime_suggestions(utc(2, 7, 0));
        let rows = suggestion_rows(&suggestions, 90);
        assert_eq!(rows[0].time, "Mon 23:15");
        assert_eq!(rows[0].sleep, "7h 30m");
        assert_eq!(rows[2].cycles, 3);
        assert_eq!(rows[2].sleep, "4h 30m");
    }

    #[test]
    fn test_upcoming_rows() {
        let upcoming = vec![
            UpcomingReminder {
                kind: ReminderKind::Bedtime,
                time: utc(3, 22, 45),
                id: NotificationHandle("n1".to_string()),
            },
            UpcomingReminder {
                kind: ReminderKind::WakeAlarm(Weekday::Fri),
                time: utc(5, 7, 0),
                id: NotificationHandle("abc".to_string()),
            },
        ];
        let rows = upcoming_rows(&upcoming);
        assert_eq!(rows[0].what, "Wind down");
        assert_eq!(rows[0].time, "2024-01-03 22:45");
        assert_eq!(rows[1].what, "Wake up (Fri)");
        assert_eq!(rows[1].time, "2024-01-05 07:00");
        assert_eq!(rows[1].notification, "abc");
    }
}
