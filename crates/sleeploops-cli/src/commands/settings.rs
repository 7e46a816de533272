/// Tracking settings, signal readout and reset command handlers
use anyhow::Result;
use sleeploops_core::{sleep_store::format_duration, SignalSnapshot};
use tabled::{Table, Tabled};

use super::helpers::{format_millis, open_context};

#[derive(Tabled)]
struct SignalRow {
    #[tabled(rename = "Signal")]
    name: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

fn signal_rows(snapshot: &SignalSnapshot) -> Vec<SignalRow> {
    vec![
        SignalRow {
            name: "Charging",
            value: if snapshot.is_charging { "yes" } else { "no" }.to_string(),
        },
        SignalRow {
            name: "Brightness",
            value: format!("{:.0}%", snapshot.brightness * 100.0),
        },
        SignalRow {
            name: "Battery",
            value: format!("{:.0}%", snapshot.battery_level * 100.0),
        },
        SignalRow {
            name: "Hour",
            value: snapshot.hour_of_day.to_string(),
        },
        SignalRow {
            name: "Sleep likelihood",
            value: format!("{:.2}", snapshot.sleep_likelihood),
        },
    ]
}

pub async fn handle_status() -> Result<()> {
    let ctx = open_context()?;
    let now = ctx.now();
    let state = ctx.monitor().lock().await.state().clone();

    println!("Sleep Tracking");
    println!("==============");
    println!(
        "Auto-detection: {}",
        if state.is_tracking { "ON" } else { "OFF" }
    );
    println!("Sleep threshold: {} minutes", state.sleep_threshold_minutes);
    match state.last_active_time {
        Some(t) => println!("Last active: {}", t.format("%Y-%m-%d %H:%M")),
        None => println!("Last active: never"),
    }

    let store = ctx.store().lock().await;
    println!("Sessions recorded: {}", store.sessions().len());
    if let Some(active) = store.active_session() {
        println!(
            "Running session: #{} since {} ({})",
            active.id,
            format_millis(active.start, now.offset()),
            format_duration(now.timestamp_millis() - active.start)
        );
    }
    drop(store);

    if let Some(reminder) = ctx.reminders().bedtime_reminder()? {
        println!("Wind-down reminder: {}", reminder.wake.format("%H:%M"));
    }
    Ok(())
}

pub async fn handle_tracking(enabled: Option<bool>) -> Result<()> {
    let ctx = open_context()?;
    match enabled {
        Some(enabled) => {
            ctx.set_tracking(enabled).await;
            println!(
                "Automatic sleep detection {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
        None => {
            let tracking = ctx.monitor().lock().await.state().is_tracking;
            println!(
                "Automatic sleep detection is {}",
                if tracking { "ON" } else { "OFF" }
            );
        }
    }
    Ok(())
}

pub async fn handle_threshold(minutes: Option<u32>) -> Result<()> {
    let ctx = open_context()?;
    match minutes {
        Some(minutes) => {
            ctx.set_threshold(minutes).await?;
            println!("Sleep threshold set to {minutes} minutes");
        }
        None => {
            let current = ctx.monitor().lock().await.state().sleep_threshold_minutes;
            println!("Sleep threshold: {current} minutes");
        }
    }
    Ok(())
}

pub async fn handle_signals() -> Result<()> {
    let ctx = open_context()?;
    let snapshot = ctx.monitor().lock().await.signals().snapshot().await;
    println!("{}", Table::new(signal_rows(&snapshot)));
    Ok(())
}

pub async fn handle_reset(confirmed: bool) -> Result<()> {
    if !confirmed {
        println!("This deletes every session, reminder and setting.");
        println!("Run again with --yes to confirm.");
        return Ok(());
    }
    let ctx = open_context()?;
    ctx.reset_app().await;
    println!("All sleeploops data has been reset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_rows() {
        let snapshot = SignalSnapshot {
            is_charging: true,
            brightness: 0.25,
            battery_level: 0.9,
            hour_of_day: 23,
            sleep_likelihood: 1.0,
        };
        let rows = signal_rows(&snapshot);
        let values: Vec<&str> = rows.iter().map(|r| r.value.as_str()).collect();
        assert_eq!(values, vec!["yes", "25%", "90%", "23", "1.00"]);
    }
}
