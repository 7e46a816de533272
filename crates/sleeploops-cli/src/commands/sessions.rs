//! Sleep session commands: list, start, end, delete

use anyhow::Result;
use chrono::FixedOffset;
use sleeploops_core::sleep_store::format_duration;
use sleeploops_storage::SleepSession;
use tabled::{Table, Tabled};

use super::helpers::{format_millis, open_context};

#[derive(Tabled)]
struct SessionRow {
    #[tabled(rename = "ID")]
    id: i64,
    #[tabled(rename = "Start")]
    start: String,
    #[tabled(rename = "End")]
    end: String,
    #[tabled(rename = "Duration")]
    duration: String,
    #[tabled(rename = "Source")]
    source: &'static str,
}

impl SessionRow {
    fn new(session: &SleepSession, offset: &FixedOffset) -> Self {
        Self {
            id: session.id,
            start: format_millis(session.start, offset),
            end: session
                .end
                .map_or_else(|| "(open)".to_string(), |end| format_millis(end, offset)),
            duration: session
                .duration_ms()
                .map_or_else(|| "-".to_string(), format_duration),
            source: if session.auto_detected {
                "auto"
            } else {
                "manual"
            },
        }
    }
}

/// Most recent sessions first, capped at `limit`
fn recent(sessions: &[SleepSession], limit: Option<usize>) -> Vec<SleepSession> {
    let mut sorted = sessions.to_vec();
    sorted.sort_by(|a, b| b.start.cmp(&a.start));
    if let Some(limit) = limit {
        sorted.truncate(limit);
    }
    sorted
}

pub async fn handle_list(limit: Option<usize>, json: bool) -> Result<()> {
    let ctx = open_context()?;
    let sessions = recent(ctx.store().lock().await.sessions(), limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sleep sessions recorded yet.");
        return Ok(());
    }

    let offset = *ctx.now().offset();
    let rows: Vec<SessionRow> = sessions.iter().map(|s| SessionRow::new(s, &offset)).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

pub async fn handle_start() -> Result<()> {
    let ctx = open_context()?;
    let already_open = ctx.store().lock().await.active_session().map(|s| s.id);

    match (ctx.start_session().await, already_open) {
        (Some(id), Some(_)) => println!("Session {id} is already running"),
        (Some(id), None) => println!("Started sleep session {id}"),
        (None, _) => println!("Could not start a session (see log for details)"),
    }
    Ok(())
}

pub async fn handle_end() -> Result<()> {
    let ctx = open_context()?;
    match ctx.end_session().await {
        Some(id) => {
            let store = ctx.store().lock().await;
            let duration = store
                .sessions()
                .iter()
                .find(|s| s.id == id)
                .and_then(SleepSession::duration_ms)
                .map_or_else(|| "-".to_string(), format_duration);
            println!("Ended sleep session {id} ({duration})");
        }
        None => println!("No session is running"),
    }
    Ok(())
}

pub async fn handle_delete(id: i64) -> Result<()> {
    let ctx = open_context()?;
    if ctx.store().lock().await.delete_session(id) {
        println!("Deleted session {id}");
    } else {
        println!("Session {id} not found");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: i64, start: i64, end: Option<i64>, auto_detected: bool) -> SleepSession {
        SleepSession {
            id,
            start,
            end,
            auto_detected,
        }
    }

    #[test]
    fn test_recent_orders_newest_first() {
        let sessions = vec![
            session(1, 1_000, Some(2_000), false),
            session(2, 5_000, None, false),
            session(3, 3_000, Some(4_000), true),
        ];
        let ids: Vec<i64> = recent(&sessions, None).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let ids: Vec<i64> = recent(&sessions, Some(2)).iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn test_session_row() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let row = SessionRow::new(&session(7, 0, Some(27_000_000), true), &utc);
        assert_eq!(row.end, "1970-01-01 07:30");
        assert_eq!(row.duration, "7h 30m");
        assert_eq!(row.source, "auto");

        let open = SessionRow::new(&session(8, 0, None, false), &utc);
        assert_eq!(open.end, "(open)");
        assert_eq!(open.duration, "-");
        assert_eq!(open.source, "manual");
    }
}
