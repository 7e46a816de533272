//! Long-running watch mode
//!
//! Reads one lifecycle phase per line from stdin and hands it to the engine,
//! so any host (a shell script, a window manager hook) can drive detection:
//!
//! ```text
//! background
//! active
//! ```

use anyhow::{Context, Result};
use sleeploops_core::{monitor::LifecyclePhase, AppContext};
use std::io::{self, BufRead};
use std::thread;
use tokio::sync::mpsc::Sender;

pub async fn handle_watch(initial: &str) -> Result<()> {
    let initial: LifecyclePhase = initial.parse()?;
    let mut ctx = AppContext::open(None, initial).context("Failed to open sleeploops data")?;
    ctx.on_sessions_changed(Box::new(|sessions| {
        log::debug!("{} sleep sessions stored", sessions.len());
    }))
    .await;

    let events = ctx.subscribe_lifecycle()?;

    // Blocking stdin reads live on a plain thread so Ctrl-C never waits for input
    thread::Builder::new()
        .name("stdin-lifecycle".to_string())
        .spawn(move || {
            if let Err(e) = forward_lines(io::stdin().lock(), &events) {
                log::error!("Stopped reading lifecycle events: {e:#}");
            }
        })
        .context("Failed to spawn stdin reader")?;

    println!("Watching lifecycle events on stdin (active, inactive, background). Ctrl-C to stop.");
    ctx.run_with_signals().await?;
    ctx.shutdown();
    Ok(())
}

/// Parse one input line; blank lines and `#` comments yield `None`
fn parse_line(line: &str) -> Option<Result<LifecyclePhase>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line.parse())
}

/// Send every phase read from `input` until EOF or until the engine goes away
fn forward_lines<R: BufRead>(input: R, events: &Sender<LifecyclePhase>) -> Result<usize> {
    let mut forwarded = 0;
    for line in input.lines() {
        let line = line.context("Failed to read stdin")?;
        match parse_line(&line) {
            Some(Ok(phase)) => {
                if events.blocking_send(phase).is_err() {
                    break;
                }
                forwarded += 1;
            }
            Some(Err(e)) => log::warn!("{e}"),
            None => {}
        }
    }
    log::debug!("Forwarded {forwarded} lifecycle events");
    Ok(forwarded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    #[test]
    fn test_parse_line() {
        assert!(parse_line("").is_none());
        assert!(parse_line("  # comment").is_none());
        assert_eq!(
            parse_line(" Background ").unwrap().unwrap(),
            LifecyclePhase::Background
        );
        assert!(parse_line("asleep").unwrap().is_err());
    }

    #[test]
    fn test_forward_lines_skips_noise() {
        let (tx, mut rx) = mpsc::channel(8);
        let input = Cursor::new("inactive\n\nbogus\nbackground\nactive\n");

        assert_eq!(forward_lines(input, &tx).unwrap(), 3);
        drop(tx);

        let mut received = Vec::new();
        while let Some(phase) = rx.blocking_recv() {
            received.push(phase);
        }
        assert_eq!(
            received,
            vec![
                LifecyclePhase::Inactive,
                LifecyclePhase::Background,
                LifecyclePhase::Active
            ]
        );
    }

    #[test]
    fn test_forward_lines_stops_when_engine_is_gone() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let input = Cursor::new("active\nbackground\n");
        assert_eq!(forward_lines(input, &tx).unwrap(), 0);
    }
}
