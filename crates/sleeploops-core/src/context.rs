use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, FixedOffset};
use sleeploops_storage::Database;
use std::{path::PathBuf, sync::Arc};
use tokio::sync::{mpsc, Mutex};

use crate::{
    clock::{Clock, SystemClock},
    config::EngineConfig,
    cycles::SleepCycles,
    monitor::{ActivityMonitor, GapOutcome, LifecyclePhase},
    notifier::{LogNotifier, Notifier},
    reminders::Reminders,
    signals::{create_signal_source, DeviceSignalSource, SignalAggregator},
    sleep_store::{SessionListener, SleepStore},
};

const LIFECYCLE_CHANNEL_CAPACITY: usize = 32;

/// Host services the engine depends on
pub struct Collaborators {
    pub signals: Arc<dyn DeviceSignalSource>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// Platform signal source, logging notifier and the system clock
    #[must_use]
    pub fn system() -> Self {
        Self {
            signals: create_signal_source(),
            notifier: Arc::new(LogNotifier::new()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Process-wide composition root
///
/// Owns the database, the session store and the activity monitor. Lifecycle
/// events and configuration changes both go through the monitor's mutex, so a
/// gap evaluation never interleaves with a settings change.
pub struct AppContext {
    database: Arc<Database>,
    clock: Arc<dyn Clock>,
    store: Arc<Mutex<SleepStore>>,
    monitor: Arc<Mutex<ActivityMonitor>>,
    reminders: Reminders,
    cycles: SleepCycles,
    lifecycle_rx: Option<mpsc::Receiver<LifecyclePhase>>,
    subscribed: bool,
}

impl AppContext {
    #[must_use]
    pub fn new(
        database: Database,
        config: &EngineConfig,
        initial_phase: LifecyclePhase,
        collaborators: Collaborators,
    ) -> Self {
        let database = Arc::new(database);
        let Collaborators {
            signals,
            notifier,
            clock,
        } = collaborators;

        let mut store = SleepStore::new(database.clone(), database.clone(), notifier.clone());
        if let Err(e) = store.load() {
            log::error!("Error loading sessions: {e:#}");
        }
        let store = Arc::new(Mutex::new(store));

        let aggregator = SignalAggregator::new(signals, clock.clone(), config.signal_timeout());
        let monitor = ActivityMonitor::new(
            initial_phase,
            database.clone(),
            store.clone(),
            aggregator,
            clock.clone(),
        )
        .with_dedup_window(config.dedup_window_ms());

        Self {
            reminders: Reminders::new(database.clone(), notifier),
            cycles: SleepCycles::from_config(config),
            database,
            clock,
            store,
            monitor: Arc::new(Mutex::new(monitor)),
            lifecycle_rx: None,
            subscribed: false,
        }
    }

    /// Open the on-disk database with the default configuration and system collaborators
    ///
    /// # Errors
    ///
    /// Returns an error if the database or the config file cannot be opened
    pub fn open(db_path: Option<PathBuf>, initial_phase: LifecyclePhase) -> Result<Self> {
        let database = Database::new(db_path)?;
        let config = EngineConfig::load_default()?;
        Ok(Self::new(
            database,
            &config,
            initial_phase,
            Collaborators::system(),
        ))
    }

    #[must_use]
    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    #[must_use]
    pub fn store(&self) -> &Arc<Mutex<SleepStore>> {
        &self.store
    }

    #[must_use]
    pub fn monitor(&self) -> &Arc<Mutex<ActivityMonitor>> {
        &self.monitor
    }

    #[must_use]
    pub fn reminders(&self) -> &Reminders {
        &self.reminders
    }

    #[must_use]
    pub const fn cycles(&self) -> SleepCycles {
        self.cycles
    }

    #[must_use]
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    /// Observe every change to the session list
    pub async fn on_sessions_changed(&self, listener: SessionListener) {
        self.store.lock().await.subscribe(listener);
    }

    /// Open a manual session now
    pub async fn start_session(&self) -> Option<i64> {
        let now = self.now().timestamp_millis();
        self.store.lock().await.start_session(now)
    }

    /// Close the open session now
    pub async fn end_session(&self) -> Option<i64> {
        let now = self.now().timestamp_millis();
        self.store.lock().await.end_session(now)
    }

    pub async fn set_tracking(&self, enabled: bool) {
        self.monitor.lock().await.set_tracking(enabled);
    }

    /// # Errors
    ///
    /// Returns an error if `minutes` is zero
    pub async fn set_threshold(&self, minutes: u32) -> Result<()> {
        self.monitor.lock().await.set_threshold(minutes)
    }

    /// Feed one lifecycle transition to the monitor
    pub async fn dispatch(&self, phase: LifecyclePhase) -> Option<GapOutcome> {
        let outcome = self.monitor.lock().await.handle_phase_change(phase).await;
        if let Some(GapOutcome::Sleep {
            session_id: Some(id),
            gap_minutes,
            ..
        }) = &outcome
        {
            log::info!("Recorded sleep session {id} after {gap_minutes:.0} minutes away");
        }
        outcome
    }

    /// Create the lifecycle channel; events sent on it are handled by `run_with_signals`
    ///
    /// # Errors
    ///
    /// Returns an error if a subscriber already exists
    pub fn subscribe_lifecycle(&mut self) -> Result<mpsc::Sender<LifecyclePhase>> {
        if self.subscribed {
            bail!("Lifecycle events already have a subscriber");
        }
        let (tx, rx) = mpsc::channel(LIFECYCLE_CHANNEL_CAPACITY);
        self.lifecycle_rx = Some(rx);
        self.subscribed = true;
        Ok(tx)
    }

    /// Handle lifecycle events until every sender is dropped or Ctrl-C arrives
    ///
    /// # Errors
    ///
    /// Returns an error if `subscribe_lifecycle` was not called first
    pub async fn run_with_signals(&mut self) -> Result<()> {
        let mut events = self
            .lifecycle_rx
            .take()
            .ok_or_else(|| anyhow!("No lifecycle subscription to run"))?;
        log::info!("Watching lifecycle events");

        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(phase) = event else {
                        log::info!("Lifecycle source closed");
                        break;
                    };
                    log::debug!("Lifecycle phase: {phase}");
                    self.dispatch(phase).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl-C, shutting down...");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Clear sessions, notifications and preferences, and forget monitor state
    pub async fn reset_app(&self) {
        let mut monitor = self.monitor.lock().await;
        self.store.lock().await.reset_app();
        monitor.reset();
    }

    /// Unsubscribe from lifecycle events and release the database
    pub fn shutdown(mut self) {
        self.lifecycle_rx = None;
        self.subscribed = false;
        log::info!("Engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::ActivityState;
    use crate::store::{keys, KeyValueStore};
    use crate::testing::{at, FakeSignals, ManualClock, RecordingNotifier};
    use chrono::NaiveTime;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn context(clock: &Arc<ManualClock>, notifier: &Arc<RecordingNotifier>) -> AppContext {
        context_with(FakeSignals::new(true, 0.2, 0.5), clock, notifier)
    }

    fn context_with(
        signals: FakeSignals,
        clock: &Arc<ManualClock>,
        notifier: &Arc<RecordingNotifier>,
    ) -> AppContext {
        AppContext::new(
            Database::open_in_memory().unwrap(),
            &EngineConfig::default(),
            LifecyclePhase::Active,
            Collaborators {
                signals: Arc::new(signals),
                notifier: notifier.clone(),
                clock: clock.clone(),
            },
        )
    }

    #[tokio::test]
    async fn test_reset_app_returns_to_fresh_install() {
        let clock = Arc::new(ManualClock::new(at(1, 23, 0)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&clock, &notifier);

        ctx.dispatch(LifecyclePhase::Background).await;
        clock.set(at(2, 7, 0));
        let outcome = ctx.dispatch(LifecyclePhase::Active).await;
        assert!(matches!(
            outcome,
            Some(GapOutcome::Sleep {
                session_id: Some(_),
                ..
            })
        ));
        ctx.set_threshold(45).await.unwrap();
        ctx.reminders()
            .schedule_bedtime_reminder(NaiveTime::from_hms_opt(22, 30, 0).unwrap(), ctx.now())
            .unwrap();

        ctx.reset_app().await;

        assert!(ctx.store().lock().await.sessions().is_empty());
        assert!(ctx.database().list_sessions().unwrap().is_empty());
        assert_eq!(notifier.cancel_all_calls(), 1);
        assert_eq!(
            KeyValueStore::get(ctx.database().as_ref(), keys::LAST_ACTIVE_TIME).unwrap(),
            None
        );
        assert_eq!(ctx.reminders().bedtime_reminder().unwrap(), None);

        let mut monitor = ctx.monitor().lock().await;
        assert_eq!(monitor.state(), &ActivityState::fresh(LifecyclePhase::Active));
        assert_eq!(monitor.evaluate_gap().await, GapOutcome::NoBaseline);
    }

    #[tokio::test]
    async fn test_lifecycle_events_are_handled_in_order() {
        let clock = Arc::new(ManualClock::new(at(1, 12, 0)));
        let notifier = Arc::new(RecordingNotifier::default());
        let mut ctx = context(&clock, &notifier);

        let tx = ctx.subscribe_lifecycle().unwrap();
        assert!(ctx.subscribe_lifecycle().is_err());

        tx.send(LifecyclePhase::Inactive).await.unwrap();
        tx.send(LifecyclePhase::Background).await.unwrap();
        tx.send(LifecyclePhase::Active).await.unwrap();
        drop(tx);

        ctx.run_with_signals().await.unwrap();

        let monitor = ctx.monitor().lock().await;
        assert_eq!(monitor.state().phase, LifecyclePhase::Active);
        assert_eq!(monitor.state().last_active_time, Some(at(1, 12, 0)));
        drop(monitor);

        assert!(ctx.run_with_signals().await.is_err());
        ctx.shutdown();
    }

    #[tokio::test]
    async fn test_manual_sessions_notify_listeners() {
        let clock = Arc::new(ManualClock::new(at(1, 22, 30)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&clock, &notifier);

        let changes = Arc::new(AtomicUsize::new(0));
        let seen = changes.clone();
        ctx.on_sessions_changed(Box::new(move |sessions| {
            assert!(sessions.len() <= 1);
            seen.fetch_add(1, Ordering::SeqCst);
        }))
        .await;

        let id = ctx.start_session().await.unwrap();
        clock.set(at(2, 6, 45));
        assert_eq!(ctx.end_session().await, Some(id));
        assert_eq!(changes.load(Ordering::SeqCst), 2);

        let sessions = ctx.database().list_sessions().unwrap();
        assert_eq!(sessions[0].start, at(1, 22, 30).timestamp_millis());
        assert_eq!(sessions[0].end, Some(at(2, 6, 45).timestamp_millis()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settings_change_waits_for_gap_evaluation() {
        let clock = Arc::new(ManualClock::new(at(1, 23, 0)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = Arc::new(context_with(
            FakeSignals::new(true, 0.1, 0.5).stalled(),
            &clock,
            &notifier,
        ));

        ctx.dispatch(LifecyclePhase::Background).await;
        clock.set(at(2, 7, 0));

        // Gap evaluation holds the monitor while signal reads stall
        let evaluating = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.dispatch(LifecyclePhase::Active).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(ctx.monitor().try_lock().is_err());

        let changing = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.set_threshold(45).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!changing.is_finished());

        // Evaluated against the old threshold: 30 * (1 - 0.1 * 0.3)
        let outcome = evaluating.await.unwrap();
        let Some(GapOutcome::Sleep {
            adjusted_threshold, ..
        }) = outcome
        else {
            panic!("expected sleep, got {outcome:?}");
        };
        assert!((adjusted_threshold - 29.1).abs() < 1e-9);

        changing.await.unwrap().unwrap();
        assert_eq!(
            ctx.monitor().lock().await.state().sleep_threshold_minutes,
            45
        );
    }

    #[tokio::test]
    async fn test_tracking_toggle_goes_through_monitor() {
        let clock = Arc::new(ManualClock::new(at(1, 22, 0)));
        let notifier = Arc::new(RecordingNotifier::default());
        let ctx = context(&clock, &notifier);

        ctx.set_tracking(false).await;
        assert!(!ctx.monitor().lock().await.state().is_tracking);
        assert_eq!(
            KeyValueStore::get(ctx.database().as_ref(), keys::TRACKING_ENABLED).unwrap(),
            Some("false".to_string())
        );
        assert_eq!(ctx.cycles(), SleepCycles::default());
    }
}
