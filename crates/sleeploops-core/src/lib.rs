pub mod clock;
pub mod config;
pub mod context;
pub mod cycles;
pub mod error;
pub mod monitor;
pub mod notifier;
pub mod reminders;
pub mod signals;
pub mod sleep_store;
pub mod store;

#[cfg(test)]
mod testing;

pub use context::{AppContext, Collaborators};
pub use cycles::{CycleSuggestion, SleepCycles};
pub use monitor::{ActivityMonitor, ActivityState, GapOutcome, LifecyclePhase};
pub use signals::{SignalAggregator, SignalSnapshot};
pub use sleep_store::SleepStore;
