pub mod helpers;
pub mod planner;
pub mod sessions;
pub mod settings;
pub mod watch;
