mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    planner::{self, AlarmAction},
    sessions, settings, watch,
};

#[derive(Parser)]
#[command(name = "sleeploops")]
#[command(about = "Sleep tracking from app lifecycle signals", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed lifecycle phases (active, inactive, background) from stdin to the engine
    Watch {
        /// Phase the app is in when watching starts
        #[arg(long, default_value = "active")]
        initial: String,
    },
    /// Show tracking settings and the current session
    Status,
    /// List recorded sleep sessions
    Sessions {
        /// Show only the most recent N sessions
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print as JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Start a manual sleep session now
    Start,
    /// End the open sleep session now
    End,
    /// Delete a sleep session
    Delete {
        /// Session ID
        id: i64,
    },
    /// Show or change automatic sleep detection
    Tracking {
        #[command(subcommand)]
        action: Option<TrackingAction>,
    },
    /// Show or change the minimum inactivity gap, in minutes
    Threshold {
        minutes: Option<u32>,
    },
    /// Read device signals and the current sleep likelihood
    Signals,
    /// Suggest bedtimes or wake-up times based on sleep cycles
    Suggest {
        /// Wake-up time (HH:MM); suggests bedtimes
        #[arg(long, conflicts_with = "sleep")]
        wake: Option<String>,
        /// Bedtime (HH:MM); suggests wake-up times
        #[arg(long)]
        sleep: Option<String>,
    },
    /// Show, schedule or cancel the wind-down reminder
    Remind {
        /// Bedtime (HH:MM)
        time: Option<String>,
        /// Cancel the scheduled reminder
        #[arg(long, conflicts_with = "time")]
        cancel: bool,
    },
    /// Manage weekly wake-up alarms
    Alarm {
        #[command(subcommand)]
        action: AlarmAction,
    },
    /// Delete all sessions, reminders and settings
    Reset {
        /// Skip the confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TrackingAction {
    /// Enable automatic sleep detection
    On,
    /// Disable automatic sleep detection
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    match cli.command {
        Commands::Watch { initial } => watch::handle_watch(&initial).await,
        Commands::Status => settings::handle_status().await,
        Commands::Sessions { limit, json } => sessions::handle_list(limit, json).await,
        Commands::Start => sessions::handle_start().await,
        Commands::End => sessions::handle_end().await,
        Commands::Delete { id } => sessions::handle_delete(id).await,
        Commands::Tracking { action } => {
            let enabled = action.map(|a| matches!(a, TrackingAction::On));
            settings::handle_tracking(enabled).await
        }
        Commands::Threshold { minutes } => settings::handle_threshold(minutes).await,
        Commands::Signals => settings::handle_signals().await,
        Commands::Suggest { wake, sleep } => {
            planner::handle_suggest(wake.as_deref(), sleep.as_deref())
        }
        Commands::Remind { time, cancel } => planner::handle_remind(time.as_deref(), cancel),
        Commands::Alarm { action } => planner::handle_alarm(action),
        Commands::Reset { yes } => settings::handle_reset(yes).await,
    }
}
