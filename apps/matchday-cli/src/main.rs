mod report;

use std::{env, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use matchday_clock::SystemTimeSource;
use matchday_feed::NullFeed;
use matchday_store::{init_tracing, JsonFileStore};
use matchday_tracker::{EventEntry, GoalEntry, MatchTracker};
use matchday_types::{
    clock::parse_display_time,
    config::MatchdayConfig,
    ledger::{EventType, GoalPatch, TeamSide},
};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "matchday", about = "Live match clock and timeline tracker")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides `persistence.data_dir`.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Discard the current match and start an idle one.
    New,
    Start,
    Pause,
    Status,
    /// Set the regulation length in seconds.
    Duration { seconds: i64 },
    Goal {
        #[arg(long, value_parser = parse_team)]
        team: TeamSide,
        #[arg(long)]
        scorer: String,
        #[arg(long)]
        number: Option<u8>,
        #[arg(long)]
        assist: Option<String>,
        #[arg(long)]
        assist_number: Option<u8>,
        /// `MM:SS` or seconds; defaults to the clock.
        #[arg(long, value_parser = parse_time)]
        at: Option<u32>,
    },
    Event {
        #[arg(long = "type", value_parser = parse_event_type)]
        kind: EventType,
        #[arg(long, value_parser = parse_team)]
        team: Option<TeamSide>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, value_parser = parse_time)]
        at: Option<u32>,
    },
    /// Toggle a goal between allowed and disallowed.
    Disallow {
        index: usize,
        #[arg(long)]
        reason: Option<String>,
    },
    EditGoal {
        index: usize,
        #[arg(long)]
        scorer: Option<String>,
        #[arg(long, value_parser = parse_team)]
        team: Option<TeamSide>,
        #[arg(long, value_parser = parse_time)]
        at: Option<u32>,
    },
    RemoveGoal { index: usize },
    RemoveEvent { index: usize },
    Rename {
        #[arg(long, value_parser = parse_team)]
        team: TeamSide,
        name: String,
    },
    HalfTime,
    FullTime,
    Timeline,
    Stats {
        #[arg(long)]
        force: bool,
    },
    Momentum {
        #[arg(long)]
        window: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.clone());
    if let Some(dir) = &cli.data_dir {
        config.persistence.data_dir = dir.display().to_string();
    }
    if let Err(err) = init_tracing(&config.ops) {
        eprintln!("Logging disabled: {err}");
    }

    let store = JsonFileStore::open(&config.persistence.data_dir)
        .context("failed to open match data directory")?;
    let mut tracker = MatchTracker::restore(
        config,
        Arc::new(store),
        Arc::new(SystemTimeSource),
        Arc::new(NullFeed),
    )
    .await
    .context("failed to restore match")?;

    let outcome = run(&mut tracker, cli.command);
    tracker.shutdown().await.context("failed to save match")?;
    let output = outcome?;
    println!("{output}");
    Ok(())
}

fn run(tracker: &mut MatchTracker, command: Command) -> Result<String> {
    debug!(?command, "Dispatching command");
    let output = match command {
        Command::New => {
            tracker.new_match();
            report::status(tracker)
        }
        Command::Start => {
            tracker.start_clock()?;
            report::status(tracker)
        }
        Command::Pause => {
            tracker.pause_clock()?;
            report::status(tracker)
        }
        Command::Status => report::status(tracker),
        Command::Duration { seconds } => {
            let applied = tracker.set_regulation_duration(seconds);
            format!("Regulation duration set to {applied}s")
        }
        Command::Goal {
            team,
            scorer,
            number,
            assist,
            assist_number,
            at,
        } => {
            let mut entry = GoalEntry::new(team, scorer);
            entry.scorer_shirt_number = number;
            entry.assist_name = assist;
            entry.assist_shirt_number = assist_number;
            entry.raw_time = at;
            let index = tracker.record_goal(entry)?;
            format!("Goal #{index} recorded\n{}", report::status(tracker))
        }
        Command::Event {
            kind,
            team,
            notes,
            at,
        } => {
            let mut entry = EventEntry::new(kind).with_notes(notes);
            entry.team = team;
            entry.raw_time = at;
            let index = tracker.record_event(entry)?;
            format!("{kind} recorded as event #{index}")
        }
        Command::Disallow { index, reason } => {
            let goal = tracker.toggle_goal_disallowed(index, reason.as_deref())?;
            match goal.disallowed_reason {
                Some(reason) => format!("Goal #{index} disallowed ({reason})"),
                None => format!("Goal #{index} allowed"),
            }
        }
        Command::EditGoal {
            index,
            scorer,
            team,
            at,
        } => {
            let patch = GoalPatch {
                raw_time: at,
                scorer_name: scorer,
                team,
                team_name: team.map(|side| tracker.state().team_name(side).to_string()),
                ..Default::default()
            };
            let goal = tracker.update_goal(index, &patch)?;
            format!("Goal #{index} is now {}", report::goal_line(&goal))
        }
        Command::RemoveGoal { index } => {
            let goal = tracker.remove_goal(index)?;
            format!("Removed {}", report::goal_line(&goal))
        }
        Command::RemoveEvent { index } => {
            let event = tracker.remove_event(index)?;
            format!("Removed {}", report::event_line(&event))
        }
        Command::Rename { team, name } => {
            tracker.rename_team(team, &name)?;
            report::status(tracker)
        }
        Command::HalfTime => {
            tracker.mark_half_time()?;
            report::status(tracker)
        }
        Command::FullTime => {
            tracker.mark_full_time()?;
            report::status(tracker)
        }
        Command::Timeline => report::timeline(&tracker.timeline()),
        Command::Stats { force } => report::statistics(&tracker.statistics(force)),
        Command::Momentum { window } => {
            let momentum = match window {
                Some(window) => tracker.momentum_with_window(window),
                None => tracker.momentum(),
            };
            report::momentum(tracker.state(), &momentum)
        }
    };
    Ok(output)
}

fn load_config(from_args: Option<PathBuf>) -> MatchdayConfig {
    let explicit = from_args.is_some();
    let path = from_args
        .or_else(|| env::var("MATCHDAY_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("configs/dev.toml"));
    if !explicit && !path.exists() {
        return MatchdayConfig::default();
    }
    match MatchdayConfig::from_file(&path) {
        Ok(cfg) => match cfg.validate() {
            Ok(()) => cfg,
            Err(err) => {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                MatchdayConfig::default()
            }
        },
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            MatchdayConfig::default()
        }
    }
}

fn parse_team(value: &str) -> Result<TeamSide, String> {
    let number: u8 = value
        .parse()
        .map_err(|_| format!("team must be 1 or 2, got '{value}'"))?;
    TeamSide::try_from(number).map_err(|err| err.to_string())
}

fn parse_time(value: &str) -> Result<u32, String> {
    let seconds = if value.contains(':') {
        parse_display_time(value).ok_or_else(|| format!("'{value}' is not MM:SS"))?
    } else {
        value
            .parse::<u64>()
            .map_err(|_| format!("'{value}' is not a number of seconds"))?
    };
    u32::try_from(seconds).map_err(|_| format!("'{value}' is too large"))
}

fn parse_event_type(value: &str) -> Result<EventType, String> {
    value.parse().map_err(|err: matchday_types::MatchdayError| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_times_and_teams() {
        assert_eq!(parse_time("10:05"), Ok(605));
        assert_eq!(parse_time("75"), Ok(75));
        assert!(parse_time("1:5").is_err());
        assert_eq!(parse_team("2"), Ok(TeamSide::Team2));
        assert!(parse_team("3").is_err());
        assert_eq!(parse_event_type("red-card"), Ok(EventType::RedCard));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
        let cli = Cli::parse_from(["matchday", "goal", "--team", "1", "--scorer", "A", "--at", "01:00"]);
        assert!(matches!(cli.command, Command::Goal { at: Some(60), .. }));
    }
}
