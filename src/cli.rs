//! CLI interface for Woof.
//!
//! Each subcommand is non-interactive: arguments in, plain text out.
//! Commands that touch a wallet, a walk, or a personal drop act as the user
//! resolved from `--as`, `WOOF_USER`, or the config file.
//!
//! Drop references take a full UUID or an unambiguous prefix.

mod drops;
mod format;
mod walk;
mod wallet;

use clap::{Args, Parser, Subcommand};

use woof::config::Config;
use woof::geo::Coordinate;
use woof::rewards::Deal;
use woof::storage::Storage;
use woof::user;

use drops::DropsCommand;
use walk::WalkCommand;
use wallet::WalletCommand;

/// Woof: walk your dog, collect bones.
#[derive(Debug, Parser)]
#[command(name = "woof", version, after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Act as this user. Overrides `WOOF_USER` and the config file.
    #[arg(long = "as", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r"Workflow: a morning walk
  1. woof drops reset --lat 40.7059 --lon -74.0565
     → clears yesterday's drops and seeds today's
  2. woof drops nearby --lat 40.7059 --lon -74.0565
     → lists the three closest drops; * marks one in reach
  3. woof --as luna drops collect 3f2 --lat 40.7059 --lon -74.0565
  4. woof --as luna walk replay morning.jsonl
  5. woof --as luna wallet show";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay and review walks.
    Walk {
        #[command(subcommand)]
        command: WalkCommand,
    },

    /// Find, collect, and seed bone drops.
    Drops {
        #[command(subcommand)]
        command: DropsCommand,
    },

    /// Check and spend bones.
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },

    /// Name the place at a position.
    Where {
        #[command(flatten)]
        at: LocationArgs,
    },
}

/// A position given as `--lat` and `--lon` in decimal degrees.
#[derive(Debug, Clone, Copy, Args)]
pub struct LocationArgs {
    /// Latitude, -90 to 90.
    #[arg(long, allow_negative_numbers = true)]
    lat: f64,

    /// Longitude, -180 to 180.
    #[arg(long, allow_negative_numbers = true)]
    lon: f64,
}

impl LocationArgs {
    fn coordinate(self) -> Result<Coordinate, String> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("latitude {} is out of range", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(format!("longitude {} is out of range", self.lon));
        }
        Ok(Coordinate::new(self.lat, self.lon))
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, storage: &Storage) -> Result<(), String> {
    let cli = Cli::parse();
    let acting = || user::resolve_user(cli.user.as_deref(), config);

    match cli.command {
        Command::Walk { command } => match command {
            WalkCommand::Replay { track, pace } => {
                walk::cmd_replay(storage, &acting()?, &track, pace)
            }
            WalkCommand::List => walk::cmd_list(storage, &acting()?),
        },
        Command::Drops { command } => match command {
            DropsCommand::Nearby { at, json } => drops::cmd_nearby(storage, at.coordinate()?, json),
            DropsCommand::Collect { drop, at } => {
                drops::cmd_collect(storage, &acting()?, &drop, at.coordinate()?)
            }
            DropsCommand::Seed { at, personal } => {
                let owner = if personal { Some(acting()?) } else { None };
                drops::cmd_seed(storage, owner.as_deref(), at.coordinate()?)
            }
            DropsCommand::Reset { at } => {
                // Personal drops are a bonus; reset works without a user.
                let owner = acting().ok();
                drops::cmd_reset(storage, owner.as_deref(), at.coordinate()?)
            }
        },
        Command::Wallet { command } => match command {
            WalletCommand::Show => wallet::cmd_show(storage, &acting()?),
            WalletCommand::History => wallet::cmd_history(storage, &acting()?),
            WalletCommand::Redeem { cost, title, deal } => {
                let deal = Deal {
                    id: deal,
                    title,
                    bones_cost: cost,
                };
                wallet::cmd_redeem(storage, &acting()?, &deal)
            }
        },
        Command::Where { at } => cmd_where(config, at.coordinate()?),
    }
}

fn cmd_where(config: &Config, position: Coordinate) -> Result<(), String> {
    let mut place = woof::geocode::PlaceTracker::default();
    println!("{}", place.update(&config.geocoder(), position));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_negative_longitude() {
        let cli = Cli::try_parse_from([
            "woof", "--as", "luna", "drops", "nearby", "--lat", "40.7", "--lon", "-74.05",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("luna"));
        let Command::Drops {
            command: DropsCommand::Nearby { at, json },
        } = cli.command
        else {
            panic!("expected drops nearby");
        };
        assert!(!json);
        assert_eq!(at.coordinate().unwrap(), Coordinate::new(40.7, -74.05));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let at = LocationArgs {
            lat: 91.0,
            lon: 0.0,
        };
        assert!(at.coordinate().is_err());

        let at = LocationArgs {
            lat: 0.0,
            lon: -180.5,
        };
        assert!(at.coordinate().is_err());
    }
}
