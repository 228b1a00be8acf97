#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `climate_map`: region catalog, boundary and event tools for the BC
//! climate map.
//!
//! Run with a subcommand for scripted use, or without one for an
//! interactive menu. Log output goes through
//! [`climate_map_cli_utils::init_logger`] so it never tears progress bars.

mod commands;
mod menu;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use climate_map_api_models::{EventStatus, StatusKind};

use crate::commands::App;

#[derive(Parser)]
#[command(name = "climate_map", about = "BC climate map tools")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the region catalog
    Regions,
    /// Load the boundary dataset and report how it groups into regions
    Boundaries,
    /// Find a boundary feature by district name
    Lookup {
        /// District name or fragment (e.g. "north okanagan")
        name: String,
    },
    /// Write one `GeoJSON` file per region
    ExportGroups {
        /// Output directory (created if missing)
        dir: PathBuf,
    },
    /// Fetch, geocode and filter events
    Events {
        /// Region label (e.g. "Lower Mainland"); "all" for every region
        #[arg(long)]
        region: Option<String>,
        /// Category title; "all" for every category
        #[arg(long)]
        category: Option<String>,
        /// Only events with this status (name or numeric code)
        #[arg(long, value_parser = parse_status)]
        status: Option<EventStatus>,
        /// Place unmatched locations at their region's centroid
        #[arg(long)]
        fallback: bool,
    },
    /// Summarize all events
    Stats,
    /// Poll air quality for a region until Ctrl-C
    AirQuality {
        /// Region name as known to the backend
        region: String,
        /// Seconds between polls
        #[arg(long, default_value_t = 300)]
        interval_secs: u64,
    },
}

fn parse_status(raw: &str) -> Result<EventStatus, String> {
    raw.trim().parse::<u8>().map(EventStatus).or_else(|_| {
        raw.trim()
            .parse::<StatusKind>()
            .map(StatusKind::code)
            .map_err(|_| format!("unknown status {raw:?} (approved, deleted, pending or 0-3)"))
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = climate_map_cli_utils::init_logger();
    let cli = Cli::parse();

    let command = match cli.command {
        Some(command) => command,
        None => menu::prompt()?,
    };

    let app = App::from_env(multi)?;
    app.run(command).await
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory as _;

    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_status_names_and_codes() {
        assert_eq!(parse_status("pending"), Ok(EventStatus::PENDING));
        assert_eq!(parse_status("Approved"), Ok(EventStatus::APPROVED));
        assert_eq!(parse_status("0"), Ok(EventStatus::LEGACY_APPROVED));
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn parses_events_flags() {
        let cli = Cli::try_parse_from([
            "climate_map",
            "events",
            "--region",
            "Lower Mainland",
            "--status",
            "pending",
            "--fallback",
        ])
        .unwrap();
        let Some(Commands::Events {
            region,
            category,
            status,
            fallback,
        }) = cli.command
        else {
            panic!("expected the events command");
        };
        assert_eq!(region.as_deref(), Some("Lower Mainland"));
        assert_eq!(category, None);
        assert_eq!(status, Some(EventStatus::PENDING));
        assert!(fallback);
    }
}
