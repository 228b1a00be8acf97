//! Interactive command selection when no subcommand is given.

use std::path::PathBuf;

use dialoguer::{Confirm, Input, Select};

use crate::Commands;

enum Choice {
    Events,
    Stats,
    AirQuality,
    Regions,
    Boundaries,
    Lookup,
    ExportGroups,
}

impl Choice {
    const ALL: &[Self] = &[
        Self::Events,
        Self::Stats,
        Self::AirQuality,
        Self::Regions,
        Self::Boundaries,
        Self::Lookup,
        Self::ExportGroups,
    ];

    const fn label(&self) -> &'static str {
        match self {
            Self::Events => "Browse events",
            Self::Stats => "Event statistics",
            Self::AirQuality => "Watch air quality",
            Self::Regions => "Show region catalog",
            Self::Boundaries => "Check boundary grouping",
            Self::Lookup => "Look up a district",
            Self::ExportGroups => "Export region GeoJSON",
        }
    }
}

/// Asks which command to run and for its arguments.
///
/// # Errors
///
/// Returns an error if the terminal prompt fails.
pub fn prompt() -> Result<Commands, dialoguer::Error> {
    println!("BC Climate Map");
    println!();

    let labels: Vec<&str> = Choice::ALL.iter().map(Choice::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    Ok(match Choice::ALL[idx] {
        Choice::Events => Commands::Events {
            region: optional_text("Region (blank for all)")?,
            category: optional_text("Category (blank for all)")?,
            status: None,
            fallback: Confirm::new()
                .with_prompt("Use region centroids for unmatched locations?")
                .default(false)
                .interact()?,
        },
        Choice::Stats => Commands::Stats,
        Choice::AirQuality => Commands::AirQuality {
            region: Input::new().with_prompt("Region").interact_text()?,
            interval_secs: Input::new()
                .with_prompt("Seconds between polls")
                .default(300)
                .interact_text()?,
        },
        Choice::Regions => Commands::Regions,
        Choice::Boundaries => Commands::Boundaries,
        Choice::Lookup => Commands::Lookup {
            name: Input::new().with_prompt("District name").interact_text()?,
        },
        Choice::ExportGroups => Commands::ExportGroups {
            dir: PathBuf::from(
                Input::<String>::new()
                    .with_prompt("Output directory")
                    .default("regions".to_string())
                    .interact_text()?,
            ),
        },
    })
}

fn optional_text(prompt: &str) -> Result<Option<String>, dialoguer::Error> {
    let raw: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;
    Ok(Some(raw.trim().to_string()).filter(|s| !s.is_empty()))
}
