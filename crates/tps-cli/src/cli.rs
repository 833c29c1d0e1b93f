//! Command-line argument definitions.

use std::path::PathBuf;

use clap::Parser;

/// Timetable calendar splitter.
///
/// Downloads a timetable iCalendar feed, splits it into one calendar per
/// configured course with cleaned-up titles, locations and descriptions,
/// and prints a report of every decision made.
#[derive(Debug, Parser)]
#[command(name = "tpsplit", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run everything except writing the .ics files.
    #[arg(long)]
    pub dry_run: bool,

    /// Directory to write output calendars into (overrides config).
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}
