//! Timetable calendar splitter CLI library.
//!
//! This crate wires the split pipeline to a command line: configuration
//! loading, feed fetching, report rendering and file output.

mod cli;
pub mod commands;
mod config;
pub mod render;

pub use cli::Cli;
pub use config::AppConfig;
