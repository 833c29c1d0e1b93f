//! Implementation of the main split run.
//!
//! Fetches the upstream feed, parses it, runs the split pipeline, prints the
//! report and writes one calendar file per configured course unless running
//! dry. A filter rule violation aborts the run before any file is touched.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use serde::Serialize;

use tps_core::{
    CompiledConfig, ConflictReport, FilterRuleStats, ReportRecord, SplitOutcome, SplitSummary,
    split_events, summarize,
};

use crate::cli::Cli;
use crate::config::AppConfig;
use crate::render;

/// JSON payload for `--json` output.
#[derive(Serialize)]
struct JsonReport<'a> {
    summary: &'a SplitSummary,
    report: &'a [ReportRecord],
    filter_stats: &'a [FilterRuleStats],
    conflicts: &'a ConflictReport,
}

/// Run the splitter end to end.
pub fn run(cli: &Cli) -> Result<()> {
    let mut config =
        AppConfig::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    if cli.dry_run {
        config.dry_run = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir.clone_from(dir);
    }
    tracing::debug!(?config, "loaded configuration");

    let compiled = config
        .split
        .compile()
        .context("invalid split configuration")?;
    if config.ics_url.is_empty() {
        bail!("no feed URL configured; set ics_url in the config file or TPSPLIT_ICS_URL");
    }

    let text = fetch_feed(&config.ics_url)?;
    let events = tps_ics::parse_calendar(&text, compiled.timezone)
        .context("failed to parse the upstream calendar")?;
    tracing::info!(events = events.len(), "parsed upstream calendar");

    let outcome = split_events(&compiled, &events)
        .context("filter rule violation, nothing was written")?;
    let summary = summarize(&outcome);

    if cli.json {
        let payload = JsonReport {
            summary: &summary,
            report: &outcome.report,
            filter_stats: &outcome.filter_stats,
            conflicts: &outcome.conflicts,
        };
        let rendered =
            serde_json::to_string_pretty(&payload).context("failed to serialize report")?;
        println!("{rendered}");
    } else {
        print!(
            "{}",
            render::render_report(
                &outcome,
                &summary,
                &config.split.local_timezone,
                config.dry_run,
                compiled.conflict_detector_enabled,
                compiled.conflicts_show_max,
                config.pretty_summary,
            )
        );
    }

    if config.dry_run {
        tracing::info!("dry run, skipping file output");
        return Ok(());
    }
    write_calendars(&compiled, &outcome, &config.output_dir)
}

/// Fetch the feed over HTTP, driving the async client to completion.
fn fetch_feed(url: &str) -> Result<String> {
    let client = tps_feed::Client::new().context("failed to create feed client")?;
    let runtime =
        tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
    runtime
        .block_on(client.fetch(url))
        .context("failed to fetch the calendar feed")
}

/// Write one calendar file per configured course into `output_dir`.
///
/// Courses with zero retained events still get a file, so subscribed clients
/// see an empty calendar instead of a stale one.
pub fn write_calendars(
    compiled: &CompiledConfig,
    outcome: &SplitOutcome,
    output_dir: &Path,
) -> Result<()> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory {}", output_dir.display())
    })?;

    let generated_at = Utc::now();
    for course in &compiled.courses {
        let events = outcome
            .calendars
            .get(&course.short)
            .map_or(&[][..], Vec::as_slice);
        let path = output_dir.join(&course.file);
        let contents = tps_ics::write_calendar(events, generated_at);
        fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            events = events.len(),
            "wrote calendar"
        );
    }
    Ok(())
}
