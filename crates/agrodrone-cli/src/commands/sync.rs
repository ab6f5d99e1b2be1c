//! Sync command - Run one full sync
//!
//! Provides the `agrodrone sync` CLI command which:
//! 1. Opens the Local Store and the remote gateway
//! 2. Resolves the signed-in user
//! 3. Runs `perform_full_sync` (upload, then download)
//! 4. Prints the upload tally and the rows downloaded per table

use anyhow::Result;
use clap::Args;
use tracing::info;

use agrodrone_core::domain::{SyncOutcome, SyncReport};

use crate::context::{AppContext, GlobalOptions};
use crate::output::{count_noun, format_duration_ms, get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(options).await?;
        let user = ctx.require_user().await?;

        formatter.info("Starting synchronization...");
        let outcome = ctx.orchestrator().perform_full_sync(&user).await;
        info!(outcome = ?outcome, "Sync command finished");

        if format.is_json() {
            formatter.print_json(&serde_json::to_value(&outcome)?);
            return Ok(());
        }

        match &outcome {
            SyncOutcome::Completed(report) => print_report(formatter.as_ref(), report),
            SyncOutcome::SkippedOffline => {
                formatter.warn("Device is offline; local changes stay queued until the next sync")
            }
            SyncOutcome::SkippedInProgress => formatter.warn("Another sync is already running"),
            SyncOutcome::Failed { message } => formatter.error(message),
        }
        Ok(())
    }
}

fn print_report(formatter: &dyn OutputFormatter, report: &SyncReport) {
    let duration = format_duration_ms(report.duration_ms);
    if report.uploaded.is_empty()
        && report.deleted.is_empty()
        && report.downloaded.total_rows() == 0
        && !report.has_failures()
    {
        formatter.success("Already up to date");
        return;
    }

    formatter.success(&format!("Sync completed in {duration}"));
    formatter.field(
        "Uploaded",
        &format!(
            "{} ({} failed)",
            count_noun(report.uploaded.success, "record"),
            report.uploaded.failed
        ),
    );
    if !report.deleted.is_empty() {
        formatter.field(
            "Deleted",
            &format!(
                "{} ({} failed)",
                count_noun(report.deleted.success, "record"),
                report.deleted.failed
            ),
        );
    }
    formatter.field(
        "Downloaded",
        &count_noun(report.downloaded.total_rows() as u64, "row"),
    );
    for (table, rows) in &report.downloaded.tables {
        if *rows > 0 {
            formatter.field(&format!("  {table}"), &rows.to_string());
        }
    }

    if !report.errors.is_empty() {
        formatter.warn(&format!(
            "{} occurred:",
            count_noun(report.errors.len() as u64, "error")
        ));
        for error in &report.errors {
            formatter.info(&format!("- {error}"));
        }
    }
}
