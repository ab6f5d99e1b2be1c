//! Status command - Display synchronization status
//!
//! Provides the `agrodrone status` CLI command which shows:
//! 1. Connectivity and the signed-in user
//! 2. Unsynced records per table and queued deletes
//! 3. The download watermark of every owned table

use anyhow::{Context, Result};
use clap::Args;

use agrodrone_core::ports::{IAuthSession, ILocalStore};

use crate::context::{AppContext, GlobalOptions};
use crate::output::{count_noun, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(options).await?;
        let orchestrator = ctx.orchestrator();

        let user = ctx.session.current_user().await?;
        let pending = orchestrator
            .pending_by_table()
            .await
            .context("Failed to count pending records")?;
        let queued = ctx
            .store
            .queued_items()
            .await
            .context("Failed to read the sync queue")?;
        let watermarks = orchestrator
            .watermarks()
            .await
            .context("Failed to read sync metadata")?;

        if format.is_json() {
            let pending_json: serde_json::Map<String, serde_json::Value> = pending
                .iter()
                .map(|(table, count)| (table.to_string(), (*count).into()))
                .collect();
            let watermarks_json: serde_json::Map<String, serde_json::Value> = watermarks
                .iter()
                .map(|(table, mark)| (table.to_string(), serde_json::json!(mark)))
                .collect();
            formatter.print_json(&serde_json::json!({
                "online": ctx.is_online(),
                "user_id": user.as_ref().map(|u| u.as_str()),
                "pending": pending_json,
                "queued_deletes": queued.len(),
                "last_sync": watermarks_json,
            }));
            return Ok(());
        }

        formatter.success("AgroDrone sync status");
        formatter.field(
            "Connectivity",
            if ctx.is_online() { "online" } else { "offline" },
        );
        formatter.field(
            "User",
            user.as_ref().map(|u| u.as_str()).unwrap_or("not signed in"),
        );

        let total: usize = pending.values().sum();
        if total == 0 && queued.is_empty() {
            formatter.field("Pending", "nothing to upload");
        } else {
            formatter.field("Pending", &count_noun(total as u64, "record"));
            for (table, count) in &pending {
                formatter.field(&format!("  {table}"), &count.to_string());
            }
            if !queued.is_empty() {
                formatter.field("Queued deletes", &queued.len().to_string());
                let retrying = queued.iter().filter(|item| item.retry_count > 0).count();
                if retrying > 0 {
                    formatter.warn(&format!(
                        "{} failed before and will be retried",
                        count_noun(retrying as u64, "queued delete")
                    ));
                }
            }
        }

        formatter.info("");
        formatter.info("Last download per table:");
        for (table, mark) in &watermarks {
            formatter.field(
                &format!("  {table}"),
                mark.as_deref().unwrap_or("never"),
            );
        }
        Ok(())
    }
}
