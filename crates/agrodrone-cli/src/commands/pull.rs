//! Pull command - Populate the Local Store for offline use

use anyhow::Result;
use clap::Args;

use crate::context::{AppContext, GlobalOptions};
use crate::output::{count_noun, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct PullCommand {}

impl PullCommand {
    /// Runs `initialize_offline_data` for the signed-in user
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let ctx = AppContext::open(options).await?;
        let user = ctx.require_user().await?;

        let summary = ctx.orchestrator().initialize_offline_data(&user).await?;

        let Some(summary) = summary else {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({ "downloaded": null, "online": false }));
            } else {
                formatter.warn("Device is offline; using data already stored on this device");
            }
            return Ok(());
        };

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "downloaded": summary,
                "online": true,
            }));
            return Ok(());
        }

        formatter.success(&format!(
            "Downloaded {}",
            count_noun(summary.total_rows() as u64, "row")
        ));
        for (table, rows) in &summary.tables {
            formatter.field(table.as_str(), &rows.to_string());
        }
        for error in &summary.errors {
            formatter.warn(error);
        }
        Ok(())
    }
}
