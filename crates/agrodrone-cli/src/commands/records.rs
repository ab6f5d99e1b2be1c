//! Record commands - Read and edit one table through the offline-aware
//! collection
//!
//! `list`, `put` and `delete` behave exactly as the app's screens do: online
//! they go to the backend first and mirror into the Local Store; offline
//! they work on local data and leave changes for the next sync.

use anyhow::{Context, Result};
use clap::Args;

use agrodrone_core::domain::{Record, RecordId, TableName};
use agrodrone_sync::SyncError;

use crate::context::{parse_table, AppContext, GlobalOptions};
use crate::output::{count_noun, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ListCommand {
    /// Table name, e.g. "products" or "recipe_products"
    pub table: String,

    /// Only show records not yet uploaded
    #[arg(long)]
    pub unsynced: bool,
}

impl ListCommand {
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let table = parse_table(&self.table)?;
        let ctx = AppContext::open(options).await?;
        ctx.require_user().await?;

        let snapshot = ctx.collection(table).refresh().await;
        let records: Vec<&Record> = snapshot
            .records
            .iter()
            .filter(|r| !self.unsynced || !r.is_synced())
            .collect();

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "table": table,
                "online": ctx.is_online(),
                "records": records,
                "error": snapshot.error,
            }));
            return Ok(());
        }

        if let Some(error) = &snapshot.error {
            formatter.warn(&format!("Backend unavailable, showing local data ({error})"));
        }
        formatter.success(&format!(
            "{}: {}",
            table,
            count_noun(records.len() as u64, "record")
        ));
        for record in records {
            let marker = if record.is_synced() { " " } else { "*" };
            formatter.info(&format!(
                "{marker} {:<38} {}",
                record.get_str("id").unwrap_or("-"),
                record.updated_at().unwrap_or("-"),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct PutCommand {
    /// Table name
    pub table: String,

    /// Record as a JSON object; include "id" to update an existing record
    pub data: String,
}

impl PutCommand {
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let table = parse_table(&self.table)?;
        let record = parse_record(&self.data)?;
        let ctx = AppContext::open(options).await?;

        let stored = ctx
            .collection(table)
            .upsert(record)
            .await?
            .ok_or(SyncError::NotAuthenticated)?;

        if format.is_json() {
            // Online saves only return once the backend confirmed them
            formatter.print_json(&saved_json(table, &stored, ctx.is_online()));
        } else {
            formatter.success(&format!(
                "Saved {}/{}",
                table,
                stored.get_str("id").unwrap_or("-")
            ));
            if !ctx.is_online() {
                formatter.info("Stored locally; it will be uploaded on the next sync");
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct DeleteCommand {
    /// Table name
    pub table: String,

    /// Id of the record to delete
    pub id: String,
}

impl DeleteCommand {
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let table = parse_table(&self.table)?;
        let id = RecordId::new(self.id.as_str())?;
        let ctx = AppContext::open(options).await?;
        ctx.require_user().await?;

        ctx.collection(table).delete(&id).await?;

        let propagated = ctx.is_online() || ctx.config.sync.queue_offline_deletes;
        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "table": table,
                "id": id.as_str(),
                "deleted": true,
                "remote": ctx.is_online(),
                "queued": !ctx.is_online() && ctx.config.sync.queue_offline_deletes,
            }));
        } else {
            formatter.success(&format!("Deleted {table}/{id}"));
            if !propagated {
                formatter.warn(
                    "Deleted locally only; the backend copy will return on the next download",
                );
            } else if !ctx.is_online() {
                formatter.info("Delete queued for the next sync");
            }
        }
        Ok(())
    }
}

fn saved_json(table: TableName, stored: &Record, confirmed: bool) -> serde_json::Value {
    serde_json::json!({
        "table": table,
        "record": stored,
        "synced": confirmed,
    })
}

fn parse_record(data: &str) -> Result<Record> {
    let value: serde_json::Value =
        serde_json::from_str(data).context("Record data is not valid JSON")?;
    Ok(Record::from_value(value)?)
}
