//! Config command - View and validate AgroDrone configuration
//!
//! Provides the `agrodrone config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON), secrets masked
//! 2. Validates the configuration file and reports every error
//! 3. Prints the path of the configuration file in use

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use agrodrone_core::config::Config;

use crate::context::GlobalOptions;
use crate::output::{get_formatter, OutputFormat};

const MASK: &str = "********";

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, options: &GlobalOptions, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(options, format),
            ConfigCommand::Validate => execute_validate(options, format),
            ConfigCommand::Path => execute_path(options, format),
        }
    }
}

fn execute_show(options: &GlobalOptions, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path = options.config_path();
    let config = masked(options.load_config()?);

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(options: &GlobalOptions, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path = options.config_path();

    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            let message = if config_path.exists() {
                format!("Failed to parse configuration: {e}")
            } else {
                "Configuration file not found".to_string()
            };
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "config_path": config_path.display().to_string(),
                    "errors": [message],
                }));
            } else {
                formatter.error(&message);
                formatter.info(&format!("File: {}", config_path.display()));
            }
            return Ok(());
        }
    };
    config.apply_env_overrides();

    let errors = config.validate();
    if format.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success(&format!("Configuration is valid ({})", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} problem(s) ({})",
            errors.len(),
            config_path.display()
        ));
        for error in &errors {
            formatter.info(&format!("- {error}"));
        }
    }
    Ok(())
}

fn execute_path(options: &GlobalOptions, format: OutputFormat) -> Result<()> {
    let config_path = options.config_path();
    if format.is_json() {
        get_formatter(format).print_json(&serde_json::json!({
            "config_path": config_path.display().to_string(),
            "exists": config_path.exists(),
        }));
    } else {
        println!("{}", config_path.display());
    }
    Ok(())
}

/// Replaces secrets with a fixed mask before display
fn masked(mut config: Config) -> Config {
    if config.remote.api_key.is_some() {
        config.remote.api_key = Some(MASK.to_string());
    }
    if config.remote.access_token.is_some() {
        config.remote.access_token = Some(MASK.to_string());
    }
    config
}
