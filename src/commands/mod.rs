// ABOUTME: Command implementations behind the CLI subcommands
// ABOUTME: Exports single-table and whole-database relocation commands

pub mod database;
pub mod relocate;

pub use database::{relocate_database, relocate_database_command, DatabaseReport};
pub use relocate::relocate_table;

use crate::client::MySqlClient;
use crate::config::Config;
use crate::relocation::{RelocationRequest, Scope};
use anyhow::{Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Serialize;

/// Relocation flags shared by the single-table and database commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocateOptions {
    pub scope: Scope,
    pub drop_if_exists: bool,
    pub with_constraints: bool,
    pub include_auto_increment: bool,
}

impl Default for RelocateOptions {
    fn default() -> Self {
        Self {
            scope: Scope::StructureAndData,
            drop_if_exists: false,
            with_constraints: false,
            include_auto_increment: true,
        }
    }
}

impl RelocateOptions {
    pub fn apply(&self, request: RelocationRequest) -> RelocationRequest {
        request
            .scope(self.scope)
            .drop_if_exists(self.drop_if_exists)
            .with_constraints(self.with_constraints)
            .include_auto_increment(self.include_auto_increment)
    }
}

/// How command results are shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputOptions {
    /// Print the executed SQL
    pub print_sql: bool,
    /// Print the full report as JSON instead
    pub json: bool,
    pub skip_confirmation: bool,
}

pub(crate) async fn connect(config: &Config) -> Result<MySqlClient> {
    tracing::info!("Connecting to MySQL...");
    let client = MySqlClient::connect_with_retry(
        config.url()?,
        config.connection.control_url.as_deref(),
        config.connection.connect_retries,
    )
    .await?;
    tracing::info!("✓ Connected");
    Ok(client)
}

/// Close the connections; the command's own outcome is already settled
pub(crate) async fn disconnect(client: MySqlClient) {
    if let Err(e) = client.disconnect().await {
        tracing::warn!("⚠ Failed to close the connection cleanly: {:#}", e);
    }
}

pub(crate) fn confirm(prompt: &str) -> Result<bool> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get confirmation")?;
    if !confirmed {
        tracing::warn!("⚠ User cancelled operation");
    }
    Ok(confirmed)
}

pub(crate) fn print_output<T: Serialize>(report: &T, sql_log: &str, output: &OutputOptions) -> Result<()> {
    if output.json {
        let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
        println!("{}", json);
    } else if output.print_sql && !sql_log.is_empty() {
        println!("{}", sql_log);
    }
    Ok(())
}
