// ABOUTME: Relocates every table of a database as one batch
// ABOUTME: Builds all members first, then applies the foreign keys they deferred

use super::{confirm, connect, disconnect, print_output, OutputOptions, RelocateOptions};
use crate::catalog::CatalogConfig;
use crate::client::introspect;
use crate::client::DatabaseClient;
use crate::config::Config;
use crate::export::{ExportOptions, ShowCreateExporter, StructureExporter};
use crate::identifier::TableRef;
use crate::relocation::{check_databases_exist, Mode, RelocationReport, RelocationRequest, Relocator};
use crate::sql::ObjectKind;
use crate::utils::sanitize_identifier;
use anyhow::{bail, Context, Result};
use serde::Serialize;

/// Result of relocating a whole database.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseReport {
    pub success: bool,
    pub message: String,
    /// One report per relocated table, in relocation order
    pub tables: Vec<RelocationReport>,
    /// Foreign keys executed after every member existed
    pub constraints: Vec<String>,
}

impl DatabaseReport {
    /// Every member's statements followed by the deferred foreign keys
    pub fn sql_log(&self) -> String {
        let mut parts: Vec<String> = self
            .tables
            .iter()
            .map(|table| table.sql_log.clone())
            .filter(|log| !log.is_empty())
            .collect();
        parts.extend(self.constraints.iter().map(|sql| format!("{};", sql)));
        parts.join("\n")
    }
}

/// Move or copy every table and view of `source_db` into `target_db`.
///
/// Base tables are relocated before views so a view's dependencies exist when
/// it is created. Each member runs in [`Mode::WholeDatabaseMember`] mode and
/// hands back its foreign keys, which run only once all members exist.
/// Foreign key checks are disabled for the session while members are built
/// and dropped, and restored afterwards even when a member fails.
///
/// # Errors
///
/// Fails on the first statement the server rejects. Members relocated before
/// the failure stay where they are.
pub async fn relocate_database(
    client: &mut dyn DatabaseClient,
    exporter: &dyn StructureExporter,
    catalog: &CatalogConfig,
    source_db: &str,
    target_db: &str,
    is_move: bool,
    options: &RelocateOptions,
) -> Result<DatabaseReport> {
    if source_db == target_db {
        bail!(
            "Source and target database are both '{}'",
            sanitize_identifier(source_db)
        );
    }

    if let Some(message) = check_databases_exist(client, source_db, target_db).await? {
        return Ok(DatabaseReport {
            success: false,
            message,
            ..DatabaseReport::default()
        });
    }

    client
        .execute("SET FOREIGN_KEY_CHECKS = 0")
        .await
        .context("Failed to disable foreign key checks")?;

    let result = relocate_members(client, exporter, catalog, source_db, target_db, is_move, options).await;

    let restored = client.execute("SET FOREIGN_KEY_CHECKS = 1").await;
    let report = result?;
    restored.context("Failed to re-enable foreign key checks")?;
    Ok(report)
}

async fn relocate_members(
    client: &mut dyn DatabaseClient,
    exporter: &dyn StructureExporter,
    catalog: &CatalogConfig,
    source_db: &str,
    target_db: &str,
    is_move: bool,
    options: &RelocateOptions,
) -> Result<DatabaseReport> {
    let tables = introspect::list_tables(client, source_db).await?;
    if tables.is_empty() {
        tracing::warn!("⚠ Database '{}' has no tables", sanitize_identifier(source_db));
    }

    let mut report = DatabaseReport {
        success: true,
        ..DatabaseReport::default()
    };
    let mut deferred = Vec::new();

    for (idx, table) in tables.iter().enumerate() {
        tracing::info!(
            "Relocating {} {}/{}: '{}'",
            if table.kind == ObjectKind::View { "view" } else { "table" },
            idx + 1,
            tables.len(),
            sanitize_identifier(&table.name)
        );

        let source = TableRef::new(source_db, &table.name);
        let target = TableRef::new(target_db, &table.name);
        let request = options
            .apply(if is_move {
                RelocationRequest::moving(source, target)
            } else {
                RelocationRequest::copying(source, target)
            })
            .mode(Mode::WholeDatabaseMember)
            .with_constraints(true);

        let member = Relocator::new(&mut *client, exporter, catalog)
            .relocate(&request)
            .await?;
        if !member.success {
            bail!("{}", member.message);
        }
        deferred.extend(member.deferred_constraints.iter().cloned());
        report.tables.push(member);
    }

    if !deferred.is_empty() {
        tracing::info!("Applying {} deferred foreign key statement(s)...", deferred.len());
        // Unqualified REFERENCES resolve against the default database, which
        // a move leaves pointing at the source
        client
            .select_database(target_db)
            .await
            .with_context(|| format!("Failed to select database '{}'", sanitize_identifier(target_db)))?;
    }
    for statement in deferred {
        client
            .execute(&statement)
            .await
            .with_context(|| format!("Failed to apply deferred constraint: {}", statement))?;
        report.constraints.push(statement);
    }

    report.message = format!(
        "Database `{}` has been {} to `{}`.",
        source_db,
        if is_move { "moved" } else { "copied" },
        target_db
    );
    tracing::info!("✓ {}", report.message);
    Ok(report)
}

/// CLI entry point for `move-database` / `copy-database`
pub async fn relocate_database_command(
    config: &Config,
    source_db: &str,
    target_db: &str,
    is_move: bool,
    options: &RelocateOptions,
    output: &OutputOptions,
) -> Result<()> {
    if is_move
        && !output.skip_confirmation
        && !confirm(&format!(
            "Move every table of `{}` to `{}`? The source tables will be dropped.",
            source_db, target_db
        ))?
    {
        bail!("Move cancelled by user");
    }

    let mut client = connect(config).await?;
    let exporter = ShowCreateExporter::new(ExportOptions {
        include_auto_increment: options.include_auto_increment,
    });

    let result = relocate_database(
        &mut client,
        &exporter,
        &config.catalog,
        source_db,
        target_db,
        is_move,
        options,
    )
    .await;
    let outcome = conclude(result, output);
    disconnect(client).await;
    outcome
}

fn conclude(result: Result<DatabaseReport>, output: &OutputOptions) -> Result<()> {
    let report = result?;
    if !report.success {
        bail!("{}", report.message);
    }
    print_output(&report, &report.sql_log(), output)
}
