// ABOUTME: Moves catalog rows from a table's old identifiers to its new ones
// ABOUTME: Keeps comments, relations and UI state attached to a table after a move or rename

use super::{CatalogConfig, CatalogFeature, CatalogTable};
use crate::client::{ConnectionRole, DatabaseClient};
use crate::identifier::{quote_identifier, TableRef};
use anyhow::{Context, Result};
use mysql_async::Params;

/// Point every catalog row of `source` at `target`.
///
/// Designer coordinates only survive a rename inside one database; moving to
/// another database deletes them.
pub async fn rename_table_entry(
    client: &mut dyn DatabaseClient,
    catalog: &CatalogConfig,
    source: &TableRef,
    target: &TableRef,
) -> Result<()> {
    if let Some(table) = catalog.table_for(CatalogFeature::ColumnComments) {
        rename_single(client, table, source, target, "db_name", "table_name").await?;
    }

    if let Some(table) = catalog.table_for(CatalogFeature::Display) {
        rename_single(client, table, source, target, "db_name", "table_name").await?;
    }

    if let Some(table) = catalog.table_for(CatalogFeature::Relations) {
        rename_single(client, table, source, target, "foreign_db", "foreign_table").await?;
        rename_single(client, table, source, target, "master_db", "master_table").await?;
    }

    if let Some(table) = catalog.table_for(CatalogFeature::PdfCoordinates) {
        if source.database == target.database {
            rename_single(client, table, source, target, "db_name", "table_name").await?;
        } else {
            let delete = format!(
                "DELETE FROM {} WHERE `db_name` = ? AND `table_name` = ?",
                table.qualified()
            );
            run(client, table, &delete, key_params(&[source])).await?;
        }
    }

    if let Some(table) = catalog.table_for(CatalogFeature::UiPreferences) {
        rename_single(client, table, source, target, "db_name", "table_name").await?;
    }

    if let Some(table) = catalog.table_for(CatalogFeature::NavigationHiding) {
        // Items hidden inside the table
        rename_single(client, table, source, target, "db_name", "table_name").await?;

        // The table itself when it is hidden
        let update = format!(
            "UPDATE {} SET `db_name` = ?, `item_name` = ? \
             WHERE `db_name` = ? AND `item_name` = ? AND `item_type` = 'table'",
            table.qualified()
        );
        run(client, table, &update, key_params(&[target, source])).await?;
    }

    tracing::debug!("Catalog entries of {} now point at {}", source, target);
    Ok(())
}

async fn rename_single(
    client: &mut dyn DatabaseClient,
    table: CatalogTable<'_>,
    source: &TableRef,
    target: &TableRef,
    db_field: &str,
    table_field: &str,
) -> Result<()> {
    let db_field = quote_identifier(db_field);
    let table_field = quote_identifier(table_field);
    let update = format!(
        "UPDATE {} SET {db} = ?, {tbl} = ? WHERE {db} = ? AND {tbl} = ?",
        table.qualified(),
        db = db_field,
        tbl = table_field
    );
    run(client, table, &update, key_params(&[target, source])).await
}

/// Database and table name of each reference, in order
fn key_params(tables: &[&TableRef]) -> Params {
    Params::from(
        tables
            .iter()
            .flat_map(|table| [table.database.as_str(), table.table.as_str()])
            .collect::<Vec<_>>(),
    )
}

async fn run(
    client: &mut dyn DatabaseClient,
    table: CatalogTable<'_>,
    sql: &str,
    params: Params,
) -> Result<()> {
    client
        .execute_with(ConnectionRole::Control, sql, params)
        .await
        .with_context(|| format!("Failed to update catalog table {}", table.qualified()))?;
    Ok(())
}
