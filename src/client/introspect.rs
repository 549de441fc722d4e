// ABOUTME: Schema introspection queries used while planning a relocation
// ABOUTME: Discovers databases, object kinds, writable columns and the session SQL mode

use super::{ConnectionRole, DatabaseClient};
use crate::identifier::TableRef;
use crate::sql::ObjectKind;
use anyhow::{Context, Result};
use mysql_async::Params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub kind: ObjectKind,
}

/// Names of every database visible to the user connection
pub async fn list_databases(client: &mut dyn DatabaseClient) -> Result<Vec<String>> {
    client
        .list_databases()
        .await
        .context("Failed to list databases")
}

/// Tables and views of one database, base tables first so views can resolve them
pub async fn list_tables(client: &mut dyn DatabaseClient, database: &str) -> Result<Vec<TableInfo>> {
    let rows = client
        .query_with(
            ConnectionRole::User,
            "SELECT TABLE_NAME, TABLE_TYPE FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? \
             ORDER BY TABLE_TYPE = 'VIEW', TABLE_NAME",
            Params::from(vec![database]),
        )
        .await
        .with_context(|| format!("Failed to list tables of database '{}'", database))?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            Some(TableInfo {
                name: row.get(0)?.to_string(),
                kind: kind_from_table_type(row.get(1).unwrap_or("BASE TABLE")),
            })
        })
        .collect())
}

/// Kind of the object at `table`, `None` when it does not exist
pub async fn object_kind(
    client: &mut dyn DatabaseClient,
    table: &TableRef,
) -> Result<Option<ObjectKind>> {
    let table_type = client
        .fetch_value_with(
            "SELECT TABLE_TYPE FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?",
            table_params(table),
        )
        .await
        .with_context(|| format!("Failed to look up {}", table))?;

    Ok(table_type.as_deref().map(kind_from_table_type))
}

/// Columns that accept explicit values, in table order.
///
/// Generated columns are excluded because the server rejects writes to them.
pub async fn non_generated_columns(
    client: &mut dyn DatabaseClient,
    table: &TableRef,
) -> Result<Vec<String>> {
    let rows = client
        .query_with(
            ConnectionRole::User,
            "SELECT COLUMN_NAME FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
             AND EXTRA NOT LIKE '%VIRTUAL GENERATED%' \
             AND EXTRA NOT LIKE '%STORED GENERATED%' \
             AND EXTRA NOT LIKE '%PERSISTENT%' \
             ORDER BY ORDINAL_POSITION",
            table_params(table),
        )
        .await
        .with_context(|| format!("Failed to get columns for {}", table))?;

    Ok(rows
        .iter()
        .filter_map(|row| row.get(0).map(str::to_string))
        .collect())
}

/// The session's active `sql_mode`
pub async fn session_sql_mode(client: &mut dyn DatabaseClient) -> Result<String> {
    let mode = client
        .fetch_value("SELECT @@SESSION.sql_mode")
        .await
        .context("Failed to query sql_mode")?;
    Ok(mode.unwrap_or_default())
}

fn table_params(table: &TableRef) -> Params {
    Params::from(vec![table.database.as_str(), table.table.as_str()])
}

fn kind_from_table_type(table_type: &str) -> ObjectKind {
    if table_type.eq_ignore_ascii_case("VIEW") || table_type.eq_ignore_ascii_case("SYSTEM VIEW") {
        ObjectKind::View
    } else {
        ObjectKind::Table
    }
}
