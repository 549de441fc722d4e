// ABOUTME: Verifies that the source and target databases exist before anything runs
// ABOUTME: Produces the user-facing message naming the missing database

use crate::client::introspect;
use crate::client::DatabaseClient;
use anyhow::Result;

/// Message naming the first missing database, source checked first.
///
/// Returns `Ok(None)` when both databases exist.
pub async fn check_databases_exist(
    client: &mut dyn DatabaseClient,
    source_db: &str,
    target_db: &str,
) -> Result<Option<String>> {
    let databases = introspect::list_databases(client).await?;
    let exists = |name: &str| databases.iter().any(|db| db == name);

    if !exists(source_db) {
        return Ok(Some(format!("Source database `{}` was not found!", source_db)));
    }
    if !exists(target_db) {
        return Ok(Some(format!("Target database `{}` was not found!", target_db)));
    }
    Ok(None)
}
