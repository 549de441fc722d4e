// ABOUTME: Identifier quoting and qualified table references for generated SQL
// ABOUTME: Escapes backticks the way the MySQL server expects

use serde::Serialize;
use std::fmt;

/// Maximum length of a MySQL database or table name.
pub const MAX_NAME_LENGTH: usize = 64;

/// Quote a single identifier with backticks, doubling embedded backticks.
///
/// # Examples
///
/// ```
/// # use mysql_table_relocator::identifier::quote_identifier;
/// assert_eq!(quote_identifier("orders"), "`orders`");
/// assert_eq!(quote_identifier("odd`name"), "`odd``name`");
/// ```
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Build a fully-qualified `` `db`.`table` `` reference.
///
/// Always starts from the raw names, so using the result several times in one
/// statement never doubles the quoting.
///
/// # Examples
///
/// ```
/// # use mysql_table_relocator::identifier::qualify;
/// assert_eq!(qualify("shop", "orders"), "`shop`.`orders`");
/// ```
pub fn qualify(database: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(database), quote_identifier(table))
}

/// A database/table pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TableRef {
    pub database: String,
    pub table: String,
}

impl TableRef {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Parse a `database.table` argument, splitting on the first dot.
    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value.split_once('.') {
            Some((database, table)) if !database.is_empty() && !table.is_empty() => {
                Ok(Self::new(database, table))
            }
            _ => anyhow::bail!(
                "Invalid table reference '{}'. Expected format: database.table",
                value
            ),
        }
    }

    pub fn qualified(&self) -> String {
        qualify(&self.database, &self.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.qualified())
    }
}

/// Check that a table name can be created by the server.
///
/// Rejects empty names, trailing whitespace, names over 64 characters and
/// names containing `.`, `/` or `\`.
pub fn validate_table_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Table name cannot be empty".to_string());
    }
    if name != name.trim_end() {
        return Err(format!("Table name '{}' ends with whitespace", name));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(format!(
            "Table name '{}' exceeds {} characters",
            name, MAX_NAME_LENGTH
        ));
    }
    if name.contains(['.', '/', '\\']) {
        return Err(format!("Invalid table name: {}", name));
    }
    Ok(())
}
