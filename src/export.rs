// ABOUTME: Structure export service rendering a table or view definition as SQL
// ABOUTME: Splits foreign keys, secondary indexes and the AUTO_INCREMENT counter into separate statements

use crate::client::DatabaseClient;
use crate::identifier::{qualify, TableRef};
use crate::sql::{self, Dialect, Keyword, ObjectName, SqlError, Statement};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlparser::ast::{AlterTableOperation, ColumnDef, ColumnOption, TableConstraint};
use sqlparser::tokenizer::{Token, TokenWithSpan};

/// A rendered object definition plus the statements that must follow it.
///
/// Empty strings mean there is nothing pending for that phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportedStructure {
    /// The CREATE TABLE / CREATE VIEW statement
    pub definition: String,
    /// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY ...`
    pub constraints: String,
    /// `ALTER TABLE ... ADD KEY ...` and CHECK constraints
    pub indexes: String,
    /// `ALTER TABLE ... AUTO_INCREMENT=n`
    pub auto_increment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Emit the table's AUTO_INCREMENT counter
    pub include_auto_increment: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_auto_increment: true,
        }
    }
}

/// Renders the definition of an existing object.
#[async_trait]
pub trait StructureExporter: Send + Sync {
    async fn export(
        &self,
        client: &mut dyn DatabaseClient,
        database: &str,
        table: &str,
        is_view: bool,
        dialect: Dialect,
    ) -> Result<ExportedStructure>;
}

/// Exporter built on `SHOW CREATE TABLE` / `SHOW CREATE VIEW`.
#[derive(Debug, Clone, Default)]
pub struct ShowCreateExporter {
    options: ExportOptions,
}

impl ShowCreateExporter {
    pub fn new(options: ExportOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl StructureExporter for ShowCreateExporter {
    async fn export(
        &self,
        client: &mut dyn DatabaseClient,
        database: &str,
        table: &str,
        is_view: bool,
        dialect: Dialect,
    ) -> Result<ExportedStructure> {
        let qualified = qualify(database, table);
        let kind = if is_view { "VIEW" } else { "TABLE" };
        let rows = client
            .query(&format!("SHOW CREATE {} {}", kind, qualified))
            .await
            .with_context(|| format!("Failed to export structure of {}", qualified))?;

        let definition = rows
            .first()
            .and_then(|row| row.get(1))
            .map(str::to_string)
            .with_context(|| format!("SHOW CREATE {} returned no definition for {}", kind, qualified))?;

        tracing::debug!("Exported {} {}", kind.to_lowercase(), qualified);

        if is_view {
            return Ok(ExportedStructure {
                definition,
                ..ExportedStructure::default()
            });
        }

        split_table_definition(&definition, &TableRef::new(database, table), dialect, self.options)
            .with_context(|| format!("Failed to split definition of {}", qualified))
    }
}

/// Split a `SHOW CREATE TABLE` result into its create statement and the
/// follow-up ALTER statements addressed to `table`.
///
/// Secondary indexes stay inline when the table has an AUTO_INCREMENT column
/// but no primary key, because the server requires that column to be indexed
/// at creation time. Anything other than a single CREATE TABLE comes back as
/// the definition with nothing pending.
pub fn split_table_definition(
    create_sql: &str,
    table: &TableRef,
    dialect: Dialect,
    options: ExportOptions,
) -> Result<ExportedStructure, SqlError> {
    let (create_sql, counter) = take_auto_increment_option(create_sql, dialect)?;
    let mut statements = sql::parse(&create_sql, dialect)?;
    let mut create = match (statements.pop(), statements.is_empty()) {
        (Some(Statement::CreateTable(create)), true) => create,
        _ => {
            return Ok(ExportedStructure {
                definition: create_sql.trim().to_string(),
                ..ExportedStructure::default()
            })
        }
    };

    let has_primary_key = create
        .constraints
        .iter()
        .any(|c| matches!(c, TableConstraint::PrimaryKey { .. }))
        || create.columns.iter().any(|column| {
            column
                .options
                .iter()
                .any(|o| matches!(o.option, ColumnOption::Unique { is_primary: true, .. }))
        });
    let has_auto_increment_column = create.columns.iter().any(is_auto_increment);
    let split_indexes = has_primary_key || !has_auto_increment_column;

    let mut kept = Vec::new();
    let mut foreign_keys = Vec::new();
    let mut indexes = Vec::new();
    for constraint in std::mem::take(&mut create.constraints) {
        match constraint {
            fk @ TableConstraint::ForeignKey { .. } => {
                foreign_keys.push(AlterTableOperation::AddConstraint(fk))
            }
            pk @ TableConstraint::PrimaryKey { .. } => kept.push(pk),
            index if split_indexes => indexes.push(AlterTableOperation::AddConstraint(index)),
            index => kept.push(index),
        }
    }
    create.constraints = kept;

    let name = sql::object_name(table);
    Ok(ExportedStructure {
        definition: Statement::CreateTable(create).to_string(),
        constraints: alter_statement(&name, foreign_keys),
        indexes: alter_statement(&name, indexes),
        auto_increment: match counter {
            Some(counter) if options.include_auto_increment => {
                format!("ALTER TABLE {} AUTO_INCREMENT={}", name, counter)
            }
            _ => String::new(),
        },
    })
}

fn alter_statement(table: &ObjectName, operations: Vec<AlterTableOperation>) -> String {
    if operations.is_empty() {
        return String::new();
    }
    Statement::AlterTable {
        name: table.clone(),
        if_exists: false,
        only: false,
        operations,
        location: None,
        on_cluster: None,
    }
    .to_string()
}

fn is_auto_increment(column: &ColumnDef) -> bool {
    column.options.iter().any(|o| match &o.option {
        ColumnOption::DialectSpecific(tokens) => tokens
            .iter()
            .any(|t| matches!(t, Token::Word(word) if word.keyword == Keyword::AUTO_INCREMENT)),
        _ => false,
    })
}

/// Remove the `AUTO_INCREMENT=n` table option, returning the rest and `n`.
///
/// Done on tokens because counters can outgrow what the parser accepts.
fn take_auto_increment_option(
    create_sql: &str,
    dialect: Dialect,
) -> Result<(String, Option<String>), SqlError> {
    let tokens = sql::tokenize(create_sql, dialect)?;
    let significant: Vec<&TokenWithSpan> = tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_)))
        .collect();

    for window in significant.windows(3) {
        let (key, value) = match (&window[0].token, &window[1].token, &window[2].token) {
            (Token::Word(word), Token::Eq, Token::Number(value, _))
                if word.keyword == Keyword::AUTO_INCREMENT =>
            {
                (window[0], value)
            }
            _ => continue,
        };
        let start = sql::byte_offset(create_sql, key.span.start);
        let end = sql::byte_offset(create_sql, window[2].span.end);
        let head = create_sql[..start].trim_end();
        let rest = format!("{} {}", head, create_sql[end..].trim_start());
        return Ok((rest.trim_end().to_string(), Some(value.clone())));
    }

    Ok((create_sql.to_string(), None))
}
