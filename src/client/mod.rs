// ABOUTME: Database client abstraction used by the relocation engine
// ABOUTME: Defines connection roles, result rows, and the async client trait

pub mod introspect;
pub mod mysql;

#[cfg(test)]
pub(crate) mod testing;

pub use mysql::MySqlClient;

use anyhow::Result;
use async_trait::async_trait;
use mysql_async::Params;

/// Which logical connection a statement runs on.
///
/// Catalog bookkeeping runs as the control user, everything else as the
/// regular user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    User,
    Control,
}

/// One result row with its column names, values rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<Option<String>>) -> Self {
        Self { columns, values }
    }

    /// Build a row from column/value pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Self {
        let (columns, values): (Vec<String>, Vec<Option<String>>) = pairs
            .into_iter()
            .map(|(column, value)| (column.to_string(), value.map(str::to_string)))
            .unzip();
        Self { columns, values }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|value| value.as_deref())
    }

    pub fn get_by_name(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|index| self.get(index))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<String>> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
}

/// Low-level database access consumed by the engine.
///
/// Errors from `execute_with` and `query_with` must carry the server's
/// message unmodified; the engine surfaces them verbatim. Values reach the
/// server through `params` bound to `?` placeholders, never spliced into the
/// statement text.
#[async_trait]
pub trait DatabaseClient: Send {
    /// Switch the user connection's default database
    async fn select_database(&mut self, name: &str) -> Result<()>;

    async fn execute_with(
        &mut self,
        role: ConnectionRole,
        sql: &str,
        params: Params,
    ) -> Result<ExecOutcome>;

    /// Run a query and buffer every row before returning
    async fn query_with(&mut self, role: ConnectionRole, sql: &str, params: Params)
        -> Result<Vec<Row>>;

    async fn execute_as(&mut self, role: ConnectionRole, sql: &str) -> Result<ExecOutcome> {
        self.execute_with(role, sql, Params::Empty).await
    }

    async fn query_as(&mut self, role: ConnectionRole, sql: &str) -> Result<Vec<Row>> {
        self.query_with(role, sql, Params::Empty).await
    }

    async fn execute(&mut self, sql: &str) -> Result<ExecOutcome> {
        self.execute_as(ConnectionRole::User, sql).await
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.query_as(ConnectionRole::User, sql).await
    }

    /// First column of the first row, `None` when there is no row or it is NULL
    async fn fetch_value_with(&mut self, sql: &str, params: Params) -> Result<Option<String>> {
        let rows = self.query_with(ConnectionRole::User, sql, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().into_iter().next().flatten()))
    }

    async fn fetch_value(&mut self, sql: &str) -> Result<Option<String>> {
        self.fetch_value_with(sql, Params::Empty).await
    }

    async fn list_databases(&mut self) -> Result<Vec<String>> {
        let rows = self.query("SHOW DATABASES").await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(0).map(str::to_string))
            .collect())
    }
}

/// Render `sql` with positional `params` substituted, for logs and test doubles.
///
/// Never send the result to a server.
pub fn interpolate(sql: &str, params: &Params) -> String {
    let values = match params {
        Params::Positional(values) => values,
        _ => return sql.to_string(),
    };
    let mut values = values.iter();
    let mut rendered = String::with_capacity(sql.len());
    for ch in sql.chars() {
        if ch == '?' {
            if let Some(value) = values.next() {
                rendered.push_str(&value.as_sql(false));
                continue;
            }
        }
        rendered.push(ch);
    }
    rendered
}
