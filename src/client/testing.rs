// ABOUTME: Scripted in-memory client for unit tests
// ABOUTME: Records every statement with its bound values and answers queries by substring match

use super::{interpolate, ConnectionRole, DatabaseClient, ExecOutcome, Row};
use anyhow::Result;
use async_trait::async_trait;
use mysql_async::Params;

#[derive(Debug, Default)]
pub(crate) struct ScriptedClient {
    responses: Vec<(String, Vec<Row>)>,
    failures: Vec<String>,
    pub executed: Vec<(ConnectionRole, String)>,
    pub queried: Vec<(ConnectionRole, String)>,
    pub selected: Vec<String>,
    /// Default database in effect when each executed statement ran
    pub executed_in: Vec<Option<String>>,
    /// Parameterised statements and queries as sent, with their bound values
    pub bound: Vec<(String, Params)>,
    next_insert_id: u64,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            next_insert_id: 1,
            ..Self::default()
        }
    }

    /// Answer any query containing `pattern` with `rows`
    pub fn respond(mut self, pattern: &str, rows: Vec<Row>) -> Self {
        self.responses.push((pattern.to_string(), rows));
        self
    }

    /// Fail any statement or query containing `pattern`
    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|(_, sql)| sql.as_str()).collect()
    }

    fn record_params(&mut self, sql: &str, params: Params) -> String {
        let rendered = interpolate(sql, &params);
        if params != Params::Empty {
            self.bound.push((sql.to_string(), params));
        }
        rendered
    }
}

#[async_trait]
impl DatabaseClient for ScriptedClient {
    async fn select_database(&mut self, name: &str) -> Result<()> {
        self.selected.push(name.to_string());
        Ok(())
    }

    async fn execute_with(
        &mut self,
        role: ConnectionRole,
        sql: &str,
        params: Params,
    ) -> Result<ExecOutcome> {
        let sql = self.record_params(sql, params);
        if let Some(pattern) = self.failures.iter().find(|p| sql.contains(p.as_str())) {
            anyhow::bail!("scripted failure on '{}'", pattern);
        }
        self.executed.push((role, sql));
        self.executed_in.push(self.selected.last().cloned());
        let id = self.next_insert_id;
        self.next_insert_id += 1;
        Ok(ExecOutcome {
            affected_rows: 1,
            last_insert_id: Some(id),
        })
    }

    async fn query_with(
        &mut self,
        role: ConnectionRole,
        sql: &str,
        params: Params,
    ) -> Result<Vec<Row>> {
        let sql = self.record_params(sql, params);
        if let Some(pattern) = self.failures.iter().find(|p| sql.contains(p.as_str())) {
            anyhow::bail!("scripted failure on '{}'", pattern);
        }
        let rows = self
            .responses
            .iter()
            .find(|(pattern, _)| sql.contains(pattern.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default();
        self.queried.push((role, sql));
        Ok(rows)
    }
}
