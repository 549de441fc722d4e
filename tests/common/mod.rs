// ABOUTME: In-memory MySQL stand-in for relocation integration tests
// ABOUTME: Interprets the DDL, DML and catalog statements the relocator issues

#![allow(dead_code)]

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use mysql_async::Params;
use mysql_table_relocator::client::{interpolate, ConnectionRole, DatabaseClient, ExecOutcome, Row};
use mysql_table_relocator::sql::ObjectKind;
use sqlparser::dialect::MySqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::collections::BTreeMap;

pub const CATALOG_DB: &str = "phpmyadmin";

pub type CatalogRow = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone)]
pub struct FakeObject {
    pub kind: ObjectKind,
    pub create_sql: String,
    pub columns: Vec<FakeColumn>,
    pub rows: Vec<BTreeMap<String, String>>,
    pub alterations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeColumn {
    pub name: String,
    pub generated: bool,
}

#[derive(Debug, Default)]
pub struct FakeServer {
    pub databases: BTreeMap<String, BTreeMap<String, FakeObject>>,
    pub catalog: BTreeMap<String, Vec<CatalogRow>>,
    pub native_rename: bool,
    pub sql_mode: String,
    pub executed: Vec<(ConnectionRole, String)>,
    pub selected: Vec<String>,
    /// Default database in effect when each executed statement ran
    pub executed_in: Vec<Option<String>>,
    failures: Vec<String>,
    next_insert_id: u64,
}

impl FakeServer {
    pub fn new(databases: &[&str]) -> Self {
        let mut server = Self {
            next_insert_id: 1,
            ..Self::default()
        };
        for db in databases {
            server.databases.insert(db.to_string(), BTreeMap::new());
        }
        server.databases.insert(CATALOG_DB.to_string(), BTreeMap::new());
        server
    }

    pub fn with_native_rename(mut self) -> Self {
        self.native_rename = true;
        self
    }

    /// Add a table from `SHOW CREATE TABLE` text plus its rows
    pub fn with_table(mut self, database: &str, create_sql: &str, rows: &[&[(&str, &str)]]) -> Self {
        let (name, object) = object_from_create(ObjectKind::Table, create_sql).expect("valid CREATE TABLE");
        let object = FakeObject {
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(column, value)| (column.to_string(), value.to_string()))
                        .collect()
                })
                .collect(),
            ..object
        };
        self.insert_object(database, name, object);
        self
    }

    pub fn with_view(mut self, database: &str, create_sql: &str) -> Self {
        let (name, object) = object_from_create(ObjectKind::View, create_sql).expect("valid CREATE VIEW");
        self.insert_object(database, name, object);
        self
    }

    pub fn with_catalog_row(mut self, table: &str, row: &[(&str, Option<&str>)]) -> Self {
        self.catalog.entry(table.to_string()).or_default().push(
            row.iter()
                .map(|(column, value)| (column.to_string(), value.map(str::to_string)))
                .collect(),
        );
        self
    }

    pub fn fail_on(mut self, pattern: &str) -> Self {
        self.failures.push(pattern.to_string());
        self
    }

    pub fn object(&self, database: &str, table: &str) -> Option<&FakeObject> {
        self.databases.get(database)?.get(table)
    }

    pub fn catalog_rows(&self, table: &str) -> &[CatalogRow] {
        self.catalog.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn executed_sql(&self) -> Vec<&str> {
        self.executed.iter().map(|(_, sql)| sql.as_str()).collect()
    }

    /// Default database when the first statement containing `pattern` ran
    pub fn database_when(&self, pattern: &str) -> Option<&str> {
        let index = self.executed.iter().position(|(_, sql)| sql.contains(pattern))?;
        self.executed_in[index].as_deref()
    }

    fn insert_object(&mut self, database: &str, name: String, object: FakeObject) {
        self.databases
            .entry(database.to_string())
            .or_default()
            .insert(name, object);
    }

    fn take_object(&mut self, database: &str, table: &str) -> Result<FakeObject> {
        self.databases
            .get_mut(database)
            .and_then(|objects| objects.remove(table))
            .ok_or_else(|| anyhow!("Table '{}.{}' doesn't exist", database, table))
    }

    fn apply(&mut self, sql: &str) -> Result<()> {
        let tokens = lex(sql)?;
        let head = tokens.first().and_then(Tok::word).unwrap_or_default();
        match head.as_str() {
            "SET" => Ok(()),
            "RENAME" => self.apply_rename(&tokens),
            "CREATE" => self.apply_create(sql, &tokens),
            "ALTER" => {
                let (database, table) = qualified_after(&tokens, 2)?;
                let object = self
                    .databases
                    .get_mut(&database)
                    .and_then(|objects| objects.get_mut(&table))
                    .ok_or_else(|| anyhow!("Table '{}.{}' doesn't exist", database, table))?;
                object.alterations.push(sql.to_string());
                Ok(())
            }
            "DROP" => {
                let if_exists = tokens.iter().any(|t| t.is_word("EXISTS"));
                let start = tokens.iter().position(Tok::is_ident).unwrap_or(tokens.len());
                let (database, table) = qualified_after(&tokens, start)?;
                match self.take_object(&database, &table) {
                    Ok(_) => Ok(()),
                    Err(_) if if_exists => Ok(()),
                    Err(_) => bail!("Unknown table '{}.{}'", database, table),
                }
            }
            "INSERT" if tokens.iter().any(|t| t.is_word("IGNORE")) => self.catalog_insert(&tokens, false),
            "INSERT" => self.apply_insert_select(&tokens),
            "REPLACE" => self.catalog_insert(&tokens, true),
            "UPDATE" => self.catalog_update(&tokens),
            "DELETE" => self.catalog_delete(&tokens),
            other => bail!("unsupported statement '{}'", other),
        }
    }

    fn apply_rename(&mut self, tokens: &[Tok]) -> Result<()> {
        if !self.native_rename {
            bail!("Renaming across these tables is not supported");
        }
        let (source_db, source_table) = qualified_after(tokens, 2)?;
        let to = tokens
            .iter()
            .position(|t| t.is_word("TO"))
            .ok_or_else(|| anyhow!("RENAME without TO"))?;
        let (target_db, target_table) = qualified_after(tokens, to + 1)?;
        if !self.databases.contains_key(&target_db) {
            bail!("Unknown database '{}'", target_db);
        }
        let object = self.take_object(&source_db, &source_table)?;
        self.insert_object(&target_db, target_table, object);
        Ok(())
    }

    fn apply_create(&mut self, sql: &str, tokens: &[Tok]) -> Result<()> {
        let (kind, keyword) = match tokens.iter().position(|t| t.is_word("TABLE")) {
            Some(index) => (ObjectKind::Table, index),
            None => (
                ObjectKind::View,
                tokens
                    .iter()
                    .position(|t| t.is_word("VIEW"))
                    .ok_or_else(|| anyhow!("unsupported CREATE"))?,
            ),
        };
        let (database, table) = qualified_after(tokens, keyword + 1)?;
        if !self.databases.contains_key(&database) {
            bail!("Unknown database '{}'", database);
        }
        if self.object(&database, &table).is_some() {
            bail!("Table '{}' already exists", table);
        }
        let (_, object) = object_from_create(kind, sql)?;
        self.insert_object(&database, table, object);
        Ok(())
    }

    fn apply_insert_select(&mut self, tokens: &[Tok]) -> Result<()> {
        let (target_db, target_table) = qualified_after(tokens, 2)?;
        let columns: Vec<String> = tokens
            .iter()
            .skip_while(|t| !t.is_sym('('))
            .take_while(|t| !t.is_sym(')'))
            .filter_map(Tok::ident)
            .collect();
        let from = tokens
            .iter()
            .position(|t| t.is_word("FROM"))
            .ok_or_else(|| anyhow!("INSERT without FROM"))?;
        let (source_db, source_table) = qualified_after(tokens, from + 1)?;

        let source = self
            .object(&source_db, &source_table)
            .ok_or_else(|| anyhow!("Table '{}.{}' doesn't exist", source_db, source_table))?
            .clone();
        let target = self
            .databases
            .get_mut(&target_db)
            .and_then(|objects| objects.get_mut(&target_table))
            .ok_or_else(|| anyhow!("Table '{}.{}' doesn't exist", target_db, target_table))?;

        for column in &columns {
            if target.columns.iter().any(|c| &c.name == column && c.generated) {
                bail!("The value specified for generated column '{}' is not allowed", column);
            }
        }
        for row in &source.rows {
            target.rows.push(
                columns
                    .iter()
                    .filter_map(|column| row.get(column).map(|value| (column.clone(), value.clone())))
                    .collect(),
            );
        }
        Ok(())
    }

    fn catalog_insert(&mut self, tokens: &[Tok], replace: bool) -> Result<()> {
        let start = tokens.iter().position(Tok::is_ident).unwrap_or(tokens.len());
        let key = catalog_key(tokens, start)?;
        let columns: Vec<String> = tokens
            .iter()
            .skip_while(|t| !t.is_sym('('))
            .take_while(|t| !t.is_sym(')'))
            .filter_map(Tok::ident)
            .collect();
        let values_at = tokens
            .iter()
            .position(|t| t.is_word("VALUES"))
            .ok_or_else(|| anyhow!("INSERT without VALUES"))?;
        let values: Vec<Option<String>> = tokens[values_at..]
            .iter()
            .filter_map(|t| match t {
                Tok::Str(value) => Some(Some(value.clone())),
                Tok::Word(word) if word.eq_ignore_ascii_case("NULL") => Some(None),
                _ => None,
            })
            .collect();
        let row: CatalogRow = columns.into_iter().zip(values).collect();

        let rows = self.catalog.entry(key).or_default();
        if replace {
            let identity = ["db_name", "table_name", "column_name"];
            rows.retain(|existing| !identity.iter().all(|k| existing.get(*k) == row.get(*k)));
        } else if rows.iter().any(|existing| existing == &row) {
            return Ok(());
        }
        rows.push(row);
        Ok(())
    }

    fn catalog_update(&mut self, tokens: &[Tok]) -> Result<()> {
        let key = catalog_key(tokens, 1)?;
        let set_at = tokens.iter().position(|t| t.is_word("SET")).unwrap_or(0);
        let where_at = tokens.iter().position(|t| t.is_word("WHERE")).unwrap_or(tokens.len());
        let assignments = equalities(&tokens[set_at..where_at]);
        let conditions = equalities(&tokens[where_at..]);
        for row in self.catalog.entry(key).or_default() {
            if matches(row, &conditions) {
                for (column, value) in &assignments {
                    row.insert(column.clone(), Some(value.clone()));
                }
            }
        }
        Ok(())
    }

    fn catalog_delete(&mut self, tokens: &[Tok]) -> Result<()> {
        let key = catalog_key(tokens, 2)?;
        let conditions = equalities(tokens);
        self.catalog
            .entry(key)
            .or_default()
            .retain(|row| !matches(row, &conditions));
        Ok(())
    }

    fn answer(&self, sql: &str) -> Result<Vec<Row>> {
        if sql == "SHOW DATABASES" {
            return Ok(self
                .databases
                .keys()
                .map(|db| Row::from_pairs([("Database", Some(db.as_str()))]))
                .collect());
        }
        if sql.starts_with("SELECT @@SESSION.sql_mode") {
            return Ok(vec![Row::from_pairs([("sql_mode", Some(self.sql_mode.as_str()))])]);
        }

        let tokens = lex(sql)?;
        let literals: Vec<String> = tokens
            .iter()
            .filter_map(|t| match t {
                Tok::Str(value) => Some(value.clone()),
                _ => None,
            })
            .collect();
        if sql.starts_with("SHOW CREATE") {
            let (database, table) = qualified_after(&tokens, 3)?;
            let object = self
                .object(&database, &table)
                .ok_or_else(|| anyhow!("Table '{}.{}' doesn't exist", database, table))?;
            return Ok(vec![Row::from_pairs([
                ("Table", Some(table.as_str())),
                ("Create Table", Some(object.create_sql.as_str())),
            ])]);
        }
        if sql.contains("information_schema.TABLES") {
            let database = literals.first().cloned().unwrap_or_default();
            let Some(objects) = self.databases.get(&database) else {
                return Ok(Vec::new());
            };
            let lookup = if sql.contains("TABLE_NAME = ") {
                literals.get(1)
            } else {
                None
            };
            let mut listed: Vec<(&String, &FakeObject)> = match lookup {
                Some(name) => objects.iter().filter(|(n, _)| *n == name).collect(),
                None => objects.iter().collect(),
            };
            listed.sort_by_key(|(name, object)| (object.kind == ObjectKind::View, (*name).clone()));
            return Ok(listed
                .into_iter()
                .map(|(name, object)| {
                    let table_type = match object.kind {
                        ObjectKind::Table => "BASE TABLE",
                        ObjectKind::View => "VIEW",
                    };
                    if sql.starts_with("SELECT TABLE_TYPE") {
                        Row::from_pairs([("TABLE_TYPE", Some(table_type))])
                    } else {
                        Row::from_pairs([("TABLE_NAME", Some(name.as_str())), ("TABLE_TYPE", Some(table_type))])
                    }
                })
                .collect());
        }
        if sql.contains("information_schema.COLUMNS") {
            let object = match (literals.first(), literals.get(1)) {
                (Some(database), Some(table)) => self.object(database, table),
                _ => None,
            };
            return Ok(object
                .map(|object| {
                    object
                        .columns
                        .iter()
                        .filter(|column| !column.generated)
                        .map(|column| Row::from_pairs([("COLUMN_NAME", Some(column.name.as_str()))]))
                        .collect()
                })
                .unwrap_or_default());
        }

        // Catalog SELECT `a`, `b` FROM `db`.`table` WHERE ...
        let from = tokens
            .iter()
            .position(|t| t.is_word("FROM"))
            .ok_or_else(|| anyhow!("unsupported query: {}", sql))?;
        let fields: Vec<String> = tokens[..from].iter().filter_map(Tok::ident).collect();
        let key = catalog_key(&tokens, from + 1)?;
        let conditions = equalities(&tokens[from..]);
        Ok(self
            .catalog_rows(&key)
            .iter()
            .filter(|row| matches(row, &conditions))
            .map(|row| {
                Row::new(
                    fields.clone(),
                    fields.iter().map(|f| row.get(f).cloned().flatten()).collect(),
                )
            })
            .collect())
    }
}

#[async_trait]
impl DatabaseClient for FakeServer {
    async fn select_database(&mut self, name: &str) -> Result<()> {
        if !self.databases.contains_key(name) {
            bail!("Unknown database '{}'", name);
        }
        self.selected.push(name.to_string());
        Ok(())
    }

    async fn execute_with(
        &mut self,
        role: ConnectionRole,
        sql: &str,
        params: Params,
    ) -> Result<ExecOutcome> {
        let sql = interpolate(sql, &params);
        if let Some(pattern) = self.failures.iter().find(|p| sql.contains(p.as_str())) {
            bail!("Simulated failure on '{}'", pattern);
        }
        self.apply(&sql)?;
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
        _role: ConnectionRole,
        sql: &str,
        params: Params,
    ) -> Result<Vec<Row>> {
        self.answer(&interpolate(sql, &params))
    }
}

/// Name and columns of a CREATE statement's object
///
/// Columns are the elements of the outermost parenthesised list that open
/// with a quoted name; keys and constraints open with a keyword.
fn object_from_create(kind: ObjectKind, create_sql: &str) -> Result<(String, FakeObject)> {
    let tokens = lex(create_sql)?;
    let keyword = tokens
        .iter()
        .position(|t| t.is_word(if kind == ObjectKind::View { "VIEW" } else { "TABLE" }))
        .unwrap_or(0);
    let name = tokens[keyword..]
        .iter()
        .find_map(Tok::ident)
        .unwrap_or_default();

    let mut columns = Vec::new();
    if kind == ObjectKind::Table {
        let open = tokens.iter().position(|t| t.is_sym('(')).unwrap_or(tokens.len());
        let mut depth = 0usize;
        let mut element: Vec<&Tok> = Vec::new();
        for token in tokens.iter().skip(open) {
            match token {
                Tok::Sym('(') => depth += 1,
                Tok::Sym(')') => depth -= 1,
                _ => {}
            }
            let boundary = depth == 0 || (depth == 1 && token.is_sym(','));
            if boundary {
                if let Some(Tok::Ident(column)) = element.get(1) {
                    columns.push(FakeColumn {
                        name: column.clone(),
                        generated: element.iter().any(|t| t.is_word("GENERATED")),
                    });
                }
                element.clear();
                if depth == 0 {
                    break;
                }
            }
            element.push(token);
        }
    }

    Ok((
        name,
        FakeObject {
            kind,
            create_sql: create_sql.to_string(),
            columns,
            rows: Vec::new(),
            alterations: Vec::new(),
        },
    ))
}

fn catalog_key(tokens: &[Tok], start: usize) -> Result<String> {
    let (database, table) = qualified_after(tokens, start)?;
    Ok(format!("{}.{}", database, table))
}

/// `db`.`table` starting at or after `start`
fn qualified_after(tokens: &[Tok], start: usize) -> Result<(String, String)> {
    let rest = tokens.get(start..).unwrap_or(&[]);
    let first = rest
        .iter()
        .position(Tok::is_ident)
        .ok_or_else(|| anyhow!("expected a qualified name"))?;
    match (rest.get(first), rest.get(first + 1), rest.get(first + 2)) {
        (Some(Tok::Ident(db)), Some(Tok::Sym('.')), Some(Tok::Ident(table))) => {
            Ok((db.clone(), table.clone()))
        }
        _ => bail!("expected a qualified name"),
    }
}

/// Every `ident = 'literal'` pair
fn equalities(tokens: &[Tok]) -> Vec<(String, String)> {
    tokens
        .windows(3)
        .filter_map(|w| match w {
            [Tok::Ident(column), Tok::Sym('='), Tok::Str(value)] => Some((column.clone(), value.clone())),
            [Tok::Word(column), Tok::Sym('='), Tok::Str(value)] => Some((column.clone(), value.clone())),
            _ => None,
        })
        .collect()
}

fn matches(row: &CatalogRow, conditions: &[(String, String)]) -> bool {
    conditions
        .iter()
        .all(|(column, value)| row.get(column).cloned().flatten().as_deref() == Some(value.as_str()))
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Str(String),
    Word(String),
    Sym(char),
}

impl Tok {
    fn is_ident(&self) -> bool {
        matches!(self, Tok::Ident(_))
    }

    fn ident(&self) -> Option<String> {
        match self {
            Tok::Ident(name) => Some(name.clone()),
            _ => None,
        }
    }

    fn word(&self) -> Option<String> {
        match self {
            Tok::Word(word) => Some(word.to_ascii_uppercase()),
            _ => None,
        }
    }

    fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Tok::Word(word) if word.eq_ignore_ascii_case(keyword))
    }

    fn is_sym(&self, symbol: char) -> bool {
        matches!(self, Tok::Sym(c) if *c == symbol)
    }
}

/// Statement tokens with whitespace dropped and literals unescaped
fn lex(sql: &str) -> Result<Vec<Tok>> {
    let tokens = Tokenizer::new(&MySqlDialect {}, sql).tokenize()?;
    Ok(tokens
        .into_iter()
        .filter_map(|token| match token {
            Token::Whitespace(_) => None,
            Token::Word(word) if word.quote_style.is_some() => Some(Tok::Ident(word.value)),
            Token::Word(word) => Some(Tok::Word(word.value)),
            Token::Number(number, _) => Some(Tok::Word(number)),
            Token::SingleQuotedString(value) => Some(Tok::Str(value)),
            other => other.to_string().chars().next().map(Tok::Sym),
        })
        .collect())
}
