// ABOUTME: DDL parsing, rendering and retargeting on top of sqlparser
// ABOUTME: Maps the server's sql_mode to a parser dialect and builds the DROP statements the engine issues

pub mod retarget;

pub use retarget::{retarget, retarget_text};
pub use sqlparser::ast::{ObjectName, Statement};
pub use sqlparser::keywords::Keyword;

use crate::identifier::TableRef;
use serde::Serialize;
use sqlparser::ast::{Ident, ObjectType};
use sqlparser::dialect::{GenericDialect, MySqlDialect};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer, TokenizerError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SqlError {
    #[error(transparent)]
    Parse(#[from] ParserError),

    #[error(transparent)]
    Tokenize(#[from] TokenizerError),

    #[error("Expected an object name after {0:?}")]
    MissingObjectName(Keyword),
}

/// Identifier quoting rules in effect on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dialect {
    /// `"` delimits identifiers instead of strings
    pub ansi_quotes: bool,
}

impl Dialect {
    /// Dialect for a session `sql_mode` value such as `ANSI_QUOTES,STRICT_TRANS_TABLES`
    pub fn from_sql_mode(sql_mode: &str) -> Self {
        let ansi_quotes = sql_mode
            .split(',')
            .map(str::trim)
            .any(|mode| mode.eq_ignore_ascii_case("ANSI_QUOTES") || mode.eq_ignore_ascii_case("ANSI"));
        Self { ansi_quotes }
    }

    fn parser_dialect(self) -> Box<dyn sqlparser::dialect::Dialect> {
        if self.ansi_quotes {
            // Accepts both backticks and double quotes around identifiers
            Box::new(GenericDialect {})
        } else {
            Box::new(MySqlDialect {})
        }
    }
}

/// Whether a schema object is a base table or a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObjectKind {
    Table,
    View,
}

impl ObjectKind {
    pub fn keyword(self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
        }
    }

    fn object_type(self) -> ObjectType {
        match self {
            ObjectKind::Table => ObjectType::Table,
            ObjectKind::View => ObjectType::View,
        }
    }
}

/// Parse every statement in `sql`
pub fn parse(sql: &str, dialect: Dialect) -> Result<Vec<Statement>, SqlError> {
    Ok(Parser::parse_sql(dialect.parser_dialect().as_ref(), sql)?)
}

pub fn tokenize(sql: &str, dialect: Dialect) -> Result<Vec<TokenWithSpan>, SqlError> {
    let parser_dialect = dialect.parser_dialect();
    Ok(Tokenizer::new(parser_dialect.as_ref(), sql).tokenize_with_location()?)
}

/// Keyword of the first word in `sql`, `None` when it starts with anything else
pub fn leading_keyword(sql: &str, dialect: Dialect) -> Result<Option<Keyword>, SqlError> {
    Ok(tokenize(sql, dialect)?
        .into_iter()
        .find(|t| !matches!(t.token, Token::Whitespace(_)))
        .and_then(|t| match t.token {
            Token::Word(word) if word.keyword != Keyword::NoKeyword => Some(word.keyword),
            _ => None,
        }))
}

/// Byte index in `sql` of a token location, which counts characters from 1
pub(crate) fn byte_offset(sql: &str, location: Location) -> usize {
    let (mut line, mut column) = (1, 1);
    for (index, ch) in sql.char_indices() {
        if line == location.line && column == location.column {
            return index;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }
    sql.len()
}

/// Backtick-quoted `` `db`.`table` `` name of `table`
pub fn object_name(table: &TableRef) -> ObjectName {
    ObjectName(vec![
        Ident::with_quote('`', table.database.as_str()),
        Ident::with_quote('`', table.table.as_str()),
    ])
}

/// `DROP TABLE|VIEW [IF EXISTS] name`
pub fn drop_statement(kind: ObjectKind, name: ObjectName, if_exists: bool) -> Statement {
    Statement::Drop {
        object_type: kind.object_type(),
        if_exists,
        names: vec![name],
        cascade: false,
        restrict: false,
        purge: false,
        temporary: false,
    }
}
