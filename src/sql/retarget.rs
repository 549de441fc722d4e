// ABOUTME: Rewrites statements so they act on a destination object
// ABOUTME: Swaps the object reference and clears constraint names that must stay schema-unique

use super::{byte_offset, tokenize, Dialect, Keyword, ObjectName, SqlError, Statement};
use sqlparser::ast::{AlterTableOperation, TableConstraint};
use sqlparser::tokenizer::{Token, TokenWithSpan};

/// Point `statement` at `destination`.
///
/// CREATE and ALTER get their object reference replaced and DROP gets its name
/// list replaced. Every constraint added by an ALTER loses its `CONSTRAINT`
/// symbol so the server generates a fresh one. Other statements are returned
/// unchanged.
pub fn retarget(mut statement: Statement, destination: &ObjectName) -> Statement {
    match &mut statement {
        Statement::CreateTable(create) => create.name = destination.clone(),
        Statement::CreateView { name, .. } => *name = destination.clone(),
        Statement::AlterTable {
            name, operations, ..
        } => {
            *name = destination.clone();
            for operation in operations {
                if let AlterTableOperation::AddConstraint(constraint) = operation {
                    clear_constraint_name(constraint);
                }
            }
        }
        Statement::Drop { names, .. } => *names = vec![destination.clone()],
        _ => {}
    }
    statement
}

fn clear_constraint_name(constraint: &mut TableConstraint) {
    match constraint {
        TableConstraint::Unique { name, .. }
        | TableConstraint::PrimaryKey { name, .. }
        | TableConstraint::ForeignKey { name, .. }
        | TableConstraint::Check { name, .. } => *name = None,
        // Index names only need to be unique per table
        TableConstraint::Index { .. } | TableConstraint::FulltextOrSpatial { .. } => {}
    }
}

/// Replace the object name that follows the first `keyword` in `sql`.
///
/// For MySQL statements the parser does not model, such as `CREATE
/// ALGORITHM=... DEFINER=... VIEW` or `ALTER TABLE ... AUTO_INCREMENT=n`.
/// Everything around the name is kept byte for byte.
pub fn retarget_text(
    sql: &str,
    keyword: Keyword,
    destination: &ObjectName,
    dialect: Dialect,
) -> Result<String, SqlError> {
    let tokens = tokenize(sql, dialect)?;
    let significant: Vec<&TokenWithSpan> = tokens
        .iter()
        .filter(|t| !matches!(t.token, Token::Whitespace(_)))
        .collect();

    let first = significant
        .iter()
        .position(|t| matches!(&t.token, Token::Word(word) if word.keyword == keyword))
        .map(|index| index + 1)
        .filter(|first| is_word(significant.get(*first)))
        .ok_or(SqlError::MissingObjectName(keyword))?;

    let qualified = matches!(
        significant.get(first + 1).map(|t| &t.token),
        Some(Token::Period)
    ) && is_word(significant.get(first + 2));
    let last = if qualified { first + 2 } else { first };

    let start = byte_offset(sql, significant[first].span.start);
    let end = byte_offset(sql, significant[last].span.end);
    Ok(format!("{}{}{}", &sql[..start], destination, &sql[end..]))
}

fn is_word(token: Option<&&TokenWithSpan>) -> bool {
    matches!(token.map(|t| &t.token), Some(Token::Word(_)))
}
