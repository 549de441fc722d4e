// ABOUTME: Error types returned by the relocation engine
// ABOUTME: Separates rejected requests from statement failures that carry the partial SQL log

use crate::relocation::Phase;
use thiserror::Error;

/// Errors surfaced by [`crate::Relocator::relocate`].
///
/// A missing source or target database is not an error: it is reported through
/// an unsuccessful [`crate::RelocationReport`] before anything is executed.
#[derive(Error, Debug)]
pub enum RelocationError {
    /// The request failed validation; nothing was executed
    #[error("Invalid relocation request: {0}")]
    InvalidRequest(String),

    /// A statement or collaborator query failed mid-relocation.
    ///
    /// Earlier phases stay applied. `completed` lists them so callers can clean
    /// up a partially created target. Displays the innermost cause, which
    /// is the server's own message.
    #[error("{}", .source.root_cause())]
    Statement {
        phase: Phase,
        statement: Option<String>,
        sql_log: String,
        completed: Vec<Phase>,
        #[source]
        source: anyhow::Error,
    },
}

impl RelocationError {
    pub fn invalid(message: impl Into<String>) -> Self {
        RelocationError::InvalidRequest(message.into())
    }

    /// SQL executed before the failure, empty for rejected requests
    pub fn sql_log(&self) -> &str {
        match self {
            RelocationError::InvalidRequest(_) => "",
            RelocationError::Statement { sql_log, .. } => sql_log,
        }
    }

    /// Format error with the failing phase, statement and error chain
    pub fn format_detailed(&self) -> String {
        match self {
            RelocationError::InvalidRequest(message) => format!("Error: {}\n", message),
            RelocationError::Statement {
                phase,
                statement,
                source,
                ..
            } => {
                let mut output = format!("Error during {}: {}\n", phase, source);
                if let Some(statement) = statement {
                    output.push_str(&format!("\nFailing statement:\n  {}\n", statement));
                }
                for (depth, cause) in source.chain().skip(1).enumerate() {
                    output.push_str(&format!("\nCaused by:\n  {}: {}", depth + 1, cause));
                }
                output
            }
        }
    }
}
