// ABOUTME: Table relocation engine that moves or copies a table between identifiers
// ABOUTME: Sequences rename, precheck, structure, constraints, indexes, data and catalog phases

pub mod audit;
pub mod context;
pub mod orchestrator;
pub mod precheck;
pub mod request;

pub use audit::AuditLog;
pub use context::{Phase, RelocationContext};
pub use orchestrator::Relocator;
pub use precheck::check_databases_exist;
pub use request::{Mode, RelocationRequest, Scope};

use serde::Serialize;

/// Outcome of a relocation that did not fail on a statement.
///
/// `success` is false only when a database was missing, in which case
/// nothing was executed and `message` names the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationReport {
    pub success: bool,
    pub message: String,
    /// Every statement issued, one per line
    pub sql_log: String,
    pub completed_phases: Vec<Phase>,
    /// Foreign keys a batch member left for the caller to run once every
    /// sibling table exists
    pub deferred_constraints: Vec<String>,
}

impl RelocationContext<'_> {
    pub(crate) fn finish(self, success: bool, message: impl Into<String>) -> RelocationReport {
        RelocationReport {
            success,
            message: message.into(),
            sql_log: self.log.render(),
            completed_phases: self.completed,
            deferred_constraints: self.deferred_constraints,
        }
    }
}
