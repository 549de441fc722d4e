// ABOUTME: Per-relocation state threaded through every phase
// ABOUTME: Holds the destination, pending export statements, the audit log and completed phases

use super::audit::AuditLog;
use super::request::RelocationRequest;
use crate::error::RelocationError;
use crate::export::ExportedStructure;
use crate::sql::{self, Dialect, ObjectName};
use serde::Serialize;
use std::fmt;

/// Steps of a relocation, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    FastRename,
    PreconditionCheck,
    StructureBuild,
    ConstraintApply,
    IndexApply,
    AutoIncrementApply,
    DataCopy,
    SourceCleanup,
    CopyMetadata,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::FastRename => "native rename",
            Phase::PreconditionCheck => "precondition check",
            Phase::StructureBuild => "structure build",
            Phase::ConstraintApply => "constraint apply",
            Phase::IndexApply => "index apply",
            Phase::AutoIncrementApply => "auto-increment apply",
            Phase::DataCopy => "data copy",
            Phase::SourceCleanup => "source cleanup",
            Phase::CopyMetadata => "metadata copy",
        };
        f.write_str(name)
    }
}

/// Mutable state of one relocation call.
#[derive(Debug)]
pub struct RelocationContext<'r> {
    pub request: &'r RelocationRequest,
    pub destination: ObjectName,
    pub dialect: Dialect,
    /// Follow-up statements from the export, consumed by their phases
    pub pending: ExportedStructure,
    pub log: AuditLog,
    pub completed: Vec<Phase>,
    pub deferred_constraints: Vec<String>,
    /// A drop-if-exists already settled the target's catalog entries
    pub relations_maintained: bool,
    current: Phase,
    statement: Option<String>,
}

impl<'r> RelocationContext<'r> {
    pub fn new(request: &'r RelocationRequest) -> Self {
        Self {
            request,
            destination: sql::object_name(&request.target),
            dialect: Dialect::default(),
            pending: ExportedStructure::default(),
            log: AuditLog::new(),
            completed: Vec::new(),
            deferred_constraints: Vec::new(),
            relations_maintained: false,
            current: Phase::PreconditionCheck,
            statement: None,
        }
    }

    pub fn begin(&mut self, phase: Phase) {
        self.current = phase;
        self.statement = None;
    }

    pub fn complete(&mut self, phase: Phase) {
        self.statement = None;
        self.completed.push(phase);
    }

    /// Remember the statement about to run so a failure can name it
    pub fn prepare(&mut self, sql: &str) {
        self.statement = Some(sql.to_string());
    }

    /// Wrap a collaborator failure with everything done so far
    pub fn fail(&self, source: anyhow::Error) -> RelocationError {
        RelocationError::Statement {
            phase: self.current,
            statement: self.statement.clone(),
            sql_log: self.log.render(),
            completed: self.completed.clone(),
            source,
        }
    }
}
