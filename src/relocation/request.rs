// ABOUTME: Relocation request describing what to move or copy and how
// ABOUTME: Validated once before any statement runs

use crate::error::RelocationError;
use crate::identifier::{validate_table_name, TableRef};
use serde::Serialize;

/// Which parts of the table take part in a relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Scope {
    #[default]
    StructureAndData,
    StructureOnly,
    DataOnly,
}

impl Scope {
    pub fn creates_structure(self) -> bool {
        matches!(self, Scope::StructureAndData | Scope::StructureOnly)
    }

    pub fn copies_rows(self) -> bool {
        matches!(self, Scope::StructureAndData | Scope::DataOnly)
    }
}

/// Whether the table is relocated alone or as one member of a database batch.
///
/// Batch members return their foreign keys instead of executing them, since
/// a key may reference a sibling that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Mode {
    #[default]
    SingleTable,
    WholeDatabaseMember,
}

/// One move or copy of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelocationRequest {
    pub source: TableRef,
    pub target: TableRef,
    pub scope: Scope,
    pub mode: Mode,
    pub is_move: bool,
    pub drop_if_exists: bool,
    /// Copies also recreate foreign keys; moves always do
    pub with_constraints: bool,
    pub include_auto_increment: bool,
}

impl RelocationRequest {
    /// Move `source` to `target`.
    ///
    /// An empty target database means the source database.
    pub fn moving(source: TableRef, target: TableRef) -> Self {
        Self::new(source, target, true)
    }

    /// Copy `source` to `target`, leaving the source untouched
    pub fn copying(source: TableRef, target: TableRef) -> Self {
        Self::new(source, target, false)
    }

    fn new(source: TableRef, mut target: TableRef, is_move: bool) -> Self {
        if target.database.is_empty() {
            target.database = source.database.clone();
        }
        Self {
            source,
            target,
            scope: Scope::default(),
            mode: Mode::default(),
            is_move,
            drop_if_exists: false,
            with_constraints: false,
            include_auto_increment: true,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn drop_if_exists(mut self, drop_if_exists: bool) -> Self {
        self.drop_if_exists = drop_if_exists;
        self
    }

    pub fn with_constraints(mut self, with_constraints: bool) -> Self {
        self.with_constraints = with_constraints;
        self
    }

    pub fn include_auto_increment(mut self, include: bool) -> Self {
        self.include_auto_increment = include;
        self
    }

    /// Foreign keys are recreated on the target
    pub fn applies_constraints(&self) -> bool {
        self.is_move || self.with_constraints
    }

    /// Reject requests the server would refuse or that would destroy the source.
    pub fn validate(&self) -> Result<(), RelocationError> {
        if self.source.database.is_empty() {
            return Err(RelocationError::invalid("Source database name cannot be empty"));
        }
        validate_table_name(&self.source.table).map_err(RelocationError::invalid)?;
        validate_table_name(&self.target.table).map_err(RelocationError::invalid)?;

        if self.source == self.target {
            return Err(RelocationError::invalid(format!(
                "Can't {} table {} to itself!",
                if self.is_move { "move" } else { "copy" },
                self.source
            )));
        }
        Ok(())
    }
}
