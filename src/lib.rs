// ABOUTME: Library module for mysql-table-relocator
// ABOUTME: Exports the relocation engine and its collaborators for the binary and tests

pub mod catalog;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod identifier;
pub mod relocation;
pub mod sql;
pub mod utils;

pub use error::RelocationError;
pub use identifier::TableRef;
pub use relocation::{Mode, RelocationReport, RelocationRequest, Relocator, Scope};
