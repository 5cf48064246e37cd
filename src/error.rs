//! Fatal error categories for a star-schema run.
//!
//! Anything recoverable (a malformed document, a title without a year) is counted and logged
//! by the stage that meets it. What lands here aborts the run before any table is emitted.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    /// A canonical row references an owner row that was never built.
    #[error("integrity violation: {dimension} row {canonical_id} references unknown owner {owner_id}")]
    UnknownOwner {
        dimension: &'static str,
        canonical_id: Uuid,
        owner_id: Uuid,
    },

    /// A single-valued foreign key slot was already bound to another canonical row.
    #[error("integrity violation: {field} on {owner_id} already bound to {existing}, refusing {incoming}")]
    SlotAlreadyBound {
        field: &'static str,
        owner_id: Uuid,
        existing: Uuid,
        incoming: Uuid,
    },

    /// The owner row type has no slot for the requested foreign key.
    #[error("integrity violation: {owner} rows carry no {field} slot")]
    NoSuchSlot {
        owner: &'static str,
        field: &'static str,
    },

    #[error("reference corpus {path}: {source}")]
    CorpusIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("reference corpus {path}: record {record}: {source}")]
    CorpusRecord {
        path: PathBuf,
        record: u64,
        #[source]
        source: csv::Error,
    },

    #[error("reference corpus {path} is missing column `{column}`")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("sink {target}: {source}")]
    Sink {
        target: String,
        #[source]
        source: std::io::Error,
    },
}
