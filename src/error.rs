//! Engine error taxonomy.
//!
//! Every fallible engine operation returns `Result<T, EngineError>`.
//! `Validation` errors are user-correctable refusals that leave the
//! document untouched; `Integrity` errors abort an operation that
//! should have been structurally impossible after validation.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    /// User-correctable refusal (cyclic move, protected node, missing
    /// target, ...). The document is left unmodified.
    #[error("validation: {0}")]
    Validation(String),

    /// A state that validation should have made impossible (e.g. a
    /// target id vanished during a pruning pass). The operation aborts
    /// without partial commit.
    #[error("integrity: {0}")]
    Integrity(String),

    /// Malformed or unsupported-version document; the previous
    /// in-memory document remains authoritative.
    #[error("import: {0}")]
    Import(String),

    /// Persistence collaborator failure.
    #[error("storage: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    /// Logs the integrity failure as critical before constructing it.
    pub fn integrity(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        eprintln!("[Engine] CRITICAL: {}", msg);
        EngineError::Integrity(msg)
    }
}
