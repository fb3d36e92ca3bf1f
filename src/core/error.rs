//! Failure taxonomy for the conversion engine
//!
//! Everything recoverable is logged at the call site; everything structural
//! surfaces as an `EngineError` and aborts the run. Edits are only written
//! during the single flush phase, so an abort never leaves a partially
//! rewritten tree behind.

use std::path::PathBuf;

/// Structural failures that abort a run
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The C++ frontend reported a fatal diagnostic (or refused the unit)
    #[error("fatal parser diagnostic: {0}")]
    ParseDiagnostic(String),

    /// A supposedly impossible state in the database or ledger
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// `get_text` over a range spanning multiple lines
    #[error("multi-line ranges are not supported: {0}")]
    UnsupportedMultilineRange(String),

    /// Two body-bearing occurrences of the same function id
    #[error("duplicate definition of `{0}`")]
    DuplicateDefinition(String),

    /// Two edits on one line with intersecting spans
    #[error(
        "overlapping edits on {file}:{line}: [{a_start}, {a_end}) vs [{b_start}, {b_end})",
        file = .file.display()
    )]
    OverlappingEdits {
        file: PathBuf,
        line: u32,
        a_start: usize,
        a_end: usize,
        b_start: usize,
        b_end: usize,
    },

    /// A git subprocess exited non-zero
    #[error("`git {command}` failed: {stderr}")]
    GitFailure { command: String, stderr: String },
}

/// Converts errors to process exit codes
/// 0=success, 3=parse, 4=git, 5=invariant, 1=anything else
pub fn exit_code_for(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<EngineError>() {
        Some(EngineError::ParseDiagnostic(_)) => 3,
        Some(EngineError::GitFailure { .. }) => 4,
        Some(
            EngineError::InvariantViolation(_)
            | EngineError::UnsupportedMultilineRange(_)
            | EngineError::DuplicateDefinition(_)
            | EngineError::OverlappingEdits { .. },
        ) => 5,
        None => 1,
    }
}
