//! The error type shared across the workspace.

use thiserror::Error;

/// Errors surfaced at command boundaries.
///
/// Usage errors reject the offending assertion and leave the previous
/// state intact. `ResourceLimit` corresponds to the `unknown` status.
/// `Internal` is the release-mode rendition of an invariant breach that
/// `debug_assert!` would have caught in a debug build.
#[derive(Debug, Clone, Error)]
pub enum SilexError {
    /// A term outside the supported linear fragment.
    #[error("unsupported non-linear arithmetic: {0}")]
    NonLinear(String),
    /// Model values (abstract values) are not allowed in input.
    #[error("model values not allowed in input")]
    ModelValueInInput,
    /// Quantified input in a quantifier-free configuration.
    #[error("quantified formulas are not supported")]
    Quantifier,
    /// A sort error in a term handed to the core.
    #[error("sort mismatch: expected {expected}, found {found}")]
    SortMismatch {
        /// What the operation required.
        expected: String,
        /// What was supplied.
        found: String,
    },
    /// The cancellation token fired or a step budget ran out.
    #[error("resource limit reached: {0}")]
    ResourceLimit(&'static str),
    /// An internal invariant did not hold.
    #[error("internal error: {0}")]
    Internal(&'static str),
}

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, SilexError>;
