#![forbid(unsafe_code)]

//! Error taxonomy shared by every observable container.
//!
//! # Failure Modes
//!
//! | Variant | Cause | Raised by |
//! |---------|-------|-----------|
//! | `IndexOutOfBounds` | Strict write outside `[-len, len)` | `set` under strict policy |
//! | `ConcurrentMutation` | Generation changed mid-read | Bulk reads, cursors, `sort_by` |
//! | `EmptyAggregation` | Seedless reduction over no items | `reduce`, `reduce_right` |
//!
//! All three are contract violations: callers fix the code path, they do not
//! retry.

/// Errors raised by list operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListError {
    /// A strict positional write addressed a slot outside the list.
    IndexOutOfBounds {
        /// The caller-supplied index (before normalization).
        index: isize,
        /// The list length at the time of the call.
        len: usize,
    },
    /// The list was structurally mutated while a read was in progress.
    ConcurrentMutation {
        /// Generation captured when the read started.
        expected: u64,
        /// Generation observed at the failing step.
        found: u64,
    },
    /// A reduction without a seed ran over a list with no values.
    EmptyAggregation,
}

impl std::fmt::Display for ListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IndexOutOfBounds { index, len } => {
                write!(f, "index {index} out of bounds for length {len}")
            }
            Self::ConcurrentMutation { expected, found } => write!(
                f,
                "list mutated during read (generation {expected} -> {found})"
            ),
            Self::EmptyAggregation => write!(f, "reduce of empty list with no initial value"),
        }
    }
}

impl std::error::Error for ListError {}

/// Result alias for list operations.
pub type Result<T, E = ListError> = std::result::Result<T, E>;
