#![forbid(unsafe_code)]

//! Index arithmetic for positional operations.
//!
//! Positions may be negative, in which case they count back from the end of
//! the sequence. Read accessors clamp gracefully; strict accessors reject.
//!
//! ```text
//! len = 4        [ a  b  c  d ]
//! index           0  1  2  3
//! negative       -4 -3 -2 -1
//! normalize(-9)   0   (clamped)
//! normalize(7)    7   (unchanged; caller decides)
//! ```

use std::ops::Range;

use crate::error::{ListError, Result};

/// Normalize an index that may count from the end.
///
/// Non-negative indices are returned unchanged, even when they are past the
/// end. Negative indices become `max(0, index + len)`.
#[inline]
#[must_use]
pub fn normalize(index: isize, len: usize) -> usize {
    if index >= 0 {
        index.unsigned_abs()
    } else {
        len.saturating_sub(index.unsigned_abs())
    }
}

/// Normalize an index and clamp it to `len`, for insertion points.
#[inline]
#[must_use]
pub fn normalize_clamped(index: isize, len: usize) -> usize {
    normalize(index, len).min(len)
}

/// Resolve an index that must address an existing slot.
///
/// Fails when `index >= len` or `index < -len`.
pub fn strict_index(index: isize, len: usize) -> Result<usize> {
    let resolved = if index >= 0 {
        Some(index.unsigned_abs())
    } else {
        len.checked_sub(index.unsigned_abs())
    };
    match resolved {
        Some(i) if i < len => Ok(i),
        _ => Err(ListError::IndexOutOfBounds { index, len }),
    }
}

/// Number of slots a removal starting at `start` may actually delete.
#[inline]
#[must_use]
pub fn clamp_delete_count(start: usize, count: usize, len: usize) -> usize {
    count.min(len.saturating_sub(start))
}

/// A half-open relative range over a sequence.
///
/// Both ends may be negative; `end: None` means "to the end".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// First position (inclusive).
    pub start: isize,
    /// Last position (exclusive), or the end of the sequence.
    pub end: Option<isize>,
}

impl Default for Span {
    fn default() -> Self {
        Self::all()
    }
}

impl Span {
    /// The whole sequence.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            start: 0,
            end: None,
        }
    }

    /// From `start` to the end of the sequence.
    #[must_use]
    pub const fn from(start: isize) -> Self {
        Self { start, end: None }
    }

    /// From `start` (inclusive) to `end` (exclusive).
    #[must_use]
    pub const fn new(start: isize, end: isize) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Resolve against a concrete length.
    ///
    /// The result always lies within `0..=len` and is never inverted.
    #[must_use]
    pub fn resolve(self, len: usize) -> Range<usize> {
        let start = normalize_clamped(self.start, len);
        let end = self.end.map_or(len, |end| normalize_clamped(end, len));
        start..end.max(start)
    }
}
