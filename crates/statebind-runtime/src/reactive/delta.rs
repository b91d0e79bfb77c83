#![forbid(unsafe_code)]

//! Change payloads carried by list notifications.
//!
//! Every mutation of an [`ObservableList`](super::ObservableList) is described
//! twice:
//!
//! - a [`ChangeDelta`] on the change channel: one positional replace,
//!   `splice(start_index, removed.len(), added...)`;
//! - a [`PropertyChange`] on the property channel: `length` (when it changed)
//!   followed by every index whose stored value differs.
//!
//! The two granularities differ on purpose for reorders: the delta spans the
//! first through last differing index, while the property change lists only
//! the indices that actually hold a new value.
//!
//! ```text
//! before  [ 1  2  3 ]
//! splice(1, 2, [9])
//! after   [ 1  9 ]
//!
//! delta     { start_index: 1, added: [9], removed: [2, 3] }
//! property  [ "length", "1" ]
//! ```

use std::fmt;

/// The mutation primitive that produced a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "kebab-case")
)]
pub enum ChangeKind {
    /// Items added at the end.
    Append,
    /// The final item removed.
    RemoveLast,
    /// Items added at the front.
    Prepend,
    /// The first item removed.
    RemoveFirst,
    /// Any other positional replace (splice, set, reorders).
    RangeReplace,
}

impl ChangeKind {
    /// Stable name used in logs and payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::RemoveLast => "remove-last",
            Self::Prepend => "prepend",
            Self::RemoveFirst => "remove-first",
            Self::RangeReplace => "range-replace",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized structural change.
///
/// `added` and `removed` hold slots: `None` marks an absent placeholder.
///
/// # Invariants
///
/// Replaying `splice(start_index, removed.len(), added)` against the
/// pre-mutation slots yields the post-mutation slots exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeDelta<T> {
    /// Which primitive produced this change.
    pub kind: ChangeKind,
    /// First affected position in the pre-mutation sequence.
    pub start_index: usize,
    /// Slots inserted at `start_index`, in order.
    pub added: Vec<Option<T>>,
    /// Slots removed from `start_index`, in order.
    pub removed: Vec<Option<T>>,
}

impl<T> ChangeDelta<T> {
    /// Net change in length.
    #[must_use]
    pub fn len_delta(&self) -> isize {
        self.added.len() as isize - self.removed.len() as isize
    }
}

impl<T: Clone> ChangeDelta<T> {
    /// Replay this change against a mirror of the pre-mutation slots.
    ///
    /// Positions past the end of `target` are clamped, so a mirror that has
    /// drifted is patched as far as possible rather than panicking.
    pub fn apply_to(&self, target: &mut Vec<Option<T>>) {
        let start = self.start_index.min(target.len());
        let end = (start + self.removed.len()).min(target.len());
        target.splice(start..end, self.added.iter().cloned());
    }
}

impl<T: PartialEq> ChangeDelta<T> {
    /// Whether `target` looks like the pre-mutation slots: `start_index` is
    /// in range and the removed slots sit there unchanged.
    #[must_use]
    pub fn fits(&self, target: &[Option<T>]) -> bool {
        self.start_index
            .checked_add(self.removed.len())
            .and_then(|end| target.get(self.start_index..end))
            .is_some_and(|current| current == self.removed.as_slice())
    }
}

/// A property name reported on the property channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum PropertyKey {
    /// The list length.
    Length,
    /// An item slot.
    Index(usize),
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Length => f.write_str("length"),
            Self::Index(i) => write!(f, "{i}"),
        }
    }
}

/// Ordered list of properties touched by one mutation.
///
/// `Length` comes first when present; indices follow in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropertyChange {
    keys: Vec<PropertyKey>,
}

impl PropertyChange {
    /// Build from the length flag and ascending changed indices.
    #[must_use]
    pub fn new(length_changed: bool, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut keys = Vec::new();
        if length_changed {
            keys.push(PropertyKey::Length);
        }
        keys.extend(indices.into_iter().map(PropertyKey::Index));
        Self { keys }
    }

    /// The reported keys, in order.
    #[must_use]
    pub fn keys(&self) -> &[PropertyKey] {
        &self.keys
    }

    /// Iterate the reported keys.
    pub fn iter(&self) -> impl Iterator<Item = PropertyKey> + '_ {
        self.keys.iter().copied()
    }

    /// Whether `key` was reported.
    #[must_use]
    pub fn contains(&self, key: PropertyKey) -> bool {
        self.keys.contains(&key)
    }

    /// Whether the length changed.
    #[must_use]
    pub fn length_changed(&self) -> bool {
        self.keys.first() == Some(&PropertyKey::Length)
    }

    /// Changed item indices, ascending.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.keys.iter().filter_map(|k| match k {
            PropertyKey::Index(i) => Some(*i),
            PropertyKey::Length => None,
        })
    }

    /// Number of reported keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys rendered as property names (`"length"`, `"0"`, ...).
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.keys.iter().map(ToString::to_string).collect()
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}")?;
        }
        f.write_str("]")
    }
}

/// Positions (offset by `offset`) where `after` differs from `before`.
///
/// Positions present in `after` but not in `before` always count as changed;
/// positions only in `before` are covered by the length key instead.
pub(crate) fn changed_indices<T: PartialEq>(
    before: &[Option<T>],
    after: &[Option<T>],
    offset: usize,
) -> Vec<usize> {
    after
        .iter()
        .enumerate()
        .filter(|(i, slot)| before.get(*i) != Some(*slot))
        .map(|(i, _)| offset + i)
        .collect()
}

/// Bounds of the differing region between two equal-length slot vectors.
pub(crate) fn differing_span<T: PartialEq>(
    before: &[Option<T>],
    after: &[Option<T>],
) -> Option<(usize, usize)> {
    let first = before.iter().zip(after).position(|(a, b)| a != b)?;
    let last = before.iter().zip(after).rposition(|(a, b)| a != b)?;
    Some((first, last + 1))
}
