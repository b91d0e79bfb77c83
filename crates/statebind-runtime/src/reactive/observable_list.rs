#![forbid(unsafe_code)]

//! Observable ordered list with normalized change deltas and stale-read
//! detection.
//!
//! # Design
//!
//! [`ObservableList<T>`] keeps its slots in shared, reference-counted storage
//! (`Rc<RefCell<..>>`) next to a generation counter. Cloning a list creates a
//! new handle to the **same** storage and the same event channels.
//!
//! Every mutation is normalized into one positional replace before it is
//! applied:
//!
//! | Operation | Delta |
//! |-----------|-------|
//! | `push(v..)` | `{start: len, added: v..}` |
//! | `pop()` | `{start: len-1, removed: [last]}` |
//! | `unshift(v..)` | `{start: 0, added: v..}` |
//! | `shift()` | `{start: 0, removed: [first]}` |
//! | `set(i, v)` | `{start: i, added: [v], removed: [old]}` or a gap-filling append |
//! | `splice(s, n, v..)` | `{start: s, added: v.., removed: n slots}` |
//! | reorders | `{start: first diff, added/removed: differing span}` |
//!
//! After storage is updated and the generation bumped, the change channel
//! fires, then the property channel. Both run synchronously, once per call,
//! with no borrow held.
//!
//! # Invariants
//!
//! 1. Replaying a delta as a splice on the pre-mutation slots yields the
//!    post-mutation slots.
//! 2. A call that leaves the slots unchanged bumps nothing and emits nothing.
//! 3. The property change lists `length` when it changed, then every index
//!    in the new list whose slot differs, ascending.
//! 4. Every bulk read captures the generation once and fails with
//!    [`ListError::ConcurrentMutation`] at the first step that observes a
//!    different one, including right after its own callback returns.
//!
//! # Failure Modes
//!
//! - **Re-entrant `PartialEq`**: an `eq` impl on `T` that touches the same
//!   list while a mutation is diffing slots will panic (RefCell borrow rules).
//!   Handlers and bulk-read callbacks run outside any borrow and may mutate
//!   freely.
//! - **Comparator mutates the list**: `sort_by` fails with
//!   `ConcurrentMutation` and does not apply its ordering.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::TryReserveError;
use std::fmt;
use std::ops::{ControlFlow, Range};
use std::rc::Rc;

use statebind_core::index::{self, Span};
use statebind_core::{EventChannel, ListError, Result, Subscription};
use tracing::debug;

use super::config::{ListConfig, WritePolicy};
use super::cursor::Cursor;
use super::delta::{ChangeDelta, ChangeKind, PropertyChange, changed_indices, differing_span};

/// Channel carrying structural change deltas.
pub type ChangeChannel<T> = EventChannel<ObservableList<T>, ChangeDelta<T>>;

/// Channel carrying property-change names.
pub type PropertyChannel<T> = EventChannel<ObservableList<T>, PropertyChange>;

/// Shared interior for [`ObservableList<T>`].
struct ListState<T> {
    /// `None` marks an absent slot left by a gap-filling write.
    items: Vec<Option<T>>,
    generation: u64,
}

/// A shared, observable, ordered list.
pub struct ObservableList<T> {
    state: Rc<RefCell<ListState<T>>>,
    config: Rc<ListConfig>,
    changed: ChangeChannel<T>,
    property_changed: PropertyChannel<T>,
}

// Manual Clone: shares the same Rc.
impl<T> Clone for ObservableList<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
            config: Rc::clone(&self.config),
            changed: self.changed.clone(),
            property_changed: self.property_changed.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ObservableList")
            .field("label", &self.config.label())
            .field("items", &state.items)
            .field("generation", &state.generation)
            .field("change_subscribers", &self.changed.subscriber_count())
            .field(
                "property_subscribers",
                &self.property_changed.subscriber_count(),
            )
            .finish()
    }
}

impl<T> ObservableList<T> {
    /// Number of addressable slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.borrow().items.len()
    }

    /// Whether the list has no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.borrow().items.is_empty()
    }

    /// Current generation. Changes on every structural mutation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// The configuration this list was created with.
    #[must_use]
    pub fn config(&self) -> &ListConfig {
        &self.config
    }

    /// Channel fired with a [`ChangeDelta`] after every mutation.
    #[must_use]
    pub fn changed(&self) -> &ChangeChannel<T> {
        &self.changed
    }

    /// Channel fired with a [`PropertyChange`] after every change event.
    #[must_use]
    pub fn property_changed(&self) -> &PropertyChannel<T> {
        &self.property_changed
    }

    /// Whether both handles share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

impl<T: Clone + PartialEq + 'static> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + PartialEq + 'static> ObservableList<T> {
    /// Create an empty list with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ListConfig::default())
    }

    /// Create an empty list with the given configuration.
    #[must_use]
    pub fn with_config(config: ListConfig) -> Self {
        Self::from_vec_with_config(Vec::new(), config)
    }

    /// Create a list holding `values`, in order.
    #[must_use]
    pub fn from_vec(values: Vec<T>) -> Self {
        Self::from_vec_with_config(values, ListConfig::default())
    }

    /// Create a list holding `values` with the given configuration.
    #[must_use]
    pub fn from_vec_with_config(values: Vec<T>, config: ListConfig) -> Self {
        Self {
            state: Rc::new(RefCell::new(ListState {
                items: values.into_iter().map(Some).collect(),
                generation: 0,
            })),
            config: Rc::new(config),
            changed: EventChannel::new(),
            property_changed: EventChannel::new(),
        }
    }

    /// Subscribe to change deltas with an RAII guard.
    pub fn subscribe_changes(
        &self,
        f: impl Fn(&Self, &ChangeDelta<T>) + 'static,
    ) -> Subscription {
        self.changed.subscribe_scoped(f)
    }

    /// Subscribe to property changes with an RAII guard.
    pub fn subscribe_properties(
        &self,
        f: impl Fn(&Self, &PropertyChange) + 'static,
    ) -> Subscription {
        self.property_changed.subscribe_scoped(f)
    }

    // -----------------------------------------------------------------------
    // Positional reads
    // -----------------------------------------------------------------------

    pub(crate) fn slot(&self, index: usize) -> Option<Option<T>> {
        self.state.borrow().items.get(index).cloned()
    }

    /// Value at `index`; negative indices count from the end and clamp at 0.
    ///
    /// Returns `None` for absent slots and positions past the end.
    #[must_use]
    pub fn at(&self, index: isize) -> Option<T> {
        let state = self.state.borrow();
        let resolved = index::normalize(index, state.items.len());
        state.items.get(resolved).cloned().flatten()
    }

    /// Value at a non-negative position.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<T> {
        self.slot(index).flatten()
    }

    /// First value, if the first slot is present.
    #[must_use]
    pub fn first(&self) -> Option<T> {
        self.get(0)
    }

    /// Last value, if the last slot is present.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.at(-1)
    }

    /// Independent copy of every slot.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Option<T>> {
        self.state.borrow().items.clone()
    }

    /// Independent copy of the slots in `span`.
    #[must_use]
    pub fn slice(&self, span: Span) -> Vec<Option<T>> {
        let state = self.state.borrow();
        let range = span.resolve(state.items.len());
        state.items[range].to_vec()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Append `values`; returns the new length.
    pub fn push(&self, values: impl IntoIterator<Item = T>) -> usize {
        let added: Vec<Option<T>> = values.into_iter().map(Some).collect();
        let start = self.len();
        if added.is_empty() {
            return start;
        }
        let new_len = start + added.len();
        self.commit(ChangeKind::Append, start, 0, added);
        new_len
    }

    /// Remove and return the last value; `None` when empty or absent.
    pub fn pop(&self) -> Option<T> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        self.commit(ChangeKind::RemoveLast, len - 1, 1, Vec::new())
            .pop()
            .flatten()
    }

    /// Insert `values` at the front; returns the new length.
    pub fn unshift(&self, values: impl IntoIterator<Item = T>) -> usize {
        let added: Vec<Option<T>> = values.into_iter().map(Some).collect();
        let len = self.len();
        if added.is_empty() {
            return len;
        }
        let new_len = len + added.len();
        self.commit(ChangeKind::Prepend, 0, 0, added);
        new_len
    }

    /// Remove and return the first value; `None` when empty or absent.
    pub fn shift(&self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        self.commit(ChangeKind::RemoveFirst, 0, 1, Vec::new())
            .pop()
            .flatten()
    }

    /// Write `value` at `index`.
    ///
    /// Negative indices count from the end. Past the end, the configured
    /// [`WritePolicy`] decides: `Expand` fills the gap with absent slots,
    /// `Strict` fails with [`ListError::IndexOutOfBounds`] and leaves the
    /// list untouched. `Expand` fails the same way when the gap cannot be
    /// allocated.
    pub fn set(&self, index: isize, value: T) -> Result<()> {
        let len = self.len();
        let target = match self.config.write_policy {
            WritePolicy::Strict => index::strict_index(index, len).inspect_err(|_| {
                debug!(list = self.config.label(), index, len, "strict write rejected");
            })?,
            WritePolicy::Expand => index::normalize(index, len),
        };
        if target < len {
            self.commit(ChangeKind::RangeReplace, target, 1, vec![Some(value)]);
        } else {
            let gap = target - len;
            let too_large = |_: TryReserveError| {
                debug!(list = self.config.label(), index, len, "expanding write too large");
                ListError::IndexOutOfBounds { index, len }
            };
            // Reserve for both the gap and the storage before committing, so
            // a failed allocation leaves the list untouched.
            self.state
                .borrow_mut()
                .items
                .try_reserve_exact(gap + 1)
                .map_err(too_large)?;
            let mut added: Vec<Option<T>> = Vec::new();
            added.try_reserve_exact(gap + 1).map_err(too_large)?;
            added.resize(gap, None);
            added.push(Some(value));
            self.commit(ChangeKind::RangeReplace, len, 0, added);
        }
        Ok(())
    }

    /// Remove `delete_count` slots from `start` and insert `insert` there.
    ///
    /// `start` is normalized and clamped to the length; `delete_count` is
    /// clamped to the available slots. Returns the removed slots.
    pub fn splice(
        &self,
        start: isize,
        delete_count: usize,
        insert: impl IntoIterator<Item = T>,
    ) -> Vec<Option<T>> {
        let len = self.len();
        let start = index::normalize_clamped(start, len);
        let delete_count = index::clamp_delete_count(start, delete_count, len);
        let added: Vec<Option<T>> = insert.into_iter().map(Some).collect();
        if delete_count == 0 && added.is_empty() {
            return Vec::new();
        }
        self.commit(ChangeKind::RangeReplace, start, delete_count, added)
    }

    /// Insert `value` before `index` (clamped to the list bounds).
    pub fn insert(&self, index: isize, value: T) {
        self.splice(index, 0, [value]);
    }

    /// Remove the slot at `index`; `None` when out of range or absent.
    pub fn remove(&self, index: isize) -> Option<T> {
        let target = index::strict_index(index, self.len()).ok()?;
        self.commit(ChangeKind::RangeReplace, target, 1, Vec::new())
            .pop()
            .flatten()
    }

    /// Remove every slot.
    pub fn clear(&self) {
        let len = self.len();
        self.splice(0, len, []);
    }

    /// Reverse the slots in place.
    pub fn reverse(&self) {
        let before = self.to_vec();
        let mut after = before.clone();
        after.reverse();
        self.commit_reorder(&before, after);
    }

    /// Write `value` into every slot of `span`.
    pub fn fill(&self, value: T, span: Span) {
        let before = self.to_vec();
        let range = span.resolve(before.len());
        let mut after = before.clone();
        for slot in &mut after[range] {
            *slot = Some(value.clone());
        }
        self.commit_reorder(&before, after);
    }

    /// Copy the slots in `source` over the slots starting at `target`.
    ///
    /// The copy never grows the list; it stops at the end.
    pub fn copy_within(&self, target: isize, source: Span) {
        let before = self.to_vec();
        let len = before.len();
        let to = index::normalize_clamped(target, len);
        let from = source.resolve(len);
        let count = from.len().min(len - to);
        let mut after = before.clone();
        after[to..to + count].clone_from_slice(&before[from.start..from.start + count]);
        self.commit_reorder(&before, after);
    }

    /// Stable sort by `compare`; absent slots move to the end.
    ///
    /// Fails with [`ListError::ConcurrentMutation`] if the comparator
    /// mutated the list, in which case the ordering is discarded.
    pub fn sort_by(&self, compare: impl FnMut(&T, &T) -> Ordering) -> Result<()> {
        let generation = self.generation();
        let before = self.to_vec();
        let mut values: Vec<T> = before.iter().flatten().cloned().collect();
        values.sort_by(compare);
        self.ensure_generation(generation)?;

        let mut after: Vec<Option<T>> = values.into_iter().map(Some).collect();
        after.resize(before.len(), None);
        self.commit_reorder(&before, after);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Bulk reads
    // -----------------------------------------------------------------------

    /// Call `f` with every present value and its index.
    pub fn for_each(&self, mut f: impl FnMut(&T, usize)) -> Result<()> {
        self.visit(false, |index, value| {
            f(value, index);
            ControlFlow::Continue(())
        })
    }

    /// Map every present value; absent slots stay absent.
    pub fn map<U>(&self, mut f: impl FnMut(&T, usize) -> U) -> Result<Vec<Option<U>>> {
        let mut out = Vec::with_capacity(self.len());
        self.visit_slots(0..self.len(), false, |index, slot| {
            out.push(slot.map(|value| f(value, index)));
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Present values for which `predicate` holds, in order.
    pub fn filter(&self, mut predicate: impl FnMut(&T, usize) -> bool) -> Result<Vec<T>> {
        let mut out = Vec::new();
        self.visit(false, |index, value| {
            if predicate(value, index) {
                out.push(value.clone());
            }
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }

    /// Left-to-right reduction seeded with the first present value.
    ///
    /// Fails with [`ListError::EmptyAggregation`] when no value is present.
    pub fn reduce(&self, f: impl FnMut(T, &T, usize) -> T) -> Result<T> {
        self.reduce_impl(false, f)
    }

    /// Right-to-left reduction seeded with the last present value.
    pub fn reduce_right(&self, f: impl FnMut(T, &T, usize) -> T) -> Result<T> {
        self.reduce_impl(true, f)
    }

    /// Left-to-right reduction from `init`.
    ///
    /// An empty list yields `init`; only a concurrent mutation fails.
    pub fn fold<U>(&self, init: U, f: impl FnMut(U, &T, usize) -> U) -> Result<U> {
        self.fold_impl(false, init, f)
    }

    /// Right-to-left reduction from `init`.
    pub fn fold_right<U>(&self, init: U, f: impl FnMut(U, &T, usize) -> U) -> Result<U> {
        self.fold_impl(true, init, f)
    }

    /// First present value matching `predicate`.
    pub fn find(&self, predicate: impl FnMut(&T, usize) -> bool) -> Result<Option<T>> {
        Ok(self.search(false, predicate)?.map(|(_, value)| value))
    }

    /// Last present value matching `predicate`.
    pub fn find_last(&self, predicate: impl FnMut(&T, usize) -> bool) -> Result<Option<T>> {
        Ok(self.search(true, predicate)?.map(|(_, value)| value))
    }

    /// Index of the first present value matching `predicate`.
    pub fn find_index(&self, predicate: impl FnMut(&T, usize) -> bool) -> Result<Option<usize>> {
        Ok(self.search(false, predicate)?.map(|(index, _)| index))
    }

    /// Index of the last present value matching `predicate`.
    pub fn find_last_index(
        &self,
        predicate: impl FnMut(&T, usize) -> bool,
    ) -> Result<Option<usize>> {
        Ok(self.search(true, predicate)?.map(|(index, _)| index))
    }

    /// Whether `predicate` holds for every present value.
    pub fn every(&self, mut predicate: impl FnMut(&T, usize) -> bool) -> Result<bool> {
        Ok(self
            .search(false, |value, index| !predicate(value, index))?
            .is_none())
    }

    /// Whether `predicate` holds for some present value.
    pub fn some(&self, predicate: impl FnMut(&T, usize) -> bool) -> Result<bool> {
        Ok(self.search(false, predicate)?.is_some())
    }

    /// First index at or after `from` holding `needle`.
    ///
    /// `from` counts from the end when negative; `None` searches everything.
    pub fn index_of(&self, needle: &T, from: Option<isize>) -> Result<Option<usize>> {
        let len = self.len();
        let start = index::normalize_clamped(from.unwrap_or(0), len);
        self.position_in(start..len, false, needle)
    }

    /// Last index at or before `from` holding `needle`.
    ///
    /// `from` counts from the end when negative; `None` searches everything.
    pub fn last_index_of(&self, needle: &T, from: Option<isize>) -> Result<Option<usize>> {
        let len = self.len();
        let end = match from {
            None => len,
            Some(from) if from >= 0 => from.unsigned_abs().saturating_add(1).min(len),
            Some(from) => match len.checked_sub(from.unsigned_abs()) {
                Some(last) => last + 1,
                None => 0,
            },
        };
        self.position_in(0..end, true, needle)
    }

    /// Whether any slot holds `needle`.
    pub fn includes(&self, needle: &T) -> Result<bool> {
        Ok(self.index_of(needle, None)?.is_some())
    }

    /// Forward cursor over slots.
    #[must_use]
    pub fn values(&self) -> Cursor<T, Option<T>> {
        Cursor::new(self, |_, slot| slot)
    }

    /// Forward cursor over indices.
    #[must_use]
    pub fn keys(&self) -> Cursor<T, usize> {
        Cursor::new(self, |index, _| index)
    }

    /// Forward cursor over `(index, slot)` pairs.
    #[must_use]
    pub fn entries(&self) -> Cursor<T, (usize, Option<T>)> {
        Cursor::new(self, |index, slot| (index, slot))
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn ensure_generation(&self, expected: u64) -> Result<()> {
        let found = self.generation();
        if found == expected {
            return Ok(());
        }
        debug!(
            list = self.config.label(),
            expected, found, "concurrent mutation detected"
        );
        Err(ListError::ConcurrentMutation { expected, found })
    }

    /// Visit slots in `range`, checking the generation before each read and
    /// after each callback.
    fn visit_slots<F>(&self, range: Range<usize>, reverse: bool, mut f: F) -> Result<()>
    where
        F: FnMut(usize, Option<&T>) -> ControlFlow<()>,
    {
        let generation = self.generation();
        for step in 0..range.len() {
            let index = if reverse {
                range.end - 1 - step
            } else {
                range.start + step
            };
            self.ensure_generation(generation)?;
            let slot = self.slot(index).flatten();
            let flow = f(index, slot.as_ref());
            self.ensure_generation(generation)?;
            if flow.is_break() {
                break;
            }
        }
        Ok(())
    }

    /// Visit present values only.
    fn visit<F>(&self, reverse: bool, mut f: F) -> Result<()>
    where
        F: FnMut(usize, &T) -> ControlFlow<()>,
    {
        self.visit_slots(0..self.len(), reverse, |index, slot| match slot {
            Some(value) => f(index, value),
            None => ControlFlow::Continue(()),
        })
    }

    fn search(
        &self,
        reverse: bool,
        mut predicate: impl FnMut(&T, usize) -> bool,
    ) -> Result<Option<(usize, T)>> {
        let mut hit = None;
        self.visit(reverse, |index, value| {
            if predicate(value, index) {
                hit = Some((index, value.clone()));
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(hit)
    }

    fn position_in(&self, range: Range<usize>, reverse: bool, needle: &T) -> Result<Option<usize>> {
        let mut hit = None;
        self.visit_slots(range, reverse, |index, slot| {
            if slot == Some(needle) {
                hit = Some(index);
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })?;
        Ok(hit)
    }

    fn reduce_impl(&self, reverse: bool, mut f: impl FnMut(T, &T, usize) -> T) -> Result<T> {
        self.fold_impl(reverse, None, |acc, value, index| {
            Some(match acc {
                Some(prev) => f(prev, value, index),
                None => value.clone(),
            })
        })?
        .ok_or(ListError::EmptyAggregation)
    }

    /// Same checks as [`visit_slots`](Self::visit_slots), with the
    /// accumulator threaded by value.
    fn fold_impl<U>(
        &self,
        reverse: bool,
        init: U,
        mut f: impl FnMut(U, &T, usize) -> U,
    ) -> Result<U> {
        let generation = self.generation();
        let len = self.len();
        let mut acc = init;
        for step in 0..len {
            let index = if reverse { len - 1 - step } else { step };
            self.ensure_generation(generation)?;
            let Some(value) = self.slot(index).flatten() else {
                continue;
            };
            acc = f(acc, &value, index);
            self.ensure_generation(generation)?;
        }
        Ok(acc)
    }

    /// Commit an equal-length rearrangement as one span replace.
    fn commit_reorder(&self, before: &[Option<T>], mut after: Vec<Option<T>>) {
        let Some((first, last)) = differing_span(before, &after) else {
            return;
        };
        after.truncate(last);
        let added = after.split_off(first);
        self.commit(ChangeKind::RangeReplace, first, last - first, added);
    }

    /// Apply one normalized replace, bump the generation, and notify.
    ///
    /// Callers pass `start <= len` and `start + delete_count <= len`.
    /// Returns the removed slots.
    fn commit(
        &self,
        kind: ChangeKind,
        start: usize,
        delete_count: usize,
        added: Vec<Option<T>>,
    ) -> Vec<Option<T>> {
        let (delta, properties, generation, len) = {
            let mut state = self.state.borrow_mut();
            let old_len = state.items.len();
            let end = start + delete_count;
            let in_place = delete_count == added.len();

            let before: Vec<Option<T>> = if in_place {
                state.items[start..end].to_vec()
            } else {
                state.items[start..].to_vec()
            };
            let removed: Vec<Option<T>> = state
                .items
                .splice(start..end, added.iter().cloned())
                .collect();
            let after = if in_place {
                &state.items[start..end]
            } else {
                &state.items[start..]
            };
            let indices = changed_indices(&before, after, start);
            let new_len = state.items.len();

            if indices.is_empty() && new_len == old_len {
                return removed;
            }
            state.generation += 1;
            (
                ChangeDelta {
                    kind,
                    start_index: start,
                    added,
                    removed,
                },
                PropertyChange::new(new_len != old_len, indices),
                state.generation,
                new_len,
            )
        };

        debug!(
            list = self.config.label(),
            kind = kind.as_str(),
            start,
            added = delta.added.len(),
            removed = delta.removed.len(),
            len,
            generation,
            "list mutated"
        );

        self.changed.dispatch(self, &delta);
        self.property_changed.dispatch(self, &properties);
        delta.removed
    }
}

impl<T: Clone + Ord + 'static> ObservableList<T> {
    /// Stable sort by `Ord`; absent slots move to the end.
    pub fn sort(&self) -> Result<()> {
        self.sort_by(T::cmp)
    }
}

impl<T: Clone + PartialEq + fmt::Display + 'static> ObservableList<T> {
    /// Render present values joined by `separator`; absent slots render
    /// empty.
    pub fn join(&self, separator: &str) -> Result<String> {
        let mut out = String::new();
        self.visit_slots(0..self.len(), false, |index, slot| {
            if index > 0 {
                out.push_str(separator);
            }
            if let Some(value) = slot {
                out.push_str(&value.to_string());
            }
            ControlFlow::Continue(())
        })?;
        Ok(out)
    }
}

impl<T: Clone + PartialEq + 'static> From<Vec<T>> for ObservableList<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_vec(values)
    }
}

impl<T: Clone + PartialEq + 'static> FromIterator<T> for ObservableList<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T: Clone + PartialEq + 'static> IntoIterator for &ObservableList<T> {
    type Item = Result<Option<T>>;
    type IntoIter = Cursor<T, Option<T>>;

    fn into_iter(self) -> Self::IntoIter {
        self.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tracing_test::traced_test;

    type Events<T> = Rc<RefCell<Vec<Event<T>>>>;

    #[derive(Debug, Clone, PartialEq)]
    enum Event<T> {
        Change(ChangeDelta<T>),
        Property(Vec<String>),
    }

    fn record<T: Clone + PartialEq + 'static>(
        list: &ObservableList<T>,
    ) -> (Events<T>, Subscription, Subscription) {
        let events: Events<T> = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&events);
        let a = list.subscribe_changes(move |_, delta| {
            log.borrow_mut().push(Event::Change(delta.clone()));
        });
        let log = Rc::clone(&events);
        let b = list.subscribe_properties(move |_, change| {
            log.borrow_mut().push(Event::Property(change.names()));
        });
        (events, a, b)
    }

    fn delta<T>(kind: ChangeKind, start: usize, added: Vec<T>, removed: Vec<T>) -> ChangeDelta<T> {
        ChangeDelta {
            kind,
            start_index: start,
            added: added.into_iter().map(Some).collect(),
            removed: removed.into_iter().map(Some).collect(),
        }
    }

    fn names(keys: &[&str]) -> Vec<String> {
        keys.iter().map(ToString::to_string).collect()
    }

    fn values<T: Clone + PartialEq + 'static>(list: &ObservableList<T>) -> Vec<T> {
        list.to_vec().into_iter().flatten().collect()
    }

    #[test]
    fn reads_like_a_plain_sequence() {
        let list = ObservableList::from_vec(vec![10, 20, 30]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.get(1), Some(20));
        assert_eq!(list.first(), Some(10));
        assert_eq!(list.last(), Some(30));
        assert_eq!(list.generation(), 0);
    }

    #[test]
    fn negative_index_symmetry() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        assert_eq!(list.at(-1), list.at(2));
        assert_eq!(list.at(-3), Some(1));
        assert_eq!(list.at(-8), list.at(0));
        assert_eq!(list.at(3), None);
    }

    #[test]
    fn last_of_empty_is_none() {
        let list: ObservableList<i32> = ObservableList::new();
        assert_eq!(list.last(), None);
    }

    #[test]
    fn push_reports_append() {
        let list = ObservableList::from_vec(vec![1]);
        let (events, _a, _b) = record(&list);

        assert_eq!(list.push([2, 3]), 3);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::Append, 1, vec![2, 3], vec![])),
                Event::Property(names(&["length", "1", "2"])),
            ]
        );
        assert_eq!(list.generation(), 1);
    }

    #[test]
    fn empty_push_is_silent() {
        let list = ObservableList::from_vec(vec![1]);
        let (events, _a, _b) = record(&list);
        assert_eq!(list.push(Vec::new()), 1);
        assert_eq!(list.unshift(Vec::new()), 1);
        assert!(events.borrow().is_empty());
        assert_eq!(list.generation(), 0);
    }

    #[test]
    fn pop_on_empty_is_silent() {
        let list: ObservableList<i32> = ObservableList::new();
        let (events, _a, _b) = record(&list);
        assert_eq!(list.pop(), None);
        assert_eq!(list.shift(), None);
        assert!(events.borrow().is_empty());
        assert!(list.is_empty());
    }

    #[test]
    fn pop_reports_remove_last() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let (events, _a, _b) = record(&list);
        assert_eq!(list.pop(), Some(2));
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::RemoveLast, 1, vec![], vec![2])),
                Event::Property(names(&["length"])),
            ]
        );
    }

    #[test]
    fn unshift_reports_prepend_and_shifted_indices() {
        let list = ObservableList::from_vec(vec![5, 5, 7]);
        let (events, _a, _b) = record(&list);
        assert_eq!(list.unshift([5]), 4);
        assert_eq!(values(&list), vec![5, 5, 5, 7]);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::Prepend, 0, vec![5], vec![])),
                // Index 0 and 1 still hold 5; 2 went 7 -> 5; 3 is new.
                Event::Property(names(&["length", "2", "3"])),
            ]
        );
    }

    #[test]
    fn shift_reports_remove_first() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (events, _a, _b) = record(&list);
        assert_eq!(list.shift(), Some(1));
        assert_eq!(values(&list), vec![2, 3]);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::RemoveFirst, 0, vec![], vec![1])),
                Event::Property(names(&["length", "0", "1"])),
            ]
        );
    }

    #[test]
    fn splice_scenario() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (events, _a, _b) = record(&list);
        let removed = list.splice(1, 2, [9]);
        assert_eq!(removed, vec![Some(2), Some(3)]);
        assert_eq!(values(&list), vec![1, 9]);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::RangeReplace, 1, vec![9], vec![2, 3])),
                Event::Property(names(&["length", "1"])),
            ]
        );
    }

    #[test]
    fn splice_clamps_start_and_count() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        assert_eq!(list.splice(-2, 99, []), vec![Some(2), Some(3)]);
        assert_eq!(values(&list), vec![1]);
        assert_eq!(list.splice(50, 1, [4]), Vec::new());
        assert_eq!(values(&list), vec![1, 4]);
    }

    #[test]
    fn zero_splice_is_silent() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let (events, _a, _b) = record(&list);
        assert!(list.splice(1, 0, []).is_empty());
        assert!(events.borrow().is_empty());
        assert_eq!(list.generation(), 0);
    }

    #[test]
    fn set_in_place() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (events, _a, _b) = record(&list);
        list.set(-1, 30).unwrap();
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::RangeReplace, 2, vec![30], vec![3])),
                Event::Property(names(&["2"])),
            ]
        );
    }

    #[test]
    fn set_same_value_is_silent() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (events, _a, _b) = record(&list);
        list.set(1, 2).unwrap();
        assert!(events.borrow().is_empty());
        assert_eq!(list.generation(), 0);
    }

    #[test]
    fn set_expands_with_holes() {
        let list = ObservableList::from_vec(vec![1]);
        let (events, _a, _b) = record(&list);
        list.set(3, 4).unwrap();
        assert_eq!(list.to_vec(), vec![Some(1), None, None, Some(4)]);
        assert_eq!(list.at(1), None);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(ChangeDelta {
                    kind: ChangeKind::RangeReplace,
                    start_index: 1,
                    added: vec![None, None, Some(4)],
                    removed: vec![],
                }),
                Event::Property(names(&["length", "1", "2", "3"])),
            ]
        );
    }

    #[test]
    fn expanding_set_past_addressable_memory_fails_cleanly() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let (events, _a, _b) = record(&list);
        assert_eq!(
            list.set(isize::MAX, 9),
            Err(ListError::IndexOutOfBounds {
                index: isize::MAX,
                len: 2
            })
        );
        assert_eq!(list.to_vec(), vec![Some(1), Some(2)]);
        assert_eq!(list.generation(), 0);
        assert!(events.borrow().is_empty());

        list.set(3, 4).unwrap();
        assert_eq!(list.to_vec(), vec![Some(1), Some(2), None, Some(4)]);
    }

    #[test]
    fn strict_set_rejects_and_leaves_list_untouched() {
        let list = ObservableList::from_vec_with_config(vec![1, 2], ListConfig::strict());
        let (events, _a, _b) = record(&list);
        assert_eq!(
            list.set(2, 9),
            Err(ListError::IndexOutOfBounds { index: 2, len: 2 })
        );
        assert_eq!(
            list.set(-3, 9),
            Err(ListError::IndexOutOfBounds { index: -3, len: 2 })
        );
        assert_eq!(values(&list), vec![1, 2]);
        assert!(events.borrow().is_empty());

        list.set(-2, 9).unwrap();
        assert_eq!(values(&list), vec![9, 2]);
    }

    #[test]
    fn insert_remove_clear() {
        let list = ObservableList::from_vec(vec![1, 3]);
        list.insert(1, 2);
        assert_eq!(values(&list), vec![1, 2, 3]);
        assert_eq!(list.remove(-1), Some(3));
        assert_eq!(list.remove(5), None);
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn sort_scenario_reports_every_moved_index() {
        let list = ObservableList::from_vec(vec![3, 1, 2]);
        let (events, _a, _b) = record(&list);
        list.sort().unwrap();
        assert_eq!(values(&list), vec![1, 2, 3]);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(
                    ChangeKind::RangeReplace,
                    0,
                    vec![1, 2, 3],
                    vec![3, 1, 2]
                )),
                Event::Property(names(&["0", "1", "2"])),
            ]
        );
    }

    #[test]
    fn sort_reports_only_changed_indices() {
        let list = ObservableList::from_vec(vec![1, 4, 3, 2, 5]);
        let (events, _a, _b) = record(&list);
        list.sort().unwrap();
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(
                    ChangeKind::RangeReplace,
                    1,
                    vec![2, 3, 4],
                    vec![4, 3, 2]
                )),
                Event::Property(names(&["1", "3"])),
            ]
        );
    }

    #[test]
    fn sorted_list_sort_is_silent() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (events, _a, _b) = record(&list);
        list.sort().unwrap();
        list.sort_by(|a, b| a.cmp(b)).unwrap();
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn sort_moves_holes_last() {
        let list = ObservableList::from_vec(vec![2]);
        list.set(2, 1).unwrap();
        list.sort().unwrap();
        assert_eq!(list.to_vec(), vec![Some(1), Some(2), None]);
    }

    #[test]
    fn comparator_mutation_discards_sort() {
        let list = ObservableList::from_vec(vec![3, 1, 2]);
        let inner = list.clone();
        let mutated = Cell::new(false);
        let result = list.sort_by(|a, b| {
            if !mutated.replace(true) {
                inner.push([0]);
            }
            a.cmp(b)
        });
        assert!(matches!(result, Err(ListError::ConcurrentMutation { .. })));
        assert_eq!(values(&list), vec![3, 1, 2, 0]);
    }

    #[test]
    fn reverse_palindrome_is_silent() {
        let list = ObservableList::from_vec(vec![1, 2, 1]);
        let (events, _a, _b) = record(&list);
        list.reverse();
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn reverse_reports_outer_indices() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let (events, _a, _b) = record(&list);
        list.reverse();
        assert_eq!(values(&list), vec![3, 2, 1]);
        assert_eq!(
            events.borrow()[1],
            Event::Property(names(&["0", "2"]))
        );
    }

    #[test]
    fn fill_span() {
        let list = ObservableList::from_vec(vec![0, 0, 1, 1]);
        let (events, _a, _b) = record(&list);
        list.fill(0, Span::from(1));
        assert_eq!(values(&list), vec![0, 0, 0, 0]);
        assert_eq!(
            *events.borrow(),
            vec![
                Event::Change(delta(ChangeKind::RangeReplace, 2, vec![0, 0], vec![1, 1])),
                Event::Property(names(&["2", "3"])),
            ]
        );
    }

    #[test]
    fn copy_within_stops_at_end() {
        let list = ObservableList::from_vec(vec![1, 2, 3, 4, 5]);
        list.copy_within(3, Span::all());
        assert_eq!(values(&list), vec![1, 2, 3, 1, 2]);
        list.copy_within(0, Span::new(-2, -1));
        assert_eq!(values(&list), vec![1, 2, 3, 1, 2]);
        list.copy_within(-1, Span::new(2, 3));
        assert_eq!(values(&list), vec![1, 2, 3, 1, 3]);
    }

    #[test]
    fn bulk_reads() {
        let list = ObservableList::from_vec(vec![1, 2, 3, 4]);
        let mut seen = Vec::new();
        list.for_each(|v, i| seen.push((i, *v))).unwrap();
        assert_eq!(seen, vec![(0, 1), (1, 2), (2, 3), (3, 4)]);

        assert_eq!(
            list.map(|v, _| v * 10).unwrap(),
            vec![Some(10), Some(20), Some(30), Some(40)]
        );
        assert_eq!(list.filter(|v, _| v % 2 == 0).unwrap(), vec![2, 4]);
        assert_eq!(list.reduce(|acc, v, _| acc + v).unwrap(), 10);
        assert_eq!(
            list.reduce_right(|acc, v, _| acc * 10 + v).unwrap(),
            4321
        );
        assert_eq!(
            list.fold(String::new(), |acc, v, _| format!("{acc}{v}")).unwrap(),
            "1234"
        );
        assert_eq!(list.fold_right(0, |acc, v, _| acc - v).unwrap(), -10);
        assert_eq!(list.find(|v, _| *v > 2).unwrap(), Some(3));
        assert_eq!(list.find_last(|v, _| *v < 3).unwrap(), Some(2));
        assert_eq!(list.find_index(|v, _| *v == 4).unwrap(), Some(3));
        assert_eq!(list.find_last_index(|v, _| *v > 9).unwrap(), None);
        assert!(list.every(|v, _| *v > 0).unwrap());
        assert!(!list.some(|v, _| *v > 4).unwrap());
    }

    #[test]
    fn reduce_empty_fails() {
        let list: ObservableList<i32> = ObservableList::new();
        assert_eq!(
            list.reduce(|acc, v, _| acc + v),
            Err(ListError::EmptyAggregation)
        );
        assert_eq!(list.fold(7, |acc, v, _| acc + v), Ok(7));
    }

    #[test]
    fn holes_skipped_by_callbacks() {
        let list = ObservableList::from_vec(vec![1]);
        list.set(2, 3).unwrap();
        assert_eq!(list.map(|v, _| *v).unwrap(), vec![Some(1), None, Some(3)]);
        assert_eq!(list.filter(|_, _| true).unwrap(), vec![1, 3]);
        assert_eq!(list.reduce(|a, v, _| a + v).unwrap(), 4);
        assert_eq!(list.join("-").unwrap(), "1--3");
    }

    #[test]
    fn searches() {
        let list = ObservableList::from_vec(vec!['a', 'b', 'a', 'c']);
        assert_eq!(list.index_of(&'a', None).unwrap(), Some(0));
        assert_eq!(list.index_of(&'a', Some(1)).unwrap(), Some(2));
        assert_eq!(list.index_of(&'a', Some(-1)).unwrap(), None);
        assert_eq!(list.last_index_of(&'a', None).unwrap(), Some(2));
        assert_eq!(list.last_index_of(&'a', Some(1)).unwrap(), Some(0));
        assert_eq!(list.last_index_of(&'a', Some(-3)).unwrap(), Some(0));
        assert_eq!(list.last_index_of(&'a', Some(-9)).unwrap(), None);
        assert!(list.includes(&'c').unwrap());
        assert!(!list.includes(&'z').unwrap());
    }

    #[test]
    fn self_mutation_inside_for_each_fails() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let inner = list.clone();
        let mut calls = 0;
        let result = list.for_each(|_, _| {
            calls += 1;
            inner.push([4]);
        });
        assert_eq!(
            result,
            Err(ListError::ConcurrentMutation {
                expected: 0,
                found: 1
            })
        );
        assert_eq!(calls, 1);
    }

    #[test]
    fn self_mutation_inside_find_fails_even_on_match() {
        let list = ObservableList::from_vec(vec![1, 2, 3]);
        let inner = list.clone();
        let result = list.find(|v, _| {
            inner.set(2, 0).unwrap();
            *v == 1
        });
        assert!(matches!(result, Err(ListError::ConcurrentMutation { .. })));
    }

    #[test]
    fn handler_mutation_runs_to_completion() {
        let list = ObservableList::from_vec(vec![1]);
        let inner = list.clone();
        let _sub = list.subscribe_changes(move |_, delta| {
            if delta.kind == ChangeKind::Append && inner.len() < 4 {
                inner.push([0]);
            }
        });
        list.push([2]);
        assert_eq!(values(&list), vec![1, 2, 0, 0]);
        assert_eq!(list.generation(), 3);
    }

    #[test]
    fn change_fires_before_property() {
        let list = ObservableList::from_vec(vec![1]);
        let order = Rc::new(RefCell::new(Vec::new()));
        let o = Rc::clone(&order);
        let _p = list.subscribe_properties(move |_, _| o.borrow_mut().push("property"));
        let o = Rc::clone(&order);
        let _c = list.subscribe_changes(move |_, _| o.borrow_mut().push("change"));
        list.push([2]);
        assert_eq!(*order.borrow(), vec!["change", "property"]);
    }

    #[test]
    fn handler_sees_subject_and_post_state() {
        let list = ObservableList::from_vec(vec![1]);
        let observed = Rc::new(RefCell::new(None));
        let o = Rc::clone(&observed);
        let original = list.clone();
        let _sub = list.subscribe_changes(move |subject, _| {
            assert!(subject.ptr_eq(&original));
            *o.borrow_mut() = Some(subject.to_vec());
        });
        list.push([2]);
        assert_eq!(*observed.borrow(), Some(vec![Some(1), Some(2)]));
    }

    #[test]
    fn to_vec_is_independent() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let mut copy = list.to_vec();
        copy.push(Some(3));
        assert_eq!(list.len(), 2);
        assert_eq!(list.slice(Span::from(-1)), vec![Some(2)]);
    }

    #[test]
    fn clone_shares_state() {
        let a = ObservableList::from_vec(vec![1]);
        let b = a.clone();
        b.push([2]);
        assert_eq!(a.len(), 2);
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&ObservableList::from_vec(vec![1, 2])));
    }

    #[test]
    fn collect_and_from() {
        let list: ObservableList<i32> = (1..=3).collect();
        assert_eq!(values(&list), vec![1, 2, 3]);
        let list = ObservableList::from(vec!["x"]);
        assert_eq!(list.get(0), Some("x"));
    }

    #[test]
    fn debug_format() {
        let list = ObservableList::with_config(ListConfig::default().with_label("rows"));
        list.push([7]);
        let dbg = format!("{list:?}");
        assert!(dbg.contains("ObservableList"));
        assert!(dbg.contains("rows"));
        assert!(dbg.contains("generation: 1"));
    }

    #[traced_test]
    #[test]
    fn mutation_is_logged() {
        let list = ObservableList::with_config(ListConfig::default().with_label("todo"));
        list.push(["write tests"]);
        assert!(logs_contain("list mutated"));
        assert!(logs_contain("append"));
    }

    #[traced_test]
    #[test]
    fn concurrent_mutation_is_logged() {
        let list = ObservableList::from_vec(vec![1, 2]);
        let inner = list.clone();
        let _ = list.for_each(|_, _| {
            inner.pop();
        });
        assert!(logs_contain("concurrent mutation detected"));
    }
}
