#![forbid(unsafe_code)]

//! Consumers that follow a collection through its notifications.
//!
//! - [`Mirror`] keeps a plain `Vec` in sync by replaying every
//!   [`ChangeDelta`](super::ChangeDelta), the way a row cache in a view layer
//!   would, falling back to a snapshot when deltas arrive out of order.
//! - [`DirtyTracker`] accumulates the indices named by property changes so a
//!   renderer redraws only rows that actually changed.
//!
//! Both hold a [`Subscription`]; dropping them detaches from the source.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::Rc;

use statebind_core::Subscription;
use tracing::debug;

use super::notify::{NotifyCollectionChanged, NotifyPropertyChanged};

/// A plain copy of a collection, patched from its change deltas.
///
/// A handler subscribed ahead of the mirror may mutate the source while a
/// change is still being delivered; the mirror then receives the nested
/// delta before the outer one. Each delta is replayed only when the source
/// is exactly one generation ahead and the delta fits the current rows;
/// otherwise the mirror copies a fresh snapshot, and deltas that arrive
/// after it already caught up are ignored.
pub struct Mirror<T> {
    state: Rc<RefCell<MirrorState<T>>>,
    applied: Rc<Cell<usize>>,
    resyncs: Rc<Cell<usize>>,
    _subscription: Subscription,
}

struct MirrorState<T> {
    rows: Vec<Option<T>>,
    /// Source generation the rows correspond to.
    generation: u64,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Mirror<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Mirror")
            .field("rows", &state.rows)
            .field("generation", &state.generation)
            .field("applied", &self.applied.get())
            .field("resyncs", &self.resyncs.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Mirror<T> {
    /// Follow `source` from its current contents.
    pub fn attach<C>(source: &C) -> Self
    where
        C: NotifyCollectionChanged<T> + 'static,
    {
        let state = Rc::new(RefCell::new(MirrorState {
            rows: source.snapshot(),
            generation: source.generation(),
        }));
        let applied = Rc::new(Cell::new(0));
        let resyncs = Rc::new(Cell::new(0));
        let subscription = {
            let state = Rc::clone(&state);
            let applied = Rc::clone(&applied);
            let resyncs = Rc::clone(&resyncs);
            source
                .collection_changed()
                .subscribe_scoped(move |subject: &C, delta| {
                    let generation = subject.generation();
                    let mut state = state.borrow_mut();
                    if generation == state.generation {
                        return;
                    }
                    if generation == state.generation + 1 && delta.fits(&state.rows) {
                        delta.apply_to(&mut state.rows);
                        applied.set(applied.get() + 1);
                    } else {
                        debug!(
                            expected = state.generation + 1,
                            found = generation,
                            kind = %delta.kind,
                            "mirror out of step, resyncing"
                        );
                        state.rows = subject.snapshot();
                        resyncs.set(resyncs.get() + 1);
                    }
                    state.generation = generation;
                })
        };
        Self {
            state,
            applied,
            resyncs,
            _subscription: subscription,
        }
    }

    /// Copy of the mirrored slots.
    #[must_use]
    pub fn rows(&self) -> Vec<Option<T>> {
        self.state.borrow().rows.clone()
    }

    /// Access the mirrored slots without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&[Option<T>]) -> R) -> R {
        f(&self.state.borrow().rows)
    }

    /// Number of deltas replayed so far.
    #[must_use]
    pub fn applied(&self) -> usize {
        self.applied.get()
    }

    /// Number of times the mirror fell back to a full snapshot.
    #[must_use]
    pub fn resyncs(&self) -> usize {
        self.resyncs.get()
    }
}

#[derive(Debug, Default)]
struct Dirty {
    length: bool,
    indices: BTreeSet<usize>,
}

/// Pending redraw work collected from property changes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtySet {
    /// Whether the length changed since the last take.
    pub length: bool,
    /// Indices whose slot changed since the last take, ascending.
    pub indices: Vec<usize>,
}

impl DirtySet {
    /// Whether there is nothing to redraw.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.length && self.indices.is_empty()
    }
}

/// Accumulates changed indices until a renderer takes them.
pub struct DirtyTracker {
    dirty: Rc<RefCell<Dirty>>,
    _subscription: Subscription,
}

impl std::fmt::Debug for DirtyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtyTracker")
            .field("dirty", &self.dirty.borrow())
            .finish()
    }
}

impl DirtyTracker {
    /// Start tracking `source`.
    pub fn attach<C: NotifyPropertyChanged + 'static>(source: &C) -> Self {
        let dirty = Rc::new(RefCell::new(Dirty::default()));
        let sink = Rc::clone(&dirty);
        let subscription = source.property_changed().subscribe_scoped(move |_, change| {
            let mut sink = sink.borrow_mut();
            sink.length |= change.length_changed();
            sink.indices.extend(change.indices());
        });
        Self {
            dirty,
            _subscription: subscription,
        }
    }

    /// Whether anything changed since the last [`take`](Self::take).
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        let dirty = self.dirty.borrow();
        dirty.length || !dirty.indices.is_empty()
    }

    /// Return and clear the pending work.
    pub fn take(&self) -> DirtySet {
        let mut dirty = self.dirty.borrow_mut();
        DirtySet {
            length: std::mem::take(&mut dirty.length),
            indices: std::mem::take(&mut dirty.indices).into_iter().collect(),
        }
    }
}
