#![forbid(unsafe_code)]

//! Minimal publish/subscribe channel with dispatch-time snapshots.
//!
//! # Design
//!
//! An [`EventChannel<S, A>`] keeps an ordered list of handler entries in
//! shared storage (`Rc<RefCell<..>>`). Each handler receives the subject that
//! raised the event and the event arguments. Cloning a channel yields a new
//! handle to the **same** subscriber list.
//!
//! Handlers are identified by `Rc` pointer identity. The same handler may be
//! subscribed several times; every entry is invoked separately and
//! [`unsubscribe`](EventChannel::unsubscribe) removes only the first one.
//!
//! # Invariants
//!
//! 1. Dispatch invokes the entries present when dispatch started, in
//!    subscription order.
//! 2. An entry removed by an earlier handler in the same dispatch is skipped.
//! 3. An entry added during a dispatch is not invoked by that dispatch.
//! 4. No borrow of the subscriber list is held while a handler runs, so
//!    handlers may freely subscribe, unsubscribe, or dispatch again.
//!
//! # Failure Modes
//!
//! - **Dispatch with no subscribers**: returns 0, never an error.
//! - **Unsubscribe of an unknown handler**: returns `false`.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// A shared event handler. Identity is the `Rc` allocation.
pub type Handler<S, A> = Rc<dyn Fn(&S, &A)>;

struct Entry<S: ?Sized, A: ?Sized> {
    id: u64,
    handler: Handler<S, A>,
}

struct ChannelInner<S: ?Sized, A: ?Sized> {
    entries: Vec<Entry<S, A>>,
    next_id: u64,
}

impl<S: ?Sized, A: ?Sized> ChannelInner<S, A> {
    fn insert(&mut self, handler: Handler<S, A>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry { id, handler });
        id
    }

    /// Detach the entry with `id`. The caller drops it after releasing the
    /// borrow, since the handler may own guards for this same channel.
    fn remove_id(&mut self, id: u64) -> Option<Entry<S, A>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    fn contains_id(&self, id: u64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }
}

/// An ordered, identity-based publish/subscribe channel.
pub struct EventChannel<S: ?Sized, A: ?Sized> {
    inner: Rc<RefCell<ChannelInner<S, A>>>,
}

// Manual Clone: shares the same subscriber list.
impl<S: ?Sized, A: ?Sized> Clone for EventChannel<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: ?Sized, A: ?Sized> Default for EventChannel<S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized, A: ?Sized> std::fmt::Debug for EventChannel<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

impl<S: ?Sized, A: ?Sized> EventChannel<S, A> {
    /// Create a channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ChannelInner {
                entries: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Append `handler` to the subscriber list.
    ///
    /// Subscribing the same handler twice registers two entries.
    pub fn subscribe(&self, handler: Handler<S, A>) {
        self.inner.borrow_mut().insert(handler);
    }

    /// Remove the first entry whose handler is `handler` (by identity).
    ///
    /// Returns `true` if an entry was removed.
    pub fn unsubscribe(&self, handler: &Handler<S, A>) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            inner
                .entries
                .iter()
                .position(|e| Rc::ptr_eq(&e.handler, handler))
                .map(|pos| inner.entries.remove(pos))
        };
        removed.is_some()
    }

    /// Number of registered entries (duplicates counted separately).
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Whether no handler is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.inner.borrow_mut().entries);
        drop(removed);
    }

    /// Invoke every entry present at dispatch start, in subscription order.
    ///
    /// Entries removed by an earlier handler during this dispatch are
    /// skipped. Returns the number of handlers invoked.
    pub fn dispatch(&self, subject: &S, args: &A) -> usize {
        // Snapshot without holding the borrow during handler calls.
        let snapshot: Vec<(u64, Handler<S, A>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|e| (e.id, Rc::clone(&e.handler)))
            .collect();

        let mut invoked = 0;
        for (id, handler) in &snapshot {
            if !self.inner.borrow().contains_id(*id) {
                continue;
            }
            handler(subject, args);
            invoked += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(
            snapshot = snapshot.len(),
            invoked,
            "event channel dispatched"
        );

        invoked
    }
}

impl<S: ?Sized + 'static, A: ?Sized + 'static> EventChannel<S, A> {
    /// Subscribe a closure and return the handler for later
    /// [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe_fn(&self, f: impl Fn(&S, &A) + 'static) -> Handler<S, A> {
        let handler: Handler<S, A> = Rc::new(f);
        self.subscribe(Rc::clone(&handler));
        handler
    }

    /// Subscribe a closure and return a [`Subscription`] guard.
    ///
    /// Dropping the guard removes exactly the entry it created, even if the
    /// same closure was subscribed elsewhere.
    pub fn subscribe_scoped(&self, f: impl Fn(&S, &A) + 'static) -> Subscription {
        let id = self.inner.borrow_mut().insert(Rc::new(f));
        Subscription {
            _guard: Box::new(EntryGuard {
                channel: Rc::downgrade(&self.inner),
                id,
            }),
        }
    }
}

/// Removes its entry from the channel on drop.
struct EntryGuard<S: ?Sized, A: ?Sized> {
    channel: Weak<RefCell<ChannelInner<S, A>>>,
    id: u64,
}

impl<S: ?Sized, A: ?Sized> Drop for EntryGuard<S, A> {
    fn drop(&mut self) {
        let Some(inner) = self.channel.upgrade() else {
            return;
        };
        // Entries are always dropped outside the borrow, so a guard owned by
        // a handler being removed still finds the channel free.
        let removed = match inner.try_borrow_mut() {
            Ok(mut inner) => inner.remove_id(self.id),
            Err(_) => None,
        };
        drop(removed);
    }
}

/// RAII guard for a scoped subscription.
///
/// Dropping the `Subscription` removes the entry immediately; a dispatch
/// already in progress skips it from that point on.
pub struct Subscription {
    /// Type-erased guard that detaches the entry when dropped.
    _guard: Box<dyn std::any::Any>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}
