#![forbid(unsafe_code)]

//! Subscription surface exposed to collaborators.
//!
//! Validation triggers, UI bindings, and mirrors depend on these traits
//! rather than on a concrete container, so keyed or unordered variants can
//! plug into the same consumers.

use statebind_core::EventChannel;

use super::ObservableList;
use super::delta::{ChangeDelta, PropertyChange};

/// A source of structural change deltas.
///
/// A handler may mutate the source while an earlier delta is still being
/// delivered, so consumers can see deltas out of order. `generation` and
/// `snapshot` let them detect that and start over from the current state.
pub trait NotifyCollectionChanged<T>: Sized {
    /// Channel fired once per structural mutation.
    fn collection_changed(&self) -> &EventChannel<Self, ChangeDelta<T>>;

    /// Counter bumped by exactly one per structural mutation.
    fn generation(&self) -> u64;

    /// Copy of the current slots.
    fn snapshot(&self) -> Vec<Option<T>>;
}

/// A source of property-change names.
pub trait NotifyPropertyChanged: Sized {
    /// Channel fired once per mutation, after the structural change.
    fn property_changed(&self) -> &EventChannel<Self, PropertyChange>;
}

impl<T: Clone + PartialEq + 'static> NotifyCollectionChanged<T> for ObservableList<T> {
    fn collection_changed(&self) -> &EventChannel<Self, ChangeDelta<T>> {
        self.changed()
    }

    fn generation(&self) -> u64 {
        ObservableList::generation(self)
    }

    fn snapshot(&self) -> Vec<Option<T>> {
        self.to_vec()
    }
}

impl<T> NotifyPropertyChanged for ObservableList<T> {
    fn property_changed(&self) -> &EventChannel<Self, PropertyChange> {
        ObservableList::property_changed(self)
    }
}
