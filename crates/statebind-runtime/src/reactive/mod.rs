#![forbid(unsafe_code)]

//! Reactive collections for statebind.
//!
//! This module provides change-tracking containers for reactive UI updates:
//!
//! - [`ObservableList`]: A shared, generation-tracked ordered list that
//!   reports every mutation as one normalized [`ChangeDelta`] plus a
//!   minimal [`PropertyChange`].
//! - [`Cursor`]: Generation-checked iteration that fails on concurrent
//!   mutation.
//! - [`Mirror`] / [`DirtyTracker`]: Consumers that follow a list through its
//!   notifications.
//!
//! # Architecture
//!
//! `ObservableList<T>` uses `Rc<RefCell<..>>` for single-threaded shared
//! ownership. Event channels come from `statebind-core` and snapshot their
//! subscribers at dispatch start.
//!
//! # Invariants
//!
//! 1. The generation changes exactly once per mutation that changes a slot
//!    or the length.
//! 2. Each such mutation fires the change channel, then the property
//!    channel, synchronously and once.
//! 3. Mutations that change nothing (empty push, pop on empty, zero splice,
//!    already-ordered sort) fire nothing.
//! 4. Reads in progress fail with `ConcurrentMutation` at the first step
//!    after the generation moved.

pub mod config;
pub mod cursor;
pub mod delta;
pub mod mirror;
pub mod notify;
pub mod observable_list;

pub use config::{ListConfig, WritePolicy};
pub use cursor::Cursor;
pub use delta::{ChangeDelta, ChangeKind, PropertyChange, PropertyKey};
pub use mirror::{DirtySet, DirtyTracker, Mirror};
pub use notify::{NotifyCollectionChanged, NotifyPropertyChanged};
pub use observable_list::{ChangeChannel, ObservableList, PropertyChannel};
