#![forbid(unsafe_code)]

//! Runtime: observable collections for statebind.
//!
//! # Role in statebind
//! `statebind-runtime` owns the mutable containers UI components bind to.
//! It builds on the channels, index arithmetic, and errors in
//! `statebind-core`.
//!
//! # Example
//!
//! ```
//! use statebind_runtime::reactive::{ChangeKind, ObservableList};
//!
//! let list = ObservableList::from_vec(vec![1, 2, 3]);
//! let _sub = list.subscribe_changes(|_, delta| {
//!     assert_eq!(delta.kind, ChangeKind::RangeReplace);
//!     assert_eq!(delta.start_index, 1);
//! });
//! list.splice(1, 2, [9]);
//! assert_eq!(list.to_vec(), vec![Some(1), Some(9)]);
//! ```

pub mod reactive;

pub use reactive::{
    ChangeDelta, ChangeKind, ListConfig, ObservableList, PropertyChange, WritePolicy,
};
pub use statebind_core::{EventChannel, Handler, ListError, Result, Span, Subscription};
