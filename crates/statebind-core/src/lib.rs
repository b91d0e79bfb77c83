#![forbid(unsafe_code)]

//! Core: event channels, index arithmetic, and errors for statebind.
//!
//! # Role in statebind
//! `statebind-core` holds the leaf primitives every observable container is
//! built from. It has no notion of items or views; the runtime
//! (`statebind-runtime`) composes these into the observable list.
//!
//! # Primary responsibilities
//! - **EventChannel**: ordered, identity-based publish/subscribe with
//!   dispatch-time snapshots and RAII subscriptions.
//! - **Index arithmetic**: negative-index normalization, strict bounds, and
//!   relative spans.
//! - **ListError**: the shared error taxonomy.

pub mod error;
pub mod event;
pub mod index;

pub use error::{ListError, Result};
pub use event::{EventChannel, Handler, Subscription};
pub use index::{Span, normalize};
