//! Property-based invariant tests for index arithmetic and event channels.
//!
//! **Index arithmetic:**
//! 1. Non-negative indices are returned unchanged.
//! 2. Negative indices equal `max(0, index + len)`.
//! 3. Resolved spans lie within `0..=len` and are never inverted.
//! 4. Strict resolution succeeds exactly for `-len <= index < len`.
//!
//! **Event channel:**
//! 5. Dispatch invokes each live entry once, in subscription order, with
//!    duplicates counted separately.
//! 6. Unsubscribe removes the first matching entry only.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use statebind_core::index::{Span, normalize, strict_index};
use statebind_core::{EventChannel, Handler};

// ── Strategies ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum ChannelOp {
    Subscribe(usize),
    Unsubscribe(usize),
}

fn channel_ops() -> impl Strategy<Value = Vec<ChannelOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0usize..4).prop_map(ChannelOp::Subscribe),
            (0usize..4).prop_map(ChannelOp::Unsubscribe),
        ],
        0..32,
    )
}

// ── Index arithmetic ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn normalize_matches_definition(index in -64isize..64, len in 0usize..32) {
        let expected = if index >= 0 {
            index as usize
        } else {
            (index + len as isize).max(0) as usize
        };
        prop_assert_eq!(normalize(index, len), expected);
    }

    #[test]
    fn span_resolution_in_bounds(
        start in -64isize..64,
        end in proptest::option::of(-64isize..64),
        len in 0usize..32,
    ) {
        let range = Span { start, end }.resolve(len);
        prop_assert!(range.start <= range.end);
        prop_assert!(range.end <= len);
    }

    #[test]
    fn strict_index_accepts_exactly_addressable(index in -64isize..64, len in 0usize..32) {
        let addressable = index < len as isize && index >= -(len as isize);
        match strict_index(index, len) {
            Ok(resolved) => {
                prop_assert!(addressable);
                prop_assert_eq!(resolved, normalize(index, len));
            }
            Err(_) => prop_assert!(!addressable),
        }
    }
}

// ── Event channel ─────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn dispatch_matches_subscription_model(ops in channel_ops()) {
        let chan: EventChannel<(), ()> = EventChannel::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let handlers: Vec<Handler<(), ()>> = (0..4)
            .map(|tag| {
                let log = Rc::clone(&log);
                Rc::new(move |_: &(), _: &()| log.borrow_mut().push(tag)) as Handler<(), ()>
            })
            .collect();

        let mut model: Vec<usize> = Vec::new();
        for op in &ops {
            match op {
                ChannelOp::Subscribe(tag) => {
                    chan.subscribe(Rc::clone(&handlers[*tag]));
                    model.push(*tag);
                }
                ChannelOp::Unsubscribe(tag) => {
                    let removed = chan.unsubscribe(&handlers[*tag]);
                    let pos = model.iter().position(|t| t == tag);
                    prop_assert_eq!(removed, pos.is_some());
                    if let Some(pos) = pos {
                        model.remove(pos);
                    }
                }
            }
        }

        let invoked = chan.dispatch(&(), &());
        prop_assert_eq!(invoked, model.len());
        prop_assert_eq!(&*log.borrow(), &model);
        prop_assert_eq!(chan.subscriber_count(), model.len());
    }
}
