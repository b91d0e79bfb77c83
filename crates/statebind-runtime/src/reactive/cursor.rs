#![forbid(unsafe_code)]

//! Generation-checked cursors over an [`ObservableList`].
//!
//! A [`Cursor`] captures the list generation when it is created and compares
//! it before producing every element. Any structural mutation in between,
//! including one made by the code consuming the cursor, turns the next step
//! into [`ListError::ConcurrentMutation`].
//!
//! # Bounds
//!
//! The end bound is fixed at creation and re-clamped to the current length
//! after each step. A cursor never widens to cover items appended later; such
//! an append bumps the generation and fails the cursor on its next step
//! anyway.
//!
//! # Completion
//!
//! After it completes (end reached, error yielded, or [`Cursor::cancel`]) a
//! cursor returns `None` forever and performs no further checks.

use std::iter::FusedIterator;

use statebind_core::{ListError, Result};

use super::ObservableList;

/// Builds the produced value from a position and its slot.
pub type Producer<T, V> = fn(usize, Option<T>) -> V;

/// A single-pass, forward-only read position over a list.
pub struct Cursor<T, V> {
    list: ObservableList<T>,
    position: usize,
    end: usize,
    generation: u64,
    done: bool,
    produce: Producer<T, V>,
}

impl<T, V> std::fmt::Debug for Cursor<T, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("position", &self.position)
            .field("end", &self.end)
            .field("generation", &self.generation)
            .field("done", &self.done)
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static, V> Cursor<T, V> {
    /// Start a cursor at position 0 with the list's current generation.
    pub fn new(list: &ObservableList<T>, produce: Producer<T, V>) -> Self {
        Self {
            list: list.clone(),
            position: 0,
            end: list.len(),
            generation: list.generation(),
            done: false,
            produce,
        }
    }

    /// Next position to be produced.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the cursor has completed.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Complete the cursor permanently. Idempotent.
    pub fn cancel(&mut self) {
        self.done = true;
    }

    fn step(&mut self) -> Option<Result<V>> {
        if self.done || self.position >= self.end {
            self.done = true;
            return None;
        }
        let found = self.list.generation();
        if found != self.generation {
            self.done = true;
            tracing::debug!(
                list = self.list.config().label(),
                position = self.position,
                expected = self.generation,
                found,
                "cursor observed concurrent mutation"
            );
            return Some(Err(ListError::ConcurrentMutation {
                expected: self.generation,
                found,
            }));
        }
        let Some(slot) = self.list.slot(self.position) else {
            self.done = true;
            return None;
        };
        let value = (self.produce)(self.position, slot);
        self.position += 1;
        self.end = self.end.min(self.list.len());
        Some(Ok(value))
    }
}

impl<T: Clone + PartialEq + 'static, V> Iterator for Cursor<T, V> {
    type Item = Result<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.step()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            (0, Some(0))
        } else {
            (0, Some(self.end.saturating_sub(self.position)))
        }
    }
}

impl<T: Clone + PartialEq + 'static, V> FusedIterator for Cursor<T, V> {}
