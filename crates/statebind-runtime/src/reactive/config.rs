#![forbid(unsafe_code)]

//! Per-list configuration.

/// How `set` treats an index past the end of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WritePolicy {
    /// Grow the list, filling the gap with absent slots.
    #[default]
    Expand,
    /// Reject with [`ListError::IndexOutOfBounds`](statebind_core::ListError).
    Strict,
}

/// Configuration for an [`ObservableList`](super::ObservableList).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListConfig {
    /// Out-of-range write behavior.
    pub write_policy: WritePolicy,
    /// Name attached to every log event for this list.
    pub label: Option<String>,
}

impl ListConfig {
    /// Create a configuration with the given write policy.
    #[must_use]
    pub fn new(write_policy: WritePolicy) -> Self {
        Self {
            write_policy,
            label: None,
        }
    }

    /// Strict bounds on every positional write.
    #[must_use]
    pub fn strict() -> Self {
        Self::new(WritePolicy::Strict)
    }

    /// Set the write policy.
    #[must_use]
    pub fn with_write_policy(mut self, write_policy: WritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }

    /// Set the log label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// The log label, or `"list"` when unset.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("list")
    }
}
