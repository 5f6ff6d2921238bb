//! Configuration for units of work.

/// Configuration for units of work.
///
/// Supplied once to the module and copied into every unit of work it opens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitOfWorkConfig {
    /// Check constraints of every new or updated entity before flushing.
    pub check_constraints_on_complete: bool,

    /// Maximum recursion depth of an aggregation cascade.
    pub max_cascade_depth: usize,

    /// Prefix for generated identities.
    pub identity_prefix: Option<String>,
}

impl Default for UnitOfWorkConfig {
    fn default() -> Self {
        Self {
            check_constraints_on_complete: true,
            max_cascade_depth: 64,
            identity_prefix: None,
        }
    }
}

impl UnitOfWorkConfig {
    /// Creates a configuration that checks constraints and keeps cascades shallow.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            check_constraints_on_complete: true,
            max_cascade_depth: 16,
            identity_prefix: None,
        }
    }

    /// Creates a configuration that skips constraint checks on completion.
    #[must_use]
    pub fn relaxed() -> Self {
        Self {
            check_constraints_on_complete: false,
            max_cascade_depth: 256,
            identity_prefix: None,
        }
    }

    /// Builder method to enable/disable constraint checks on completion.
    #[must_use]
    pub fn with_check_constraints_on_complete(mut self, check: bool) -> Self {
        self.check_constraints_on_complete = check;
        self
    }

    /// Builder method to set the maximum cascade depth.
    #[must_use]
    pub fn with_max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Builder method to set the prefix of generated identities.
    #[must_use]
    pub fn with_identity_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.identity_prefix = Some(prefix.into());
        self
    }
}
