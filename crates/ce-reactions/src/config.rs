#![forbid(unsafe_code)]

//! Configuration for a [`ProcessingStack`](crate::ProcessingStack).

/// What to do when a reaction is enqueued while no frame is active.
///
/// The reaction is dropped under every policy. An enqueue with no active
/// frame means some mutation path forgot to open a
/// [`ReactionScope`](crate::ReactionScope), so the policy only controls how
/// loudly that is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingFramePolicy {
    /// Drop silently.
    Ignore,
    /// Drop and emit a `warn` event.
    #[default]
    Log,
    /// Drop, emit a `warn` event, then fail a `debug_assert!`.
    ///
    /// Release builds behave exactly like [`MissingFramePolicy::Log`].
    DebugAssert,
}

/// Stack-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReactionConfig {
    /// Reporting policy for enqueues with no active frame.
    pub missing_frame: MissingFramePolicy,
}

impl ReactionConfig {
    /// Create the default configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            missing_frame: MissingFramePolicy::Log,
        }
    }

    /// Set the missing-frame policy.
    #[must_use]
    pub const fn with_missing_frame(mut self, policy: MissingFramePolicy) -> Self {
        self.missing_frame = policy;
        self
    }
}
