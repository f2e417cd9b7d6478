#![forbid(unsafe_code)]

//! Error and skip types.

use std::fmt;

use thiserror::Error;

use crate::record::ReactionKind;

pub type Result<T> = std::result::Result<T, ReactionError>;

/// Failure reported by a reaction callback body.
///
/// The scheduler never propagates these to the code that enqueued the
/// reaction. A failed record is logged and the rest of its batch still runs.
#[derive(Debug, Error)]
pub enum ReactionError {
    #[error("{kind} callback failed: {message}")]
    CallbackFailed { kind: ReactionKind, message: String },

    #[error("upgrade of <{tag}> failed: {message}")]
    UpgradeFailed { tag: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl ReactionError {
    #[must_use]
    pub fn callback(kind: ReactionKind, message: impl Into<String>) -> Self {
        Self::CallbackFailed {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn upgrade(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpgradeFailed {
            tag: tag.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn other(message: impl fmt::Display) -> Self {
        Self::Other(message.to_string())
    }
}

/// Why an enqueue request produced no record.
///
/// None of these are errors: the enqueue operations return `()` and the
/// reason only shows up in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The target has no reaction-capable definition.
    NotReactionCapable,
    /// The definition does not observe the changed attribute.
    AttributeNotObserved,
    /// No frame is active on the processing stack.
    NoActiveFrame,
}

impl SkipReason {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotReactionCapable => "not-reaction-capable",
            Self::AttributeNotObserved => "attribute-not-observed",
            Self::NoActiveFrame => "no-active-frame",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
