#![forbid(unsafe_code)]

//! Pending reaction records and their dispatch.
//!
//! A [`ReactionRecord`] holds strong references to its target and to the
//! definition that will run it, so neither can be destroyed between enqueue
//! and invocation even if the tree lets go of its own reference first.
//!
//! # Invariants
//!
//! 1. Fields are fixed at construction.
//! 2. [`ReactionRecord::invoke`] consumes the record; it cannot run twice.
//! 3. Attribute payload exists only on [`Reaction::AttributeChanged`].

use std::fmt;
use std::rc::Rc;

use crate::definition::{ReactionDefinition, ReactionTarget};
use crate::error::Result;

/// Payload-free reaction tag, used for logging and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Upgrade,
    Connected,
    Disconnected,
    AttributeChanged,
}

impl ReactionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upgrade => "upgrade",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::AttributeChanged => "attribute-changed",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualified attribute name.
///
/// Definitions declare interest by local name only; the namespace is carried
/// through to the callback untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeName {
    pub namespace: Option<String>,
    pub local_name: String,
}

impl AttributeName {
    /// Name in the null namespace.
    #[must_use]
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Name in an explicit namespace.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }
}

impl fmt::Display for AttributeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local_name),
            None => f.write_str(&self.local_name),
        }
    }
}

/// Values carried by an attribute-changed reaction.
///
/// `None` means the attribute was absent on that side of the change (added
/// or removed). Values are passed through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeChange {
    pub name: AttributeName,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl AttributeChange {
    #[must_use]
    pub fn new(name: AttributeName, old_value: Option<String>, new_value: Option<String>) -> Self {
        Self {
            name,
            old_value,
            new_value,
        }
    }
}

/// What a record asks its definition to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    Upgrade,
    Connected,
    Disconnected,
    AttributeChanged(AttributeChange),
}

impl Reaction {
    #[must_use]
    pub const fn kind(&self) -> ReactionKind {
        match self {
            Self::Upgrade => ReactionKind::Upgrade,
            Self::Connected => ReactionKind::Connected,
            Self::Disconnected => ReactionKind::Disconnected,
            Self::AttributeChanged(_) => ReactionKind::AttributeChanged,
        }
    }
}

/// One pending reaction.
pub struct ReactionRecord<E: ReactionTarget> {
    reaction: Reaction,
    target: Rc<E>,
    definition: Rc<E::Definition>,
}

impl<E: ReactionTarget> ReactionRecord<E> {
    #[must_use]
    pub fn new(reaction: Reaction, target: Rc<E>, definition: Rc<E::Definition>) -> Self {
        Self {
            reaction,
            target,
            definition,
        }
    }

    #[must_use]
    pub fn reaction(&self) -> &Reaction {
        &self.reaction
    }

    #[must_use]
    pub fn kind(&self) -> ReactionKind {
        self.reaction.kind()
    }

    #[must_use]
    pub fn target(&self) -> &Rc<E> {
        &self.target
    }

    #[must_use]
    pub fn definition(&self) -> &Rc<E::Definition> {
        &self.definition
    }

    /// Run the reaction. Consumes the record.
    pub fn invoke(self) -> Result<()> {
        let Self {
            reaction,
            target,
            definition,
        } = self;
        match reaction {
            Reaction::Upgrade => definition.upgrade(&target),
            Reaction::Connected => definition.connected(&target),
            Reaction::Disconnected => definition.disconnected(&target),
            Reaction::AttributeChanged(change) => definition.attribute_changed(
                &target,
                &change.name,
                change.old_value.as_deref(),
                change.new_value.as_deref(),
            ),
        }
    }
}

impl<E: ReactionTarget> fmt::Debug for ReactionRecord<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionRecord")
            .field("reaction", &self.reaction)
            .finish_non_exhaustive()
    }
}

/// Type-erased record, so one queue can hold records for any target type.
pub(crate) trait PendingReaction {
    fn kind(&self) -> ReactionKind;
    fn invoke_boxed(self: Box<Self>) -> Result<()>;
}

impl<E: ReactionTarget> PendingReaction for ReactionRecord<E> {
    fn kind(&self) -> ReactionKind {
        self.reaction.kind()
    }

    fn invoke_boxed(self: Box<Self>) -> Result<()> {
        (*self).invoke()
    }
}
