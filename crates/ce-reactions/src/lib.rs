#![forbid(unsafe_code)]

//! Reentrant deferred scheduling of element lifecycle reactions.
//!
//! Tree-mutating algorithms must never run user callbacks synchronously in
//! the middle of a mutation. Instead they enqueue *reactions* (upgrade,
//! connected, disconnected, attribute-changed) which are invoked once the
//! algorithm that triggered them completes.
//!
//! - [`ReactionRecord`]: one pending reaction (kind + target + definition).
//! - [`ProcessingStack`]: one frame per nested algorithm; each frame owns at
//!   most one insertion-ordered queue of records, created on its first
//!   enqueue. Queues are never exposed; a pop reports a [`DrainSummary`].
//! - [`ReactionScope`]: guard that pushes a frame on entry and drains + pops
//!   it on exit.
//!
//! # Ordering
//!
//! Reactions enqueued while frame N is current always land in frame N's
//! queue. A nested algorithm drains its own frame as soon as it returns, so
//! reactions run depth-first, innermost first.
//!
//! ```
//! use std::rc::Rc;
//! use ce_reactions::{ProcessingStack, ReactionDefinition, ReactionError, ReactionTarget};
//!
//! struct Widget;
//! struct WidgetDefinition;
//!
//! impl ReactionDefinition<Widget> for WidgetDefinition {
//!     fn upgrade(&self, _target: &Rc<Widget>) -> Result<(), ReactionError> {
//!         Ok(())
//!     }
//! }
//!
//! impl ReactionTarget for Widget {
//!     type Definition = WidgetDefinition;
//!     fn reaction_definition(&self) -> Option<Rc<WidgetDefinition>> {
//!         Some(Rc::new(WidgetDefinition))
//!     }
//! }
//!
//! let stack = ProcessingStack::new();
//! let widget = Rc::new(Widget);
//! stack.run(|| stack.enqueue_upgrade(&widget));
//! assert_eq!(stack.depth(), 0);
//! ```
//!
//! # Invariants
//!
//! 1. Records are invoked in insertion order, each exactly once.
//! 2. A record appended while its queue is being drained runs in a later
//!    pass, never the pass in progress.
//! 3. Frames are strictly LIFO; popping a frame that is not on top panics.
//! 4. Enqueueing with no active frame drops the reaction (see
//!    [`MissingFramePolicy`]).

pub mod config;
pub mod definition;
pub mod error;
mod queue;
pub mod record;
pub mod stack;

pub use config::{MissingFramePolicy, ReactionConfig};
pub use definition::{ReactionDefinition, ReactionTarget};
pub use error::{ReactionError, SkipReason};
pub use queue::DrainSummary;
pub use record::{AttributeChange, AttributeName, Reaction, ReactionKind, ReactionRecord};
pub use stack::{
    FrameId, ProcessingStack, ReactionScope, enqueue_attribute_changed_if_needed,
    enqueue_connected_if_needed, enqueue_disconnected_if_needed, enqueue_upgrade,
    enqueue_upgrade_with, scope,
};
