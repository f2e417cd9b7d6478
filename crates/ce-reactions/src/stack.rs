#![forbid(unsafe_code)]

//! The processing stack: one frame per nested reaction-triggering algorithm.
//!
//! # Design
//!
//! [`ProcessingStack`] is a cheap handle (`Rc` inside) to thread-confined
//! state. Every thread has its own instance reachable through
//! [`ProcessingStack::current`]; isolated stacks can be built with
//! [`ProcessingStack::new`] and passed around explicitly.
//!
//! A frame's queue is created on the first enqueue inside that frame.
//! Popping a frame drains its queue outside of any borrow of the stack, so
//! callbacks are free to push, enqueue into, and pop nested frames.
//!
//! # Invariants
//!
//! 1. Enqueues always target the top frame.
//! 2. Frames pop in strict LIFO order; anything else panics.
//! 3. A popped frame's queue is empty: records appended during a drain pass
//!    run in a following pass before the frame is removed.
//! 4. The stack holds no frames when it is dropped.
//! 5. A callback that panics never strands its frame: the panic is contained
//!    at the record boundary and the pop completes.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::config::{MissingFramePolicy, ReactionConfig};
use crate::definition::{ReactionDefinition, ReactionTarget};
use crate::error::SkipReason;
use crate::queue::{DrainSummary, ReactionQueue};
use crate::record::{AttributeChange, AttributeName, Reaction, ReactionKind, ReactionRecord};

/// Identifies one pushed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(u64);

impl FrameId {
    /// Get the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frame#{}", self.0)
    }
}

struct ProcessingFrame {
    id: FrameId,
    queue: Option<ReactionQueue>,
}

impl ProcessingFrame {
    fn queue_mut(&mut self) -> &mut ReactionQueue {
        self.queue.get_or_insert_with(ReactionQueue::new)
    }
}

struct StackInner {
    frames: RefCell<Vec<ProcessingFrame>>,
    next_frame: Cell<u64>,
    config: ReactionConfig,
}

impl Drop for StackInner {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.frames.get_mut().is_empty(),
                "processing stack dropped with {} active frames",
                self.frames.get_mut().len()
            );
        }
    }
}

thread_local! {
    static CURRENT_STACK: ProcessingStack = ProcessingStack::new();
}

/// Nesting-aware owner of per-frame reaction queues.
///
/// Cloning a `ProcessingStack` creates a new handle to the **same** stack.
#[derive(Clone)]
pub struct ProcessingStack {
    inner: Rc<StackInner>,
}

impl Default for ProcessingStack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessingStack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingStack")
            .field("depth", &self.depth())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl ProcessingStack {
    /// Create an empty stack with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ReactionConfig::default())
    }

    /// Create an empty stack.
    #[must_use]
    pub fn with_config(config: ReactionConfig) -> Self {
        Self {
            inner: Rc::new(StackInner {
                frames: RefCell::new(Vec::new()),
                next_frame: Cell::new(1),
                config,
            }),
        }
    }

    /// Handle to this thread's stack.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_STACK.with(Clone::clone)
    }

    #[must_use]
    pub fn config(&self) -> ReactionConfig {
        self.inner.config
    }

    /// Whether both handles point at the same stack.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of active frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.inner.frames.borrow().len()
    }

    /// The top frame, or `None` when no algorithm is running.
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameId> {
        self.inner.frames.borrow().last().map(|frame| frame.id)
    }

    /// Push a new frame with no queue and make it current.
    ///
    /// Prefer [`scope`](Self::scope), which guarantees the matching pop.
    pub fn push_frame(&self) -> FrameId {
        let id = FrameId(self.inner.next_frame.get());
        self.inner.next_frame.set(id.0 + 1);
        let mut frames = self.inner.frames.borrow_mut();
        frames.push(ProcessingFrame { id, queue: None });
        tracing::trace!(message = "reactions.push", frame = id.0, depth = frames.len());
        id
    }

    /// Drain `frame`'s queue and remove it.
    ///
    /// # Panics
    ///
    /// Panics if `frame` is not the top frame.
    pub fn pop_frame(&self, frame: FrameId) -> DrainSummary {
        let mut summary = DrainSummary::default();
        let mut passes = 0usize;
        loop {
            let batch = {
                let mut frames = self.inner.frames.borrow_mut();
                let top = Self::expect_top(&mut frames, frame);
                top.queue.as_mut().map(ReactionQueue::detach)
            };
            match batch {
                Some(batch) if !batch.is_empty() => {
                    passes += 1;
                    summary.absorb(batch.invoke_all());
                }
                _ => break,
            }
        }

        let mut frames = self.inner.frames.borrow_mut();
        Self::expect_top(&mut frames, frame);
        frames.pop();
        tracing::debug!(
            message = "reactions.pop",
            frame = frame.0,
            depth = frames.len(),
            invoked = summary.invoked,
            failed = summary.failed,
            passes
        );
        summary
    }

    /// Remove `frame`, and any frame left above it, without invoking pending
    /// reactions.
    ///
    /// Used while unwinding, when running user callbacks is unsafe. Frames
    /// above `frame` can only belong to scopes whose drop already unwound.
    /// Never panics.
    fn discard_frame(&self, frame: FrameId) {
        let Ok(mut frames) = self.inner.frames.try_borrow_mut() else {
            tracing::error!(message = "reactions.discard_busy", frame = frame.0);
            return;
        };
        let Some(pos) = frames.iter().rposition(|f| f.id == frame) else {
            tracing::error!(message = "reactions.discard_missing", frame = frame.0);
            return;
        };
        let mut dropped = 0;
        for mut popped in frames.drain(pos..) {
            dropped += popped.queue.as_mut().map_or(0, ReactionQueue::discard);
        }
        if dropped > 0 {
            tracing::warn!(message = "reactions.discarded", frame = frame.0, dropped);
        }
    }

    fn expect_top(frames: &mut [ProcessingFrame], frame: FrameId) -> &mut ProcessingFrame {
        match frames.last_mut() {
            Some(top) if top.id == frame => top,
            Some(top) => panic!("popped {frame} but the top frame is {}", top.id),
            None => panic!("popped {frame} from an empty processing stack"),
        }
    }

    /// Push a frame that is drained and popped when the guard drops.
    pub fn scope(&self) -> ReactionScope {
        ReactionScope {
            frame: self.push_frame(),
            stack: self.clone(),
        }
    }

    /// Run `f` inside a fresh frame.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> R {
        let _scope = self.scope();
        f()
    }

    /// Append a record to the top frame's queue.
    ///
    /// With no active frame the record is dropped and reported per
    /// [`MissingFramePolicy`].
    pub fn enqueue<E: ReactionTarget>(&self, record: ReactionRecord<E>) {
        let kind = record.kind();
        let mut frames = self.inner.frames.borrow_mut();
        let depth = frames.len();
        let Some(top) = frames.last_mut() else {
            drop(frames);
            self.report_missing_frame(kind);
            return;
        };
        let queue = top.queue_mut();
        queue.append(record);
        let pending = queue.len();
        tracing::trace!(
            message = "reactions.enqueue",
            kind = %kind,
            frame = top.id.0,
            depth,
            pending
        );
    }

    fn report_missing_frame(&self, kind: ReactionKind) {
        match self.inner.config.missing_frame {
            MissingFramePolicy::Ignore => {}
            MissingFramePolicy::Log => {
                tracing::warn!(
                    message = "reactions.skip",
                    reason = %SkipReason::NoActiveFrame,
                    kind = %kind
                );
            }
            MissingFramePolicy::DebugAssert => {
                tracing::warn!(
                    message = "reactions.skip",
                    reason = %SkipReason::NoActiveFrame,
                    kind = %kind
                );
                debug_assert!(false, "{kind} reaction enqueued with no active frame");
            }
        }
    }

    fn skip(reason: SkipReason, kind: ReactionKind) {
        tracing::trace!(message = "reactions.skip", reason = %reason, kind = %kind);
    }

    /// Schedule an upgrade if `target` is reaction-capable.
    pub fn enqueue_upgrade<E: ReactionTarget>(&self, target: &Rc<E>) {
        match target.reaction_definition() {
            Some(definition) => self.enqueue_upgrade_with(target, definition),
            None => Self::skip(SkipReason::NotReactionCapable, ReactionKind::Upgrade),
        }
    }

    /// Schedule an upgrade with an already-resolved definition.
    pub fn enqueue_upgrade_with<E: ReactionTarget>(
        &self,
        target: &Rc<E>,
        definition: Rc<E::Definition>,
    ) {
        self.enqueue(ReactionRecord::new(
            Reaction::Upgrade,
            Rc::clone(target),
            definition,
        ));
    }

    /// Schedule a connected callback if `target` is reaction-capable.
    pub fn enqueue_connected_if_needed<E: ReactionTarget>(&self, target: &Rc<E>) {
        self.enqueue_lifecycle(target, Reaction::Connected);
    }

    /// Schedule a disconnected callback if `target` is reaction-capable.
    pub fn enqueue_disconnected_if_needed<E: ReactionTarget>(&self, target: &Rc<E>) {
        self.enqueue_lifecycle(target, Reaction::Disconnected);
    }

    fn enqueue_lifecycle<E: ReactionTarget>(&self, target: &Rc<E>, reaction: Reaction) {
        match target.reaction_definition() {
            Some(definition) => {
                self.enqueue(ReactionRecord::new(reaction, Rc::clone(target), definition));
            }
            None => Self::skip(SkipReason::NotReactionCapable, reaction.kind()),
        }
    }

    /// Schedule an attribute-changed callback if `target` is reaction-capable
    /// and its definition observes `name`'s local name.
    pub fn enqueue_attribute_changed_if_needed<E: ReactionTarget>(
        &self,
        target: &Rc<E>,
        name: &AttributeName,
        old_value: Option<&str>,
        new_value: Option<&str>,
    ) {
        let kind = ReactionKind::AttributeChanged;
        let Some(definition) = target.reaction_definition() else {
            Self::skip(SkipReason::NotReactionCapable, kind);
            return;
        };
        if !definition.observes_attribute(&name.local_name) {
            Self::skip(SkipReason::AttributeNotObserved, kind);
            return;
        }
        let change = AttributeChange::new(
            name.clone(),
            old_value.map(str::to_owned),
            new_value.map(str::to_owned),
        );
        self.enqueue(ReactionRecord::new(
            Reaction::AttributeChanged(change),
            Rc::clone(target),
            definition,
        ));
    }
}

/// Guard for one frame of a reaction-triggering algorithm.
///
/// Dropping the guard drains and pops the frame, on normal return and on
/// early `?` exits alike. If the thread is panicking, pending reactions are
/// discarded instead of invoked.
#[must_use = "dropping the scope immediately drains and pops its frame"]
pub struct ReactionScope {
    stack: ProcessingStack,
    frame: FrameId,
}

impl ReactionScope {
    #[must_use]
    pub fn frame(&self) -> FrameId {
        self.frame
    }

    #[must_use]
    pub fn stack(&self) -> &ProcessingStack {
        &self.stack
    }
}

impl fmt::Debug for ReactionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactionScope")
            .field("frame", &self.frame)
            .finish()
    }
}

impl Drop for ReactionScope {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.stack.discard_frame(self.frame);
        } else {
            self.stack.pop_frame(self.frame);
        }
    }
}

/// Open a frame on this thread's stack.
pub fn scope() -> ReactionScope {
    ProcessingStack::current().scope()
}

/// [`ProcessingStack::enqueue_upgrade`] on this thread's stack.
pub fn enqueue_upgrade<E: ReactionTarget>(target: &Rc<E>) {
    ProcessingStack::current().enqueue_upgrade(target);
}

/// [`ProcessingStack::enqueue_upgrade_with`] on this thread's stack.
pub fn enqueue_upgrade_with<E: ReactionTarget>(target: &Rc<E>, definition: Rc<E::Definition>) {
    ProcessingStack::current().enqueue_upgrade_with(target, definition);
}

/// [`ProcessingStack::enqueue_connected_if_needed`] on this thread's stack.
pub fn enqueue_connected_if_needed<E: ReactionTarget>(target: &Rc<E>) {
    ProcessingStack::current().enqueue_connected_if_needed(target);
}

/// [`ProcessingStack::enqueue_disconnected_if_needed`] on this thread's stack.
pub fn enqueue_disconnected_if_needed<E: ReactionTarget>(target: &Rc<E>) {
    ProcessingStack::current().enqueue_disconnected_if_needed(target);
}

/// [`ProcessingStack::enqueue_attribute_changed_if_needed`] on this thread's
/// stack.
pub fn enqueue_attribute_changed_if_needed<E: ReactionTarget>(
    target: &Rc<E>,
    name: &AttributeName,
    old_value: Option<&str>,
    new_value: Option<&str>,
) {
    ProcessingStack::current().enqueue_attribute_changed_if_needed(
        target, name, old_value, new_value,
    );
}
