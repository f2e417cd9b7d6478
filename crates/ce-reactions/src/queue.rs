#![forbid(unsafe_code)]

//! Insertion-ordered buffer of pending reactions.
//!
//! # Design
//!
//! Draining first detaches the whole pending sequence into a
//! [`ReactionBatch`] and only then invokes it. A reaction that appends to the
//! same queue while the batch runs starts a fresh sequence, which the next
//! drain picks up. The batch in progress is never extended.
//!
//! # Failure Modes
//!
//! - **Callback error**: logged at `warn`, counted in
//!   [`DrainSummary::failed`]; the rest of the batch still runs.
//! - **Callback panic**: caught at the record boundary, logged at `error` and
//!   counted as a failure. The frame being drained stays consistent.
//! - **Dropped while non-empty**: a frame was torn down without draining.
//!   This fails a `debug_assert!`.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::definition::ReactionTarget;
use crate::record::{PendingReaction, ReactionRecord};

/// Counts from one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainSummary {
    /// Records whose callbacks ran (including failed ones).
    pub invoked: usize,
    /// Records whose callbacks returned an error or panicked.
    pub failed: usize,
}

impl DrainSummary {
    pub(crate) fn absorb(&mut self, other: DrainSummary) {
        self.invoked += other.invoked;
        self.failed += other.failed;
    }
}

/// Pending reactions in invocation order. Only ever owned by a frame.
#[derive(Default)]
pub(crate) struct ReactionQueue {
    items: Vec<Box<dyn PendingReaction>>,
}

impl ReactionQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a record at the back.
    pub(crate) fn append<E: ReactionTarget>(&mut self, record: ReactionRecord<E>) {
        self.items.push(Box::new(record));
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    /// Move the pending sequence out, leaving an empty queue behind.
    ///
    /// Invoking the returned batch drains the queue as of this call; records
    /// appended meanwhile wait for the next `detach`.
    pub(crate) fn detach(&mut self) -> ReactionBatch {
        ReactionBatch {
            items: std::mem::take(&mut self.items),
        }
    }

    /// Drop pending records without invoking them.
    pub(crate) fn discard(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        count
    }
}

impl std::fmt::Debug for ReactionQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReactionQueue")
            .field("len", &self.items.len())
            .finish()
    }
}

impl Drop for ReactionQueue {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            debug_assert!(
                self.items.is_empty(),
                "reaction queue dropped with {} pending reactions",
                self.items.len()
            );
        }
    }
}

/// A detached run of records, invoked without holding any borrow of the
/// queue it came from.
pub(crate) struct ReactionBatch {
    items: Vec<Box<dyn PendingReaction>>,
}

impl ReactionBatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Invoke every record in order. Never unwinds past a record.
    pub(crate) fn invoke_all(self) -> DrainSummary {
        let mut summary = DrainSummary::default();
        for item in self.items {
            let kind = item.kind();
            summary.invoked += 1;
            match panic::catch_unwind(AssertUnwindSafe(move || item.invoke_boxed())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    summary.failed += 1;
                    tracing::warn!(message = "reactions.callback_failed", kind = %kind, error = %err);
                }
                Err(payload) => {
                    summary.failed += 1;
                    tracing::error!(
                        message = "reactions.callback_panicked",
                        kind = %kind,
                        panic = panic_message(payload.as_ref())
                    );
                }
            }
        }
        summary
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
