//! Batching State Machine
//!
//! Every processing request goes through a FIFO queue that is drained by a
//! single deferred task.
//!
//! # Transitions
//!
//! | From       | Event                         | To                          |
//! |------------|-------------------------------|-----------------------------|
//! | Idle       | `process`                     | Queued (drain scheduled)    |
//! | Queued     | `process`                     | Queued                      |
//! | Queued     | drain task runs               | Draining                    |
//! | Draining   | `process`                     | Draining (same drain)       |
//! | Draining   | queue empty or limit reached  | Idle, or Queued if leftover |
//! | any        | scan enters                   | Collecting (drain canceled) |
//! | Collecting | `process`                     | Collecting                  |
//! | Collecting | outermost scan exits          | Draining if interrupted, else Queued if non-empty, else Idle |
//!
//! While Collecting (a scan or clean pass is running, possibly nested) items
//! are only enqueued.
//!
//! The state machine here is pure. The engine performs the scheduling and
//! cancellation it asks for.

use std::collections::VecDeque;

use crate::dom::{Document, NodeId};
use crate::task::TaskId;

use super::Engine;

/// Observable phase of the batching layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing queued, no drain scheduled.
    Idle,
    /// Items are waiting for the scheduled drain.
    Queued,
    /// The drain task is applying items.
    Draining,
    /// A scan pass is running; processing is suspended.
    Collecting,
}

/// One queued processing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingItem {
    pub el: NodeId,
    /// Raw rule filter, parsed when the item is applied.
    pub rule: String,
    /// Attribute whose firing produced this item, if any.
    pub trigger: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Idle,
    Draining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Queued(TaskId),
    Draining,
    Collecting { depth: usize, resume: Resume },
}

#[derive(Debug)]
pub(crate) struct Batch {
    state: State,
    pending: VecDeque<PendingItem>,
}

impl Batch {
    /// Create an idle batch with an empty queue.
    pub fn new() -> Self {
        Self {
            state: State::Idle,
            pending: VecDeque::new(),
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::Idle => Phase::Idle,
            State::Queued(_) => Phase::Queued,
            State::Draining => Phase::Draining,
            State::Collecting { .. } => Phase::Collecting,
        }
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Enqueue an item. Returns `true` when a drain must be scheduled.
    pub fn push(&mut self, item: PendingItem) -> bool {
        self.pending.push_back(item);
        self.state == State::Idle
    }

    /// Record the drain task scheduled after `push` or `exit_scan`.
    pub fn scheduled(&mut self, id: TaskId) {
        debug_assert_eq!(self.state, State::Idle);
        self.state = State::Queued(id);
    }

    /// Enter a scan pass. Returns a scheduled drain that must be canceled.
    pub fn enter_scan(&mut self) -> Option<TaskId> {
        let (state, cancel) = match self.state {
            State::Idle => (Self::collecting(1, Resume::Idle), None),
            State::Queued(id) => (Self::collecting(1, Resume::Idle), Some(id)),
            State::Draining => (Self::collecting(1, Resume::Draining), None),
            State::Collecting { depth, resume } => (Self::collecting(depth + 1, resume), None),
        };
        self.state = state;
        cancel
    }

    /// Leave a scan pass. Returns `true` when a drain must be scheduled.
    pub fn exit_scan(&mut self) -> bool {
        let State::Collecting { depth, resume } = self.state else {
            return false;
        };
        if depth > 1 {
            self.state = Self::collecting(depth - 1, resume);
            return false;
        }
        match resume {
            Resume::Draining => {
                self.state = State::Draining;
                false
            }
            Resume::Idle => {
                self.state = State::Idle;
                !self.pending.is_empty()
            }
        }
    }

    /// Start a drain. Returns `false` if no drain is due, in which case the
    /// task must do nothing.
    pub fn begin_drain(&mut self) -> bool {
        if let State::Queued(_) = self.state {
            self.state = State::Draining;
            true
        } else {
            false
        }
    }

    /// Pop the oldest queued item.
    pub fn next(&mut self) -> Option<PendingItem> {
        self.pending.pop_front()
    }

    /// Finish a drain. Returns `true` when leftovers need another drain.
    pub fn finish_drain(&mut self) -> bool {
        if self.state != State::Draining {
            return false;
        }
        self.state = State::Idle;
        !self.pending.is_empty()
    }

    fn collecting(depth: usize, resume: Resume) -> State {
        State::Collecting { depth, resume }
    }
}

/// Keeps the batching layer in Collecting while alive.
///
/// Scan and clean passes hold one for their whole duration; processing
/// requests raised meanwhile are deferred until the outermost guard drops.
pub(crate) struct ScanGuard<'a, D: Document + 'static> {
    engine: &'a Engine<D>,
}

impl<'a, D: Document + 'static> ScanGuard<'a, D> {
    /// Enter a scan on `engine`, canceling any scheduled drain.
    pub fn enter(engine: &'a Engine<D>) -> Self {
        let cancel = engine.inner.batch.borrow_mut().enter_scan();
        if let Some(id) = cancel {
            engine.inner.tasks.cancel(id);
        }
        Self { engine }
    }
}

impl<D: Document + 'static> Drop for ScanGuard<'_, D> {
    fn drop(&mut self) {
        let reschedule = self.engine.inner.batch.borrow_mut().exit_scan();
        if reschedule {
            self.engine.schedule_drain();
        }
    }
}
