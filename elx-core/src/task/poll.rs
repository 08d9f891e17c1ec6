//! Waiting for a condition on the task queue.

use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::queue::{TaskId, TaskQueue};

/// Interval and timeout of a [`Poll`], in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollOptions {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            timeout_ms: 30_000,
        }
    }
}

/// Where a [`Poll`] stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Pending,
    /// The condition held and the callback ran.
    Ready,
    /// The timeout passed without the condition holding.
    TimedOut,
    Canceled,
}

struct Ticker {
    queue: Rc<TaskQueue>,
    options: PollOptions,
    started_at: u64,
    condition: Box<dyn Fn() -> bool>,
    callback: Cell<Option<Box<dyn FnOnce()>>>,
    status: Cell<PollStatus>,
    task: Cell<Option<TaskId>>,
}

impl Ticker {
    fn schedule(self: &Rc<Self>) {
        let ticker = Rc::clone(self);
        // A zero interval would never let the clock reach the timeout.
        let interval = self.options.interval_ms.max(1);
        let id = self.queue.schedule(interval, move || ticker.tick());
        self.task.set(Some(id));
    }

    fn tick(self: &Rc<Self>) {
        self.task.set(None);
        if (self.condition)() {
            self.status.set(PollStatus::Ready);
            if let Some(callback) = self.callback.take() {
                callback();
            }
        } else if self.queue.now().saturating_sub(self.started_at) >= self.options.timeout_ms {
            self.status.set(PollStatus::TimedOut);
            debug!(
                timeout_ms = self.options.timeout_ms,
                "poll timed out without its condition holding"
            );
        } else {
            self.schedule();
        }
    }
}

/// Checks a condition every interval and runs a callback once it holds.
///
/// The first check happens one interval after [`Poll::start`]. Polling
/// stops for good when the condition holds, when the timeout passes or when
/// the poll is canceled; the callback runs at most once.
pub struct Poll {
    ticker: Rc<Ticker>,
}

impl Poll {
    /// Start polling `condition` on `queue`.
    pub fn start<C, F>(
        queue: Rc<TaskQueue>,
        options: PollOptions,
        condition: C,
        callback: F,
    ) -> Self
    where
        C: Fn() -> bool + 'static,
        F: FnOnce() + 'static,
    {
        let ticker = Rc::new(Ticker {
            started_at: queue.now(),
            queue,
            options,
            condition: Box::new(condition),
            callback: Cell::new(Some(Box::new(callback))),
            status: Cell::new(PollStatus::Pending),
            task: Cell::new(None),
        });
        ticker.schedule();
        Self { ticker }
    }

    /// Current status.
    pub fn status(&self) -> PollStatus {
        self.ticker.status.get()
    }

    /// Stop a pending poll. Finished polls keep their status.
    pub fn cancel(&self) {
        if let Some(id) = self.ticker.task.take() {
            self.ticker.queue.cancel(id);
            self.ticker.status.set(PollStatus::Canceled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let hits = Rc::new(Cell::new(0));
        let sink = hits.clone();
        (hits, move || sink.set(sink.get() + 1))
    }

    #[test]
    fn runs_callback_once_the_condition_holds() {
        let queue = Rc::new(TaskQueue::new());
        let ready = Rc::new(Cell::new(false));
        let (hits, callback) = counter();
        let flag = ready.clone();
        let poll = Poll::start(
            queue.clone(),
            PollOptions::default(),
            move || flag.get(),
            callback,
        );

        queue.advance(250);
        assert_eq!(poll.status(), PollStatus::Pending);
        assert_eq!(hits.get(), 0);

        ready.set(true);
        queue.advance(100);
        assert_eq!(poll.status(), PollStatus::Ready);
        assert_eq!(hits.get(), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn gives_up_after_the_timeout() {
        let queue = Rc::new(TaskQueue::new());
        let (hits, callback) = counter();
        let options = PollOptions {
            interval_ms: 10,
            timeout_ms: 50,
        };
        let poll = Poll::start(queue.clone(), options, || false, callback);

        queue.run_until_idle();
        assert_eq!(poll.status(), PollStatus::TimedOut);
        assert_eq!(queue.now(), 50);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn cancel_stops_a_pending_poll() {
        let queue = Rc::new(TaskQueue::new());
        let (hits, callback) = counter();
        let poll = Poll::start(queue.clone(), PollOptions::default(), || true, callback);

        poll.cancel();
        queue.run_until_idle();
        assert_eq!(poll.status(), PollStatus::Canceled);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: PollOptions = serde_json::from_str(r#"{"interval_ms": 25}"#).unwrap();
        assert_eq!(options.interval_ms, 25);
        assert_eq!(options.timeout_ms, 30_000);
    }
}
