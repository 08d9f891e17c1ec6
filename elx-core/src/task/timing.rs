//! Debounce and throttle wrappers built on the task queue.

use std::cell::Cell;
use std::rc::Rc;

use super::queue::{TaskId, TaskQueue};

/// Delays a callback until calls stop arriving for `delay_ms`.
///
/// Every call cancels the pending invocation and schedules a new one with
/// the latest argument.
pub struct Debounce<A: 'static> {
    queue: Rc<TaskQueue>,
    delay_ms: u64,
    callback: Rc<dyn Fn(A)>,
    pending: Cell<Option<TaskId>>,
}

impl<A: 'static> Debounce<A> {
    /// Create a debouncer that runs `callback` on `queue`.
    pub fn new<F>(queue: Rc<TaskQueue>, delay_ms: u64, callback: F) -> Self
    where
        F: Fn(A) + 'static,
    {
        Self {
            queue,
            delay_ms,
            callback: Rc::new(callback),
            pending: Cell::new(None),
        }
    }

    pub fn call(&self, arg: A) {
        self.cancel();
        let callback = Rc::clone(&self.callback);
        let id = self.queue.schedule(self.delay_ms, move || callback(arg));
        self.pending.set(Some(id));
    }

    /// Drop the pending invocation, if any.
    pub fn cancel(&self) {
        if let Some(id) = self.pending.take() {
            self.queue.cancel(id);
        }
    }
}

struct ThrottleState {
    last_call: Cell<Option<u64>>,
    trailing: Cell<Option<TaskId>>,
}

/// Runs a callback at most once per `interval_ms`.
///
/// A call inside the interval schedules one trailing invocation for the
/// moment the interval ends; further calls until then are dropped.
pub struct Throttle<A: 'static> {
    queue: Rc<TaskQueue>,
    interval_ms: u64,
    callback: Rc<dyn Fn(A)>,
    state: Rc<ThrottleState>,
}

impl<A: 'static> Throttle<A> {
    /// Create a throttle that runs `callback` on `queue`.
    pub fn new<F>(queue: Rc<TaskQueue>, interval_ms: u64, callback: F) -> Self
    where
        F: Fn(A) + 'static,
    {
        Self {
            queue,
            interval_ms,
            callback: Rc::new(callback),
            state: Rc::new(ThrottleState {
                last_call: Cell::new(None),
                trailing: Cell::new(None),
            }),
        }
    }

    pub fn call(&self, arg: A) {
        let now = self.queue.now();
        let remaining = self
            .state
            .last_call
            .get()
            .map(|last| (last + self.interval_ms).saturating_sub(now))
            .unwrap_or(0);

        if remaining == 0 {
            self.state.last_call.set(Some(now));
            (self.callback)(arg);
            return;
        }
        if self.state.trailing.get().is_some() {
            return;
        }

        let callback = Rc::clone(&self.callback);
        let state = Rc::clone(&self.state);
        let queue = Rc::clone(&self.queue);
        let id = self.queue.schedule(remaining, move || {
            state.last_call.set(Some(queue.now()));
            state.trailing.set(None);
            callback(arg);
        });
        self.state.trailing.set(Some(id));
    }

    /// Drop the trailing invocation, if any.
    pub fn cancel(&self) {
        if let Some(id) = self.state.trailing.take() {
            self.queue.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn debounce_keeps_only_last_call() {
        let queue = Rc::new(TaskQueue::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let debounced = Debounce::new(queue.clone(), 100, move |v: u32| sink.borrow_mut().push(v));

        debounced.call(1);
        queue.advance(50);
        debounced.call(2);
        queue.advance(99);
        assert!(seen.borrow().is_empty());

        queue.advance(1);
        assert_eq!(*seen.borrow(), [2]);
    }

    #[test]
    fn debounce_cancel_drops_pending_call() {
        let queue = Rc::new(TaskQueue::new());
        let seen = Rc::new(Cell::new(0));
        let sink = seen.clone();
        let debounced = Debounce::new(queue.clone(), 10, move |()| sink.set(sink.get() + 1));

        debounced.call(());
        debounced.cancel();
        queue.run_until_idle();
        assert_eq!(seen.get(), 0);
    }

    #[test]
    fn throttle_runs_leading_and_one_trailing_call() {
        let queue = Rc::new(TaskQueue::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let throttled = Throttle::new(queue.clone(), 100, move |v: u32| sink.borrow_mut().push(v));

        throttled.call(1);
        throttled.call(2);
        throttled.call(3);
        assert_eq!(*seen.borrow(), [1]);

        queue.advance(100);
        assert_eq!(*seen.borrow(), [1, 2]);

        queue.advance(100);
        throttled.call(4);
        assert_eq!(*seen.borrow(), [1, 2, 4]);
    }
}
