//! Task Queue
//!
//! A macrotask queue with a virtual clock.
//!
//! # Algorithm
//!
//! 1. `schedule` stamps the task with `now + delay` and a monotonically
//!    increasing order number
//! 2. A run pass repeatedly picks the pending task with the smallest
//!    (due time, order) pair that is within the pass's time limit
//! 3. The task is removed before it runs, so a running task may freely
//!    schedule or cancel other tasks (including zero-delay ones, which the
//!    same pass picks up)

use std::cell::RefCell;
use std::fmt;

use tracing::warn;

/// Upper bound on tasks run by a single `run_until_idle` call.
const STEP_LIMIT: usize = 100_000;

/// Identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

struct ScheduledTask {
    id: TaskId,
    due_at: u64,
    order: u64,
    run: Box<dyn FnOnce()>,
}

#[derive(Default)]
struct QueueState {
    now: u64,
    next_order: u64,
    tasks: Vec<ScheduledTask>,
}

impl QueueState {
    /// Index of the next task to run, if any is due by `due_limit`.
    fn next_index(&self, due_limit: Option<u64>) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, task)| due_limit.map_or(true, |limit| task.due_at <= limit))
            .min_by_key(|(_, task)| (task.due_at, task.order))
            .map(|(index, _)| index)
    }
}

/// Single-threaded task queue with a virtual millisecond clock.
#[derive(Default)]
pub struct TaskQueue {
    state: RefCell<QueueState>,
}

impl TaskQueue {
    /// Create an empty queue with the clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time in milliseconds.
    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }

    /// Schedule `task` to run `delay_ms` after the current time.
    pub fn schedule<F>(&self, delay_ms: u64, task: F) -> TaskId
    where
        F: FnOnce() + 'static,
    {
        let mut state = self.state.borrow_mut();
        let order = state.next_order;
        state.next_order += 1;
        let id = TaskId(order);
        let due_at = state.now.saturating_add(delay_ms);
        state.tasks.push(ScheduledTask {
            id,
            due_at,
            order,
            run: Box::new(task),
        });
        id
    }

    /// Cancel a pending task. Returns `false` if it already ran or was
    /// canceled before.
    pub fn cancel(&self, id: TaskId) -> bool {
        let mut state = self.state.borrow_mut();
        let before = state.tasks.len();
        state.tasks.retain(|task| task.id != id);
        state.tasks.len() != before
    }

    /// Whether `id` is still waiting to run.
    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.state.borrow().tasks.iter().any(|task| task.id == id)
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Run every task due at the current time. Returns the number run.
    pub fn run_due(&self) -> usize {
        let now = self.now();
        self.run_pass(Some(now), usize::MAX)
    }

    /// Move the clock forward by `delta_ms`, running tasks as they fall due.
    pub fn advance(&self, delta_ms: u64) -> usize {
        let target = self.now().saturating_add(delta_ms);
        let ran = self.run_pass(Some(target), usize::MAX);
        self.state.borrow_mut().now = target;
        ran
    }

    /// Run tasks until none are left, jumping the clock to each due time.
    pub fn run_until_idle(&self) -> usize {
        let ran = self.run_pass(None, STEP_LIMIT);
        if ran == STEP_LIMIT && self.pending() > 0 {
            warn!(
                pending = self.pending(),
                "task queue step limit reached; tasks keep rescheduling themselves"
            );
        }
        ran
    }

    fn run_pass(&self, due_limit: Option<u64>, max_steps: usize) -> usize {
        let mut steps = 0;
        while steps < max_steps {
            let task = {
                let mut state = self.state.borrow_mut();
                let Some(index) = state.next_index(due_limit) else {
                    break;
                };
                let task = state.tasks.remove(index);
                if task.due_at > state.now {
                    state.now = task.due_at;
                }
                task
            };
            (task.run)();
            steps += 1;
        }
        steps
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("TaskQueue")
            .field("now", &state.now)
            .field("pending", &state.tasks.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(&'static str) -> Box<dyn FnOnce()>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let make = move |name: &'static str| {
            let sink = sink.clone();
            Box::new(move || sink.borrow_mut().push(name)) as Box<dyn FnOnce()>
        };
        (log, make)
    }

    #[test]
    fn zero_delay_tasks_run_in_scheduling_order() {
        let queue = TaskQueue::new();
        let (log, make) = recorder();
        queue.schedule(0, make("a"));
        queue.schedule(0, make("b"));
        queue.schedule(0, make("c"));

        assert_eq!(queue.run_due(), 3);
        assert_eq!(*log.borrow(), ["a", "b", "c"]);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn delayed_tasks_wait_for_the_clock() {
        let queue = TaskQueue::new();
        let (log, make) = recorder();
        queue.schedule(50, make("late"));
        queue.schedule(0, make("now"));

        queue.run_due();
        assert_eq!(*log.borrow(), ["now"]);

        queue.advance(49);
        assert_eq!(*log.borrow(), ["now"]);

        queue.advance(1);
        assert_eq!(*log.borrow(), ["now", "late"]);
        assert_eq!(queue.now(), 50);
    }

    #[test]
    fn cancel_removes_pending_task() {
        let queue = TaskQueue::new();
        let (log, make) = recorder();
        let id = queue.schedule(10, make("canceled"));
        assert!(queue.is_scheduled(id));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));

        queue.run_until_idle();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn tasks_may_schedule_more_tasks() {
        let queue = Rc::new(TaskQueue::new());
        let (log, make) = recorder();
        let inner = make("inner");
        let outer_queue = queue.clone();
        let outer_log = log.clone();
        queue.schedule(0, move || {
            outer_log.borrow_mut().push("outer");
            outer_queue.schedule(0, inner);
        });

        assert_eq!(queue.run_due(), 2);
        assert_eq!(*log.borrow(), ["outer", "inner"]);
    }

    #[test]
    fn run_until_idle_jumps_clock() {
        let queue = TaskQueue::new();
        let (log, make) = recorder();
        queue.schedule(30, make("b"));
        queue.schedule(10, make("a"));

        assert_eq!(queue.run_until_idle(), 2);
        assert_eq!(*log.borrow(), ["a", "b"]);
        assert_eq!(queue.now(), 30);
    }
}
