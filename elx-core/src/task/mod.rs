//! Task Scheduling
//!
//! The engine is single-threaded and cooperative. Everything it defers
//! becomes a task on a [`TaskQueue`]: the batching drain, the delayed focus,
//! request timeouts and condition polls. The queue is an ordered list of
//! closures tagged with a due time on a virtual millisecond clock.
//!
//! # Design Decisions
//!
//! 1. The clock is virtual. A browser host pumps the queue from a real timer
//!    (`run_due` after advancing to the current time), while tests step it
//!    explicitly with `advance` or `run_until_idle`.
//!
//! 2. Tasks run in (due time, scheduling order). Two zero-delay tasks always
//!    run in the order they were scheduled.
//!
//! 3. Cancellation is by [`TaskId`]. Replacing a pending task is a cancel
//!    followed by a schedule; there is no mutable timer handle.

mod poll;
mod queue;
mod timing;

pub use poll::{Poll, PollOptions, PollStatus};
pub use queue::{TaskId, TaskQueue};
pub use timing::{Debounce, Throttle};
