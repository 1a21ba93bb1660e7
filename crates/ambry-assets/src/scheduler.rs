//! A single-threaded cooperative scheduler.
//!
//! Tasks run on an [`async_executor::LocalExecutor`] owned by the thread that ticks the
//! scheduler. A [`Scheduler::tick`] grants at most one poll per live task, so a task
//! that yields (for example through `futures_lite::future::yield_now`) runs again on
//! the next tick.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use async_executor::LocalExecutor;

pub use async_executor::Task;

/// Runs long-lived, non-`Send` tasks on the thread that owns it.
///
/// # Example
///
/// ```
/// use ambry_assets::scheduler::Scheduler;
/// use futures_lite::future::{block_on, yield_now};
///
/// let scheduler = Scheduler::new();
/// let task = scheduler.spawn(async {
///     yield_now().await;
///     42
/// });
///
/// scheduler.tick();
/// assert!(!task.is_finished());
/// scheduler.tick();
/// assert!(task.is_finished());
/// assert_eq!(block_on(task), 42);
/// ```
#[derive(Default)]
pub struct Scheduler {
    executor: LocalExecutor<'static>,
    live: Rc<Cell<usize>>,
    ticks: Cell<u64>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("tasks", &self.task_count())
            .field("ticks", &self.ticks.get())
            .finish()
    }
}

/// Counts a task as live until its future is dropped.
struct LiveGuard(Rc<Cell<usize>>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. It is first polled on the next tick.
    ///
    /// Dropping the returned [`Task`] cancels it; call [`Task::detach`] to keep it
    /// running unobserved.
    pub fn spawn<F>(&self, future: F) -> Task<F::Output>
    where
        F: Future + 'static,
        F::Output: 'static,
    {
        self.live.set(self.live.get() + 1);
        let guard = LiveGuard(Rc::clone(&self.live));
        self.executor.spawn(async move {
            let _guard = guard;
            future.await
        })
    }

    /// Run up to one poll per live task; returns the number still running.
    ///
    /// Tasks spawned during the tick are polled on the following one.
    pub fn tick(&self) -> usize {
        ambry_core::profiling::profile_function!();

        for _ in 0..self.live.get() {
            if !self.executor.try_tick() {
                break;
            }
        }
        self.ticks.set(self.ticks.get() + 1);
        self.live.get()
    }

    /// Number of tasks that have not completed, including ones not yet polled.
    pub fn task_count(&self) -> usize {
        self.live.get()
    }

    /// Number of ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_lite::future::{block_on, yield_now};

    #[test]
    fn test_each_task_polled_once_per_tick() {
        let scheduler = Scheduler::new();
        let polls = Rc::new(Cell::new(0));

        let counter = polls.clone();
        let _forever = scheduler.spawn(async move {
            loop {
                counter.set(counter.get() + 1);
                yield_now().await;
            }
        });

        for _ in 0..5 {
            assert_eq!(scheduler.tick(), 1);
        }
        assert_eq!(polls.get(), 5);
    }

    #[test]
    fn test_completed_tasks_are_dropped() {
        let scheduler = Scheduler::new();
        let task = scheduler.spawn(async { "done" });
        assert_eq!(scheduler.task_count(), 1);
        assert_eq!(scheduler.tick(), 0);
        assert_eq!(scheduler.task_count(), 0);
        assert!(task.is_finished());
        assert_eq!(block_on(task), "done");
    }

    #[test]
    fn test_spawn_during_tick_runs_next_tick() {
        let scheduler = Rc::new(Scheduler::new());
        let inner_ran = Rc::new(Cell::new(false));

        let spawner = scheduler.clone();
        let flag = inner_ran.clone();
        scheduler
            .spawn(async move {
                let flag = flag.clone();
                spawner.spawn(async move { flag.set(true) }).detach();
            })
            .detach();

        scheduler.tick();
        assert!(!inner_ran.get());
        scheduler.tick();
        assert!(inner_ran.get());
        assert_eq!(scheduler.ticks(), 2);
    }

    #[test]
    fn test_dropped_task_is_cancelled() {
        let scheduler = Scheduler::new();
        let polls = Rc::new(Cell::new(0));

        let counter = polls.clone();
        let task = scheduler.spawn(async move {
            loop {
                counter.set(counter.get() + 1);
                yield_now().await;
            }
        });
        scheduler.tick();
        assert_eq!(polls.get(), 1);

        drop(task);
        scheduler.tick();
        assert_eq!(scheduler.task_count(), 0);
        scheduler.tick();
        assert_eq!(polls.get(), 1);
    }
}
