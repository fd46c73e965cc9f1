//! Task trait and per-task completion state

use parking_lot::{Condvar, Mutex};

/// A unit of work executed by a pool worker
///
/// `run` is called exactly once, by exactly one worker thread. Anything the
/// task produces is a side effect the caller arranges for itself.
pub trait Task: Send + 'static {
    /// Execute the task
    fn run(&mut self);
}

impl<F> Task for F
where
    F: FnMut() + Send + 'static,
{
    fn run(&mut self) {
        self()
    }
}

/// Execution state of a submitted task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, not yet picked up by a worker
    Pending,
    /// Currently executing on a worker
    Running,
    /// `run` returned normally
    Completed,
    /// `run` panicked with the given message
    Panicked(String),
}

impl TaskState {
    /// Whether the task has finished running (normally or not)
    pub fn is_finished(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Panicked(_))
    }
}

/// Completion signal owned by every task from the moment it is submitted
///
/// One producer (the worker that runs the task) moves the state forward;
/// any number of consumers may block in [`Completion::wait`].
pub struct Completion {
    state: Mutex<TaskState>,
    condvar: Condvar,
}

impl Completion {
    /// Create a signal in the `Pending` state
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TaskState::Pending),
            condvar: Condvar::new(),
        }
    }

    /// Get the current state
    pub fn state(&self) -> TaskState {
        self.state.lock().clone()
    }

    /// Check whether the task has finished
    pub fn is_finished(&self) -> bool {
        self.state.lock().is_finished()
    }

    /// Record that a worker has started the task
    pub(crate) fn mark_running(&self) {
        let mut state = self.state.lock();
        if *state == TaskState::Pending {
            *state = TaskState::Running;
        }
    }

    /// Move to a finished state and wake every waiter
    ///
    /// The first call wins; the state never leaves a finished state.
    pub(crate) fn finish(&self, outcome: TaskState) {
        debug_assert!(outcome.is_finished());
        let mut state = self.state.lock();
        if state.is_finished() {
            return;
        }
        *state = outcome;
        self.condvar.notify_all();
    }

    /// Block until the task has finished, returning its final state
    pub fn wait(&self) -> TaskState {
        let mut state = self.state.lock();
        while !state.is_finished() {
            self.condvar.wait(&mut state);
        }
        state.clone()
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("state", &*self.state.lock())
            .finish()
    }
}

/// A submitted task: the boxed behavior plus its completion signal
pub(crate) struct TaskCell {
    /// Task body; `None` once reclaimed
    body: Mutex<Option<Box<dyn Task>>>,

    /// Completion signal
    completion: Completion,
}

impl TaskCell {
    pub(crate) fn new(task: Box<dyn Task>) -> Self {
        Self {
            body: Mutex::new(Some(task)),
            completion: Completion::new(),
        }
    }

    pub(crate) fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Run the body on the calling thread
    ///
    /// The body lock is held for the duration of `run`; only the worker
    /// executing the task ever takes it before completion is signalled.
    pub(crate) fn run(&self) {
        let mut body = self.body.lock();
        if let Some(task) = body.as_mut() {
            task.run();
        }
    }

    /// Drop the task body on the calling thread
    ///
    /// Returns `false` if the body was already reclaimed.
    pub(crate) fn reclaim(&self) -> bool {
        let body = self.body.lock().take();
        body.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    struct DropCounter(Arc<AtomicUsize>);

    impl Task for DropCounter {
        fn run(&mut self) {}
    }

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_completion_starts_pending() {
        let completion = Completion::new();
        assert_eq!(completion.state(), TaskState::Pending);
        assert!(!completion.is_finished());
    }

    #[test]
    fn test_completion_state_transitions() {
        let completion = Completion::new();

        completion.mark_running();
        assert_eq!(completion.state(), TaskState::Running);

        completion.finish(TaskState::Completed);
        assert_eq!(completion.state(), TaskState::Completed);
        assert!(completion.is_finished());
    }

    #[test]
    fn test_completion_finishes_once() {
        let completion = Completion::new();

        completion.finish(TaskState::Panicked("boom".to_string()));
        completion.finish(TaskState::Completed);
        completion.mark_running();

        assert_eq!(completion.state(), TaskState::Panicked("boom".to_string()));
    }

    #[test]
    fn test_completion_wait_after_finish() {
        let completion = Completion::new();
        completion.finish(TaskState::Completed);
        assert_eq!(completion.wait(), TaskState::Completed);
    }

    #[test]
    fn test_completion_wakes_all_waiters() {
        let completion = Arc::new(Completion::new());

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let completion = completion.clone();
                thread::spawn(move || completion.wait())
            })
            .collect();

        thread::sleep(Duration::from_millis(20));
        completion.finish(TaskState::Completed);

        for waiter in waiters {
            assert_eq!(waiter.join().unwrap(), TaskState::Completed);
        }
    }

    #[test]
    fn test_closure_is_task() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let cell = TaskCell::new(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        cell.run();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cell_reclaim_drops_body_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let cell = TaskCell::new(Box::new(DropCounter(drops.clone())));

        cell.run();
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        assert!(cell.reclaim());
        assert_eq!(drops.load(Ordering::SeqCst), 1);

        assert!(!cell.reclaim());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
