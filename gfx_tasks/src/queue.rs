use std::collections::VecDeque;
use std::fmt::{self, Display, Formatter};

use parking_lot::{Condvar, Mutex};

use crate::task::Task;

/// The emulated hardware queue a task is submitted to.
///
/// All classes are multiplexed onto the same engine thread. When more than one queue has
/// pending work, `General` is drained before `Compute`, and `Compute` before `Transfer`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum QueueClass {
    General,
    Compute,
    Transfer,
}

impl QueueClass {
    /// All queue classes in execution priority order.
    pub const ALL: [Self; 3] = [Self::General, Self::Compute, Self::Transfer];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::General => 0,
            Self::Compute => 1,
            Self::Transfer => 2,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Compute => "compute",
            Self::Transfer => "transfer",
        }
    }
}

impl Display for QueueClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A FIFO of tasks for a single [`QueueClass`].
pub(crate) struct TaskQueue<C> {
    state: Mutex<QueueState<C>>,
    /// Notified whenever the queue becomes idle.
    empty: Condvar,
}

struct QueueState<C> {
    tasks: VecDeque<Task<C>>,
    /// Number of tasks that were popped but have not finished executing.
    running: usize,
    closed: bool,
}

impl<C> QueueState<C> {
    #[inline]
    fn is_idle(&self) -> bool {
        self.tasks.is_empty() && self.running == 0
    }
}

impl<C> TaskQueue<C> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                tasks: VecDeque::new(),
                running: 0,
                closed: false,
            }),
            empty: Condvar::new(),
        }
    }

    /// Appends all `tasks` as one contiguous run.
    ///
    /// Returns `false` without pushing anything if the queue was closed.
    pub(crate) fn extend<I>(&self, tasks: I) -> bool
    where
        I: IntoIterator<Item = Task<C>>,
    {
        let mut state = self.state.lock();
        if state.closed {
            return false;
        }

        state.tasks.extend(tasks);
        true
    }

    /// Takes the next task. The caller must call [`complete`] once the task has executed.
    ///
    /// [`complete`]: Self::complete
    pub(crate) fn pop(&self) -> Option<Task<C>> {
        let mut state = self.state.lock();
        let task = state.tasks.pop_front()?;
        state.running += 1;
        Some(task)
    }

    pub(crate) fn complete(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.running > 0);
        state.running -= 1;

        if state.is_idle() {
            self.empty.notify_all();
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.state.lock().is_idle()
    }

    /// Returns the number of queued and running tasks.
    pub(crate) fn pending(&self) -> usize {
        let state = self.state.lock();
        state.tasks.len() + state.running
    }

    /// Blocks until the queue is empty and no task popped from it is still running.
    pub(crate) fn wait_idle(&self) {
        let mut state = self.state.lock();
        while !state.is_idle() {
            self.empty.wait(&mut state);
        }
    }

    /// Rejects all further pushes.
    pub(crate) fn close(&self) {
        self.state.lock().closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::{QueueClass, TaskQueue};
    use crate::task::Task;

    #[test]
    fn queue_is_fifo() {
        let queue = TaskQueue::<Vec<u32>>::new();
        for n in 0..4 {
            queue.extend([Task::once(move |v: &mut Vec<u32>| v.push(n))]);
        }

        let mut out = Vec::new();
        while let Some(task) = queue.pop() {
            task.run(&mut out);
            queue.complete();
        }

        assert_eq!(out, [0, 1, 2, 3]);
        assert!(queue.is_idle());
    }

    #[test]
    fn running_task_is_not_idle() {
        let queue = TaskQueue::<()>::new();
        queue.extend([Task::once(|_| {})]);

        let task = queue.pop().unwrap();
        assert!(!queue.is_idle());
        assert_eq!(queue.pending(), 1);

        task.run(&mut ());
        queue.complete();
        assert!(queue.is_idle());
        queue.wait_idle();
    }

    #[test]
    fn closed_queue_rejects_tasks() {
        let queue = TaskQueue::<()>::new();
        queue.close();
        assert!(!queue.extend([Task::once(|_| {})]));
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn class_priority_order() {
        let mut classes = QueueClass::ALL;
        classes.sort();
        assert_eq!(classes, QueueClass::ALL);
        assert_eq!(QueueClass::Compute.to_string(), "compute");
    }
}
