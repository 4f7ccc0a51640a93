//! A single-consumer task executor.
//!
//! An [`Executor`] owns one dedicated thread (the engine thread) together with a state value
//! `C` that is only ever accessed from that thread. Other threads push [`Task`]s into one of
//! the [`QueueClass`] queues through a [`Spawner`]. Tasks of the same class run in FIFO
//! order; across classes the engine always picks the highest priority non-empty queue.

pub mod park;

mod loom;
mod queue;
mod task;

use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use gfx_tracing::trace_span;
use park::Parker;
use parking_lot::{Condvar, Mutex};
use queue::TaskQueue;
use thiserror::Error;

pub use queue::QueueClass;
pub use task::{SharedTask, Task};

/// The state owned by the engine thread.
pub trait ExecutorState: 'static {
    /// Called on the engine thread when a task panicked.
    ///
    /// The engine keeps running after a panicking task.
    fn task_panicked(&mut self, message: &str) {
        tracing::error!("task panicked: {}", message);
    }
}

/// Returned when pushing to an executor that has shut down.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Error)]
#[error("executor is shut down")]
pub struct Closed;

pub struct Executor<C> {
    inner: Arc<Inner<C>>,
    thread: Option<JoinHandle<()>>,
}

struct Inner<C> {
    queues: [TaskQueue<C>; 3],
    parker: Parker,
    shutdown: AtomicBool,
    closed: AtomicBool,
    /// Held while checking whether all queues are idle.
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl<C> Executor<C>
where
    C: ExecutorState,
{
    /// Spawns the engine thread named `name`.
    ///
    /// `init` is called on the engine thread to create the state. The state is dropped on the
    /// engine thread after shutdown.
    pub fn new<F>(name: impl Into<String>, init: F) -> io::Result<Self>
    where
        F: FnOnce() -> C + Send + 'static,
    {
        let inner = Arc::new(Inner {
            queues: [TaskQueue::new(), TaskQueue::new(), TaskQueue::new()],
            parker: Parker::new(),
            shutdown: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            idle_lock: Mutex::new(()),
            idle: Condvar::new(),
        });

        let thread = std::thread::Builder::new().name(name.into()).spawn({
            let inner = inner.clone();
            move || run(inner, init)
        })?;

        Ok(Self {
            inner,
            thread: Some(thread),
        })
    }
}

impl<C> Executor<C> {
    pub fn spawner(&self) -> Spawner<C> {
        Spawner {
            inner: self.inner.clone(),
        }
    }

    /// Stops the engine thread.
    ///
    /// All tasks that were pushed before the call are executed before the thread exits. Pushes
    /// racing with the shutdown either run or fail with [`Closed`].
    pub fn shutdown(mut self) {
        self.shutdown_and_join();
    }

    fn shutdown_and_join(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        self.inner.shutdown.store(true, Ordering::Release);
        self.inner.parker.unpark();

        if thread.join().is_err() {
            tracing::error!("engine thread panicked during shutdown");
        }
    }
}

impl<C> Drop for Executor<C> {
    fn drop(&mut self) {
        self.shutdown_and_join();
    }
}

impl<C> Debug for Executor<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}

/// The producer side of an [`Executor`].
pub struct Spawner<C> {
    inner: Arc<Inner<C>>,
}

impl<C> Spawner<C> {
    /// Pushes a single task into the queue of `class`.
    pub fn push(&self, class: QueueClass, task: Task<C>) -> Result<(), Closed> {
        self.extend(class, [task])
    }

    /// Pushes `tasks` into the queue of `class` as one contiguous run.
    ///
    /// No task pushed by another thread is interleaved with the run.
    pub fn extend<I>(&self, class: QueueClass, tasks: I) -> Result<(), Closed>
    where
        I: IntoIterator<Item = Task<C>>,
    {
        if !self.inner.queue(class).extend(tasks) {
            return Err(Closed);
        }

        self.inner.parker.unpark();
        Ok(())
    }

    /// Blocks until the queue of `class` is empty and all tasks taken from it have finished
    /// executing.
    ///
    /// Must not be called from the engine thread.
    pub fn wait_idle(&self, class: QueueClass) {
        let _span = trace_span!("Spawner::wait_idle").entered();
        self.inner.queue(class).wait_idle();
    }

    /// Blocks until all queues are empty and no task is executing.
    ///
    /// Must not be called from the engine thread.
    pub fn wait_all_idle(&self) {
        let _span = trace_span!("Spawner::wait_all_idle").entered();

        let mut guard = self.inner.idle_lock.lock();
        while !self.inner.is_idle() {
            self.inner.idle.wait(&mut guard);
        }
    }

    /// Returns the number of tasks queued or executing in `class`.
    pub fn pending(&self, class: QueueClass) -> usize {
        self.inner.queue(class).pending()
    }

    /// Returns `true` once the engine thread stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl<C> Clone for Spawner<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C> Debug for Spawner<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<C> Inner<C> {
    #[inline]
    fn queue(&self, class: QueueClass) -> &TaskQueue<C> {
        &self.queues[class.index()]
    }

    fn is_idle(&self) -> bool {
        self.queues.iter().all(|queue| queue.is_idle())
    }

    fn pop(&self) -> Option<(QueueClass, Task<C>)> {
        QueueClass::ALL
            .into_iter()
            .find_map(|class| self.queue(class).pop().map(|task| (class, task)))
    }

    fn close(&self) {
        for queue in &self.queues {
            queue.close();
        }
        self.closed.store(true, Ordering::Release);
    }

    fn notify_if_idle(&self) {
        let _guard = self.idle_lock.lock();
        if self.is_idle() {
            self.idle.notify_all();
        }
    }
}

fn run<C, F>(inner: Arc<Inner<C>>, init: F)
where
    C: ExecutorState,
    F: FnOnce() -> C,
{
    let mut state = match catch_unwind(AssertUnwindSafe(init)) {
        Ok(state) => state,
        Err(payload) => {
            tracing::error!(
                "engine initialization panicked: {}",
                panic_message(&*payload)
            );

            // Without a state no task can run. Dropping them releases everything they
            // captured, including channels other threads may block on.
            inner.close();
            while let Some((class, task)) = inner.pop() {
                drop(task);
                inner.queue(class).complete();
            }
            inner.notify_if_idle();
            return;
        }
    };
    tracing::debug!("engine thread started");

    loop {
        if let Some((class, task)) = inner.pop() {
            execute(&inner, &mut state, class, task);
            continue;
        }

        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }

        inner.parker.park();
    }

    // Tasks pushed between the last pop and closing the queues still have to run.
    inner.close();

    while let Some((class, task)) = inner.pop() {
        execute(&inner, &mut state, class, task);
    }

    drop(state);
    tracing::debug!("engine thread stopped");
}

fn execute<C>(inner: &Inner<C>, state: &mut C, class: QueueClass, task: Task<C>)
where
    C: ExecutorState,
{
    let _span = trace_span!("Executor::execute").entered();

    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| task.run(state))) {
        state.task_panicked(&panic_message(&*payload));
    }

    inner.queue(class).complete();
    inner.notify_if_idle();
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    use parking_lot::Mutex;

    use crate::{Closed, Executor, ExecutorState, QueueClass, Task};

    #[derive(Default)]
    struct Log {
        events: Arc<Mutex<Vec<u32>>>,
        panics: Arc<Mutex<Vec<String>>>,
    }

    impl ExecutorState for Log {
        fn task_panicked(&mut self, message: &str) {
            self.panics.lock().push(message.to_owned());
        }
    }

    fn push_event(class: QueueClass, n: u32) -> (QueueClass, Task<Log>) {
        (class, Task::once(move |log: &mut Log| log.events.lock().push(n)))
    }

    fn executor() -> (Executor<Log>, Arc<Mutex<Vec<u32>>>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let panics = Arc::new(Mutex::new(Vec::new()));

        let executor = Executor::new("test-engine", {
            let events = events.clone();
            let panics = panics.clone();
            move || Log { events, panics }
        })
        .unwrap();

        (executor, events, panics)
    }

    #[test]
    fn same_queue_is_fifo() {
        let (executor, events, _) = executor();
        let spawner = executor.spawner();

        for n in 0..100 {
            let (class, task) = push_event(QueueClass::Transfer, n);
            spawner.push(class, task).unwrap();
        }

        spawner.wait_idle(QueueClass::Transfer);
        assert_eq!(*events.lock(), (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn higher_priority_classes_run_first() {
        let (executor, events, _) = executor();
        let spawner = executor.spawner();

        // Block the engine so that all following tasks are queued at the same time.
        let (tx, rx) = mpsc::channel::<()>();
        spawner
            .push(
                QueueClass::General,
                Task::once(move |_| {
                    let _ = rx.recv();
                }),
            )
            .unwrap();

        for (class, task) in [
            push_event(QueueClass::Transfer, 3),
            push_event(QueueClass::Compute, 2),
            push_event(QueueClass::General, 1),
        ] {
            spawner.push(class, task).unwrap();
        }

        tx.send(()).unwrap();
        spawner.wait_all_idle();

        assert_eq!(*events.lock(), [1, 2, 3]);
    }

    #[test]
    fn wait_idle_waits_for_running_task() {
        let (executor, _, _) = executor();
        let spawner = executor.spawner();

        let done = Arc::new(AtomicUsize::new(0));
        spawner
            .push(QueueClass::Compute, {
                let done = done.clone();
                Task::once(move |_| {
                    std::thread::sleep(Duration::from_millis(20));
                    done.store(1, Ordering::SeqCst);
                })
            })
            .unwrap();

        spawner.wait_idle(QueueClass::Compute);
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn contiguous_runs_are_not_interleaved() {
        let (executor, events, _) = executor();

        let threads: Vec<_> = (0..4)
            .map(|thread| {
                let spawner = executor.spawner();
                std::thread::spawn(move || {
                    for run in 0..10 {
                        let base = thread * 1000 + run * 10;
                        let tasks = (0..5).map(|n| push_event(QueueClass::General, base + n).1);
                        spawner.extend(QueueClass::General, tasks).unwrap();
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }
        executor.spawner().wait_all_idle();

        let events = events.lock();
        assert_eq!(events.len(), 4 * 10 * 5);
        for run in events.chunks(5) {
            let base = run[0];
            assert_eq!(run, [base, base + 1, base + 2, base + 3, base + 4]);
        }
    }

    #[test]
    fn panicking_task_is_reported() {
        let (executor, events, panics) = executor();
        let spawner = executor.spawner();

        spawner
            .push(QueueClass::General, Task::once(|_| panic!("boom")))
            .unwrap();
        let (class, task) = push_event(QueueClass::General, 7);
        spawner.push(class, task).unwrap();

        spawner.wait_all_idle();
        assert_eq!(*panics.lock(), ["boom"]);
        assert_eq!(*events.lock(), [7]);
    }

    #[test]
    fn panicking_init_closes_executor() {
        let executor = Executor::new("test-engine", || -> Log { panic!("no device") }).unwrap();
        let spawner = executor.spawner();

        let (tx, rx) = mpsc::channel::<()>();
        // The task either never gets queued or is dropped without running.
        let _ = spawner.push(QueueClass::General, Task::once(move |_| {
            let _ = tx.send(());
        }));
        assert!(rx.recv().is_err());

        executor.shutdown();
        assert!(spawner.is_closed());
    }

    #[test]
    fn shutdown_runs_pending_tasks() {
        let (executor, events, _) = executor();
        let spawner = executor.spawner();

        for n in 0..10 {
            let (class, task) = push_event(QueueClass::Transfer, n);
            spawner.push(class, task).unwrap();
        }

        executor.shutdown();
        assert_eq!(events.lock().len(), 10);

        assert!(spawner.is_closed());
        let (class, task) = push_event(QueueClass::General, 0);
        assert_eq!(spawner.push(class, task), Err(Closed));
    }
}
