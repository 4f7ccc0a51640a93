//! Thread-parking primitive for the engine thread.
//!
//! A [`Parker`] has exactly one parking thread and any number of unparking threads. Wakeups
//! coalesce: any number of [`unpark`] calls made while the owner is awake result in a single
//! immediate return from the next [`park`]. This is sufficient for a single consumer that
//! rechecks its queues after every wakeup.
//!
//! [`park`]: Parker::park
//! [`unpark`]: Parker::unpark

use std::sync::PoisonError;

use crate::loom::sync::atomic::{AtomicBool, Ordering};
use crate::loom::sync::{Condvar, Mutex};

#[derive(Debug)]
pub struct Parker {
    notified: AtomicBool,
    mutex: Mutex<()>,
    cvar: Condvar,
}

impl Parker {
    #[cfg(not(loom))]
    #[inline]
    pub const fn new() -> Self {
        Self {
            notified: AtomicBool::new(false),
            mutex: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    #[cfg(loom)]
    pub fn new() -> Self {
        Self {
            notified: AtomicBool::new(false),
            mutex: Mutex::new(()),
            cvar: Condvar::new(),
        }
    }

    /// Puts the calling thread to sleep until it is unparked.
    ///
    /// Returns immediately if an unpark happened since the last call to `park`. Never returns
    /// spuriously.
    pub fn park(&self) {
        if self.take_notification() {
            return;
        }

        let mut guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);

        // An unpark may have happened between the check above and acquiring the mutex. After
        // that point the unparker has to wait for the mutex, which is only released once we
        // sleep on the condvar.
        while !self.take_notification() {
            guard = self
                .cvar
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Wakes up the parked thread, or makes the next [`park`] return immediately.
    ///
    /// [`park`]: Self::park
    pub fn unpark(&self) {
        // Release pairs with the Acquire swap in `take_notification`, making all writes
        // before the unpark (e.g. a pushed task) visible to the woken thread.
        if self.notified.swap(true, Ordering::Release) {
            // Already notified and not consumed yet.
            return;
        }

        drop(self.mutex.lock());
        self.cvar.notify_one();
    }

    fn take_notification(&self) -> bool {
        self.notified.swap(false, Ordering::Acquire)
    }
}

impl Default for Parker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use std::sync::Arc;

    use super::Parker;

    const NUM_THREADS: usize = 64;

    #[test]
    fn park_after_unpark_returns() {
        let parker = Parker::new();
        parker.unpark();
        parker.park();
    }

    #[test]
    fn unpark_from_other_thread() {
        let parker = Arc::new(Parker::new());
        let unparker = parker.clone();

        std::thread::spawn(move || {
            unparker.unpark();
        });

        parker.park();
    }

    #[test]
    fn unparks_coalesce() {
        let parker = Arc::new(Parker::new());

        let handles: Vec<_> = (0..NUM_THREADS)
            .map(|_| {
                let unparker = parker.clone();
                std::thread::spawn(move || unparker.unpark())
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        parker.park();
        assert!(!parker.take_notification());
    }
}
