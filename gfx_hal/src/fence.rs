//! One-shot synchronization between the engine and other threads.
//!
//! A fence becomes *submitted* when a command buffer is submitted with it and *signaled* once
//! the engine executed the last task of that submission. Waiting on a fence that was never
//! submitted returns immediately.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::Error;
use crate::handle::{Handle, Resource, ResourceKind};

pub type Fence = Handle<FenceObject>;

#[derive(Debug, Default)]
pub struct FenceObject {
    signal: Arc<FenceSignal>,
}

/// The state of a fence, shared with waiters and the signaling task outside of the handle
/// lock.
#[derive(Debug, Default)]
pub(crate) struct FenceSignal {
    state: Mutex<FenceState>,
    signaled: Condvar,
}

#[derive(Copy, Clone, Debug, Default)]
struct FenceState {
    submitted: bool,
    signaled: bool,
}

impl FenceState {
    #[inline]
    fn is_pending(&self) -> bool {
        self.submitted && !self.signaled
    }
}

impl FenceSignal {
    pub(crate) fn signal(&self) {
        let mut state = self.state.lock();
        state.signaled = true;
        self.signaled.notify_all();
    }

    fn wait(&self) {
        let mut state = self.state.lock();
        while state.is_pending() {
            self.signaled.wait(&mut state);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;

        let mut state = self.state.lock();
        while state.is_pending() {
            if self.signaled.wait_until(&mut state, deadline).timed_out() {
                return !state.is_pending();
            }
        }

        true
    }
}

impl FenceObject {
    pub fn is_submitted(&self) -> bool {
        self.signal.state.lock().submitted
    }

    pub fn is_signaled(&self) -> bool {
        self.signal.state.lock().signaled
    }

    /// Resets the fence into the submitted, unsignaled state and returns the signal to raise
    /// once the submission executed.
    pub(crate) fn submit(&self) -> Arc<FenceSignal> {
        let mut state = self.signal.state.lock();
        state.submitted = true;
        state.signaled = false;
        self.signal.clone()
    }

    pub fn wait(&self) {
        self.signal.wait();
    }

    /// Waits until the fence is signaled or `timeout` elapsed. Returns `true` if the fence is
    /// no longer pending.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.signal.wait_timeout(timeout)
    }
}

impl Resource for FenceObject {
    const KIND: ResourceKind = ResourceKind::Fence;
}

impl Handle<FenceObject> {
    /// Blocks until the fence is signaled. Returns immediately if it was never submitted.
    ///
    /// The handle is not locked while blocking.
    pub fn wait(&self) -> Result<(), Error> {
        let signal = self.read()?.signal.clone();
        signal.wait();
        Ok(())
    }

    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, Error> {
        let signal = self.read()?.signal.clone();
        Ok(signal.wait_timeout(timeout))
    }

    pub fn is_signaled(&self) -> Result<bool, Error> {
        Ok(self.read()?.is_signaled())
    }
}

/// Waits on every fence in turn.
pub fn wait_multiple(fences: &[Fence]) -> Result<(), Error> {
    for fence in fences {
        fence.wait()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{wait_multiple, Fence, FenceObject};

    #[test]
    fn unsubmitted_fence_does_not_block() {
        let fence = Fence::new(FenceObject::default());
        fence.wait().unwrap();
        assert!(!fence.is_signaled().unwrap());
    }

    #[test]
    fn wait_until_signaled() {
        let fence = Fence::new(FenceObject::default());
        let signal = fence.read().unwrap().submit();

        let signaler = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            signal.signal();
        });

        fence.wait().unwrap();
        assert!(fence.is_signaled().unwrap());
        signaler.join().unwrap();
    }

    #[test]
    fn wait_timeout_on_pending_fence() {
        let fence = FenceObject::default();
        let signal = fence.submit();
        assert!(!fence.wait_timeout(Duration::from_millis(10)));

        signal.signal();
        assert!(fence.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn resubmit_resets_signal() {
        let fence = FenceObject::default();
        fence.submit().signal();
        assert!(fence.is_signaled());

        fence.submit();
        assert!(!fence.is_signaled());
        assert!(fence.is_submitted());
    }

    #[test]
    fn waiter_does_not_block_writers() {
        let fence = Fence::new(FenceObject::default());
        let signal = fence.read().unwrap().submit();

        let waiter = std::thread::spawn({
            let fence = fence.clone();
            move || fence.wait().unwrap()
        });

        std::thread::sleep(Duration::from_millis(20));
        // Would queue behind the waiter if it held the handle lock.
        drop(fence.write().unwrap());
        assert!(!fence.is_signaled().unwrap());

        signal.signal();
        waiter.join().unwrap();
    }

    #[test]
    fn wait_on_many_fences() {
        let fences: Vec<_> = (0..4).map(|_| Fence::new(FenceObject::default())).collect();
        let signals: Vec<_> = fences
            .iter()
            .map(|fence| fence.read().unwrap().submit())
            .collect();

        let waiter = std::thread::spawn({
            let fences = fences.clone();
            move || wait_multiple(&fences).unwrap()
        });

        for signal in signals.iter().rev() {
            signal.signal();
        }

        waiter.join().unwrap();
    }
}
