//! Reference-counted handles to resource objects.
//!
//! A [`Handle`] points to a single heap block holding an atomic reference counter, a
//! read/write lock and the object itself. Cloning a handle increments the counter; dropping
//! the last handle drops the object in place and frees the block. The object's [`Drop`] impl
//! is the destructor of the resource kind. Since handles can be dropped on any thread, object
//! destructors must never call into the backend directly, instead they enqueue a deletion
//! task.

use std::fmt::{self, Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Sampler,
    Shader,
    GraphicsPipeline,
    FrameBuffer,
    ResourcesDescriptor,
    Fence,
    CommandBuffer,
}

impl ResourceKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Buffer => "buffer",
            Self::Texture => "texture",
            Self::Sampler => "texture sampler",
            Self::Shader => "shader",
            Self::GraphicsPipeline => "graphics pipeline",
            Self::FrameBuffer => "frame buffer",
            Self::ResourcesDescriptor => "resources descriptor",
            Self::Fence => "fence",
            Self::CommandBuffer => "command buffer",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An object that can be owned by a [`Handle`].
pub trait Resource: Send + Sync + 'static {
    const KIND: ResourceKind;
}

#[derive(Debug)]
struct RefCount(AtomicUsize);

impl RefCount {
    const fn new() -> Self {
        Self(AtomicUsize::new(1))
    }

    fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrements the reference counter and returns whether the refcount was the last one.
    #[must_use]
    fn decrement(&self) -> bool {
        if self.0.fetch_sub(1, Ordering::Release) != 1 {
            return false;
        }

        // Synchronize with all `Release` decrements of other owners before the object is
        // dropped.
        self.0.load(Ordering::Acquire);
        true
    }

    fn get(&self) -> usize {
        self.0.load(Ordering::Relaxed)
    }
}

struct Block<T> {
    ref_count: RefCount,
    object: RwLock<T>,
}

/// A shared owner of an object of type `T`.
///
/// A handle is either empty (see [`Handle::empty`]) or points to a live object. Two handles
/// are equal if they point to the same object.
pub struct Handle<T> {
    ptr: Option<NonNull<Block<T>>>,
    _marker: PhantomData<Block<T>>,
}

impl<T> Handle<T> {
    pub fn new(object: T) -> Self {
        let block = Box::new(Block {
            ref_count: RefCount::new(),
            object: RwLock::new(object),
        });

        Self {
            ptr: Some(NonNull::from(Box::leak(block))),
            _marker: PhantomData,
        }
    }

    /// Creates a handle that does not point to any object.
    pub const fn empty() -> Self {
        Self {
            ptr: None,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ptr.is_none()
    }

    /// Returns the number of handles pointing to the object, or `0` if the handle is empty.
    pub fn ref_count(&self) -> usize {
        self.block().map_or(0, |block| block.ref_count.get())
    }

    #[inline]
    fn block(&self) -> Option<&Block<T>> {
        // SAFETY: The block is alive as long as this handle holds a reference to it.
        self.ptr.map(|ptr| unsafe { ptr.as_ref() })
    }
}

impl<T> Handle<T>
where
    T: Resource,
{
    /// Acquires shared access to the object.
    ///
    /// Blocks while another thread holds exclusive access.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, T>, Error> {
        self.block()
            .map(|block| block.object.read())
            .ok_or(Error::EmptyHandle(T::KIND))
    }

    /// Acquires exclusive access to the object.
    ///
    /// Blocks while any other thread holds shared or exclusive access.
    pub fn write(&self) -> Result<RwLockWriteGuard<'_, T>, Error> {
        self.block()
            .map(|block| block.object.write())
            .ok_or(Error::EmptyHandle(T::KIND))
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        if let Some(block) = self.block() {
            block.ref_count.increment();
        }

        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        let Some(ptr) = self.ptr else {
            return;
        };

        // SAFETY: We still hold our reference, so the block is alive.
        if unsafe { ptr.as_ref() }.ref_count.decrement() {
            // SAFETY: We were the last owner. The block was allocated by `Box` in `new` and
            // no other handle can access it anymore.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }
}

impl<T> Default for Handle<T> {
    #[inline]
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ptr.hash(state);
    }
}

impl<T> Debug for Handle<T>
where
    T: Resource,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &T::KIND)
            .field("ptr", &self.ptr)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

// SAFETY: A handle only gives out access to `T` through the `RwLock`, which requires
// `T: Send + Sync` for shared access from multiple threads. The object may be dropped on
// whichever thread drops the last handle, which requires `T: Send`.
unsafe impl<T> Send for Handle<T> where T: Send + Sync {}
unsafe impl<T> Sync for Handle<T> where T: Send + Sync {}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use super::{Handle, Resource, ResourceKind};
    use crate::Error;

    struct Tracked {
        drops: Arc<AtomicUsize>,
        value: u64,
    }

    impl Resource for Tracked {
        const KIND: ResourceKind = ResourceKind::Buffer;
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked() -> (Handle<Tracked>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let handle = Handle::new(Tracked {
            drops: drops.clone(),
            value: 0,
        });
        (handle, drops)
    }

    #[test]
    fn destroyed_once_after_last_owner() {
        const CLONES: usize = 16;

        let (handle, drops) = tracked();
        let barrier = Arc::new(Barrier::new(CLONES));

        let threads: Vec<_> = (0..CLONES)
            .map(|_| {
                let handle = handle.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    drop(handle);
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(drops.load(Ordering::SeqCst), 0);
        assert_eq!(handle.ref_count(), 1);

        drop(handle);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_handle() {
        let handle = Handle::<Tracked>::default();
        assert!(handle.is_empty());
        assert_eq!(handle.ref_count(), 0);
        assert!(matches!(
            handle.read(),
            Err(Error::EmptyHandle(ResourceKind::Buffer))
        ));

        let cloned = handle.clone();
        assert_eq!(cloned, handle);
    }

    #[test]
    fn equality_is_identity() {
        let (a, _) = tracked();
        let (b, _) = tracked();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);

        let set: HashSet<_> = [a.clone(), a.clone(), b.clone()].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn write_access_is_exclusive() {
        const THREADS: usize = 8;
        const ITERATIONS: u64 = 1000;

        let (handle, _) = tracked();

        let threads: Vec<_> = (0..THREADS)
            .map(|_| {
                let handle = handle.clone();
                std::thread::spawn(move || {
                    for _ in 0..ITERATIONS {
                        let mut object = handle.write().unwrap();
                        let value = object.value;
                        std::thread::yield_now();
                        object.value = value + 1;
                    }
                })
            })
            .collect();

        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(handle.read().unwrap().value, THREADS as u64 * ITERATIONS);
    }

    #[test]
    fn read_access_is_shared() {
        let (handle, _) = tracked();

        let first = handle.read().unwrap();
        let second = handle.read().unwrap();
        assert_eq!(first.value, second.value);
    }
}
