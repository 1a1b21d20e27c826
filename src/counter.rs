use std::{
    cell::UnsafeCell,
    process,
    sync::atomic::{fence, AtomicUsize, Ordering::*},
};

use lock_api::RawMutex;

/// Counts past this are treated as a leak of handles and abort the process.
pub(crate) const MAX_REFCOUNT: usize = isize::MAX as usize;

pub(crate) trait RefCount: Sized
{
    /// A counter holding one reference.
    fn one() -> Self;

    /// Adds a reference, returning the previous count.
    fn increment(&self) -> usize;

    /// Drops a reference, returning the new count.
    ///
    /// The caller observing `0` has exclusive access to everything the other
    /// owners wrote before their own decrement.
    fn decrement(&self) -> usize;

    fn count(&self) -> usize;
}

#[allow(dead_code)]
#[repr(transparent)]
pub(crate) struct AtomicCount(AtomicUsize);

impl RefCount for AtomicCount
{
    fn one() -> Self { Self(AtomicUsize::new(1)) }

    #[inline(always)]
    fn increment(&self) -> usize
    {
        // A new reference can only be made from an existing one, which
        // already keeps the object alive.
        let old = self.0.fetch_add(1, Relaxed);
        if old > MAX_REFCOUNT {
            overflow(old)
        }
        old
    }

    #[inline(always)]
    fn decrement(&self) -> usize
    {
        let old = self.0.fetch_sub(1, Release);
        debug_assert!(old != 0, "reference count underflow");
        if old == 1 {
            fence(Acquire);
        }
        old - 1
    }

    fn count(&self) -> usize { self.0.load(Acquire) }
}

/// Counter guarded by a lock owned by the control block itself.
#[allow(dead_code)]
pub(crate) struct LockedCount
{
    lock: parking_lot::RawMutex,
    count: UnsafeCell<usize>,
}

unsafe impl Send for LockedCount {}
unsafe impl Sync for LockedCount {}

impl LockedCount
{
    #[inline(always)]
    fn with<R>(&self, f: impl FnOnce(&mut usize) -> R) -> R
    {
        self.lock.lock();
        let res = f(unsafe { &mut *self.count.get() });
        unsafe { self.lock.unlock() };
        res
    }
}

impl RefCount for LockedCount
{
    fn one() -> Self
    {
        Self {
            lock: parking_lot::RawMutex::INIT,
            count: UnsafeCell::new(1),
        }
    }

    fn increment(&self) -> usize
    {
        let old = self.with(|n| {
            let old = *n;
            *n += 1;
            old
        });
        if old > MAX_REFCOUNT {
            overflow(old)
        }
        old
    }

    fn decrement(&self) -> usize
    {
        self.with(|n| {
            debug_assert!(*n != 0, "reference count underflow");
            *n -= 1;
            *n
        })
    }

    fn count(&self) -> usize { self.with(|n| *n) }
}

#[cold]
fn overflow(count: usize) -> !
{
    log::error!("reference count overflow at {count}, aborting");
    process::abort()
}

#[cfg(not(feature = "locked-count"))]
pub(crate) use self::AtomicCount as Count;

#[cfg(feature = "locked-count")]
pub(crate) use self::LockedCount as Count;
