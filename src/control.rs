use std::{
    any::type_name,
    fmt,
    ptr::{self, NonNull},
    sync::atomic::{AtomicPtr, Ordering},
};

use crate::counter::{Count, RefCount};

/// Shared state of one ownership group.
///
/// Holds the number of live handles and a type-erased way of destroying the
/// owned object. The destroyer is bound to the concrete type the group was
/// created from, so the object is dropped correctly whatever view the last
/// handle has of it.
pub(crate) struct ControlBlock
{
    count: Count,
    object: AtomicPtr<()>,
    destroyer: unsafe fn(NonNull<()>),
    type_name: &'static str,
}

impl ControlBlock
{
    /// Allocates a block owning `object`, with a count of one.
    ///
    /// # Safety
    /// `object` must come from `Box::<U>::into_raw` and not be owned by
    /// anything else.
    pub(crate) unsafe fn acquire<U>(object: NonNull<U>) -> NonNull<Self>
    {
        let block = Box::new(ControlBlock {
            count: Count::one(),
            object: AtomicPtr::new(object.cast::<()>().as_ptr()),
            destroyer: Self::destroy_function::<U>,
            type_name: type_name::<U>(),
        });
        log::trace!("acquired {} at {:p}", block.type_name, object);
        #[cfg(feature = "stats")]
        crate::stats::record_acquire(block.type_name);
        NonNull::from(Box::leak(block))
    }

    unsafe fn destroy_function<U>(object: NonNull<()>)
    {
        drop(Box::from_raw(object.cast::<U>().as_ptr()))
    }

    #[inline]
    pub(crate) fn add_ref(&self) { self.count.increment(); }

    #[inline]
    pub(crate) fn dec_ref(&self) -> usize { self.count.decrement() }

    pub(crate) fn count(&self) -> usize { self.count.count() }

    /// Runs the destroyer on the owned object and clears it.
    ///
    /// Only the caller that brought the count to zero may call this. The
    /// object pointer is swapped out, so a second call is a no-op.
    pub(crate) fn release(&self)
    {
        let object = self.object.swap(ptr::null_mut(), Ordering::AcqRel);
        if let Some(object) = NonNull::new(object) {
            log::trace!("destroying {} at {:p}", self.type_name, object);
            unsafe { (self.destroyer)(object) }
            #[cfg(feature = "stats")]
            crate::stats::record_release(self.type_name);
        }
    }

    /// Gives up one reference to the block at `this`, destroying the object
    /// and freeing the block on the zero-crossing.
    ///
    /// # Safety
    /// `this` must be a live block and the caller must own one of its
    /// references, which it may not use afterwards.
    pub(crate) unsafe fn drop_ref(this: NonNull<Self>)
    {
        if this.as_ref().dec_ref() == 0 {
            this.as_ref().release();
            drop(Box::from_raw(this.as_ptr()));
        }
    }

    #[cfg(test)]
    pub(crate) fn type_name(&self) -> &'static str { self.type_name }

    #[cfg(test)]
    pub(crate) fn is_released(&self) -> bool { self.object.load(Ordering::Acquire).is_null() }
}

impl fmt::Debug for ControlBlock
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ControlBlock")
            .field("count", &self.count())
            .field("object", &self.object.load(Ordering::Relaxed))
            .field("type_name", &self.type_name)
            .finish()
    }
}
