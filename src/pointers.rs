use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
};

use crate::{
    casts::{cast, Upcast},
    control::ControlBlock,
};

/// The two pointers an owning handle carries: its view of the object and the
/// control block of the group it belongs to.
pub(crate) struct RawShared<T: ?Sized>
{
    pub(crate) observed: NonNull<T>,
    pub(crate) control: NonNull<ControlBlock>,
    /// Set when `observed` came out of a projection closure and may point
    /// anywhere, not only into the group's object.
    pub(crate) projected: bool,
}

impl<T: ?Sized> Clone for RawShared<T>
{
    fn clone(&self) -> Self { *self }
}
impl<T: ?Sized> Copy for RawShared<T> {}

impl<T: ?Sized> RawShared<T>
{
    pub(crate) fn control(&self) -> &ControlBlock { unsafe { self.control.as_ref() } }

    /// Same group, new view derived from this one's pointer.
    pub(crate) fn view<U: ?Sized>(self, observed: NonNull<U>) -> RawShared<U>
    {
        RawShared {
            observed,
            control: self.control,
            projected: self.projected,
        }
    }

    /// Same group, new view of memory only known to be valid while the
    /// group's object is.
    pub(crate) fn projection<U: ?Sized>(self, observed: NonNull<U>) -> RawShared<U>
    {
        RawShared {
            observed,
            control: self.control,
            projected: true,
        }
    }
}

/// Shared-ownership handle.
///
/// Any number of `Shared` handles may refer to one heap object. The object is
/// dropped exactly once, when the last handle of its ownership group goes
/// away, through the drop glue of the type it was created with. Handles in a
/// group may view the object as different types, see [`cast`](crate::cast)
/// and [`try_cast`](crate::try_cast).
///
/// A handle is either null or owning. Dereferencing a null handle panics; use
/// [`Shared::get`] to check.
pub struct Shared<T: ?Sized>
{
    raw: Option<RawShared<T>>,
    _owns: PhantomData<T>,
}

unsafe impl<T: ?Sized + Send + Sync> Send for Shared<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Shared<T> {}

impl<T> Shared<T>
{
    /// Moves `value` to the heap and starts a new ownership group for it.
    pub fn new(value: T) -> Self { Self::from_box(Box::new(value)) }
}

impl<T: ?Sized> Shared<T>
{
    /// The null handle.
    pub const fn null() -> Self
    {
        Self {
            raw: None,
            _owns: PhantomData,
        }
    }

    /// Takes ownership of a boxed `U` and views it as a `T`.
    ///
    /// The object is destroyed as a `U` no matter how the last handle sees it.
    pub fn from_box<U: Upcast<T>>(object: Box<U>) -> Self
    {
        let object = NonNull::from(Box::leak(object));
        unsafe {
            let control = ControlBlock::acquire(object);
            Self::from_parts(RawShared {
                observed: <U as Upcast<T>>::upcast(object),
                control,
                projected: false,
            })
        }
    }

    /// Takes ownership of `object`. A null pointer gives the null handle.
    ///
    /// # Safety
    /// A non-null `object` must come from `Box::<U>::into_raw` and must not be
    /// used or freed by anything else afterwards.
    pub unsafe fn from_raw<U: Upcast<T>>(object: *mut U) -> Self
    {
        match NonNull::new(object) {
            Some(object) => Self::from_box(Box::from_raw(object.as_ptr())),
            None => Self::null(),
        }
    }

    /// Joins the group of `raw.control` with a view of `raw.observed`,
    /// without counting the new handle.
    ///
    /// # Safety
    /// The caller must have already added the reference this handle will
    /// give up, and `raw.observed` must stay valid as long as the group's
    /// object is alive. Unless `raw.projected` is set, it must also be derived
    /// from the pointer the group's object was created with.
    pub(crate) unsafe fn from_parts(raw: RawShared<T>) -> Self
    {
        Self {
            raw: Some(raw),
            _owns: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> Option<RawShared<T>> { self.raw }

    /// Gives up the handle's parts without touching the count.
    pub(crate) fn into_raw_parts(mut self) -> Option<RawShared<T>> { self.raw.take() }

    /// The observed object, or `None` for a null handle.
    pub fn get(&self) -> Option<&T> { self.raw.map(|raw| unsafe { &*raw.observed.as_ptr() }) }

    /// Mutable access to the observed object if this is the only handle in
    /// its group.
    ///
    /// Views made by [`Shared::map`], and anything cast from them, never give
    /// mutable access: the projection may lead outside the group's object.
    pub fn get_mut(&mut self) -> Option<&mut T>
    {
        match self.raw {
            Some(raw) if !raw.projected && raw.control().count() == 1 => {
                Some(unsafe { &mut *raw.observed.as_ptr() })
            }
            _ => None,
        }
    }

    /// Address of the observed object, null for the null handle.
    pub fn addr(&self) -> *const ()
    {
        self.raw
            .map_or(ptr::null(), |raw| raw.observed.cast::<()>().as_ptr() as *const ())
    }

    pub fn is_some(&self) -> bool { self.raw.is_some() }

    pub fn is_null(&self) -> bool { self.raw.is_none() }

    /// Number of handles in this handle's group, `0` for the null handle.
    pub fn use_count(&self) -> usize { self.raw.map_or(0, |raw| raw.control().count()) }

    /// Whether both handles belong to the same ownership group, whatever
    /// they observe. Null handles belong to no group.
    pub fn same_group<U: ?Sized>(this: &Self, other: &Shared<U>) -> bool
    {
        match (this.raw, other.raw) {
            (Some(a), Some(b)) => a.control == b.control,
            _ => false,
        }
    }

    fn release(&mut self)
    {
        if let Some(raw) = self.raw.take() {
            unsafe { ControlBlock::drop_ref(raw.control) }
        }
    }

    /// Releases this handle's reference, leaving it null.
    pub fn reset(&mut self) { self.release() }

    /// Releases this handle's reference and takes ownership of `object`.
    pub fn reset_with<U: Upcast<T>>(&mut self, object: Box<U>)
    {
        self.release();
        self.raw = Self::from_box(object).into_raw_parts();
    }

    /// Releases this handle's reference and takes ownership of `object`.
    ///
    /// # Safety
    /// Same contract as [`Shared::from_raw`].
    pub unsafe fn reset_raw<U: Upcast<T>>(&mut self, object: *mut U)
    {
        self.release();
        self.raw = Self::from_raw(object).into_raw_parts();
    }

    /// Moves the handle out, leaving null behind.
    pub fn take(&mut self) -> Self { mem::take(self) }

    /// Makes this handle an alias of `source`.
    ///
    /// Nothing happens if this handle already observes the same object in
    /// the same group; otherwise the current reference is released first.
    pub fn assign<U: ?Sized + Upcast<T>>(&mut self, source: &Shared<U>)
    {
        let same_control = self.raw.map(|raw| raw.control) == source.raw.map(|raw| raw.control);
        if same_control && self.addr() == source.addr() {
            return;
        }
        let adopted = cast::<T, U>(source);
        self.release();
        self.raw = adopted.into_raw_parts();
    }

    /// Releases the current reference and moves `source`'s into this handle,
    /// leaving `source` null.
    pub fn assign_from<U: ?Sized + Upcast<T>>(&mut self, source: &mut Shared<U>)
    {
        let adopted = source.take().upcast::<T>();
        self.release();
        self.raw = adopted.into_raw_parts();
    }
}

impl<T: ?Sized> Clone for Shared<T>
{
    fn clone(&self) -> Self
    {
        if let Some(raw) = self.raw {
            raw.control().add_ref();
        }
        Self {
            raw: self.raw,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for Shared<T>
{
    fn drop(&mut self) { self.release() }
}

impl<T: ?Sized> Default for Shared<T>
{
    fn default() -> Self { Self::null() }
}

impl<T: ?Sized> Deref for Shared<T>
{
    type Target = T;

    #[track_caller]
    fn deref(&self) -> &Self::Target
    {
        match self.raw {
            Some(raw) => unsafe { &*raw.observed.as_ptr() },
            None => null_deref(),
        }
    }
}

#[cold]
#[track_caller]
fn null_deref() -> !
{
    panic!("dereferenced a null Shared handle")
}

impl<T> From<Box<T>> for Shared<T>
{
    fn from(it: Box<T>) -> Self { Self::from_box(it) }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Shared<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self.get() {
            Some(it) => f
                .debug_struct("Shared")
                .field("ptr", &self.addr())
                .field("use_count", &self.use_count())
                .field("value", &it)
                .finish(),
            None => f.write_str("Shared(null)"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for Shared<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Pointer::fmt(&self.addr(), f) }
}
