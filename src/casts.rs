//! Views of one ownership group as different types.
//!
//! Every handle produced here shares the control block of its source, so the
//! object lives until the last of them is gone, whatever type each one
//! observes it through.

use std::{any::Any, ptr::NonNull};

use crate::pointers::Shared;

/// Statically checked conversion of a pointer to `Self` into a pointer to
/// `U`, for instance a concrete type into a trait object it implements.
///
/// Implement it with the [`upcast!`](crate::upcast) macro for unsizing
/// conversions.
///
/// # Safety
/// `upcast` must return a pointer into the same allocation that is valid for
/// as long as the `Self` is. If `U` is `Send + Sync` then so must `Self` be,
/// since the last handle to drop runs `Self`'s destructor wherever it lives.
pub unsafe trait Upcast<U: ?Sized>
{
    fn upcast(this: NonNull<Self>) -> NonNull<U>;
}

unsafe impl<T: ?Sized> Upcast<T> for T
{
    #[inline(always)]
    fn upcast(this: NonNull<T>) -> NonNull<T> { this }
}

/// Implements [`Upcast`] for unsizing conversions.
///
/// ```
/// use sharedref::{cast, upcast, Shared};
///
/// trait Shape { fn area(&self) -> f64; }
/// struct Square(f64);
/// impl Shape for Square { fn area(&self) -> f64 { self.0 * self.0 } }
///
/// upcast!(Square => dyn Shape);
///
/// let square = Shared::new(Square(2.0));
/// let shape = cast::<dyn Shape, _>(&square);
/// assert_eq!(shape.area(), 4.0);
/// assert_eq!(square.use_count(), 2);
/// ```
#[macro_export]
macro_rules! upcast {
    ($($from:ty => $to:ty),+ $(,)?) => {
        $(
            unsafe impl $crate::Upcast<$to> for $from
            {
                #[inline(always)]
                fn upcast(this: ::core::ptr::NonNull<Self>) -> ::core::ptr::NonNull<$to> { this }
            }
        )+
    };
}

/// Access to the concrete type behind a view, for [`try_cast`].
///
/// Make it a supertrait of a trait to allow casting trait objects back to
/// the types implementing it.
pub trait AsAny: Any
{
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T
{
    fn as_any(&self) -> &dyn Any { self }
}

/// New handle viewing `handle`'s object as a `T`, in the same group.
///
/// A null handle gives a null handle.
pub fn cast<T: ?Sized, U: ?Sized + Upcast<T>>(handle: &Shared<U>) -> Shared<T>
{
    match handle.raw() {
        Some(raw) => {
            raw.control().add_ref();
            unsafe { Shared::from_parts(raw.view(<U as Upcast<T>>::upcast(raw.observed))) }
        }
        None => Shared::null(),
    }
}

/// New handle viewing `handle`'s object as a `T` if that is its concrete
/// type, in the same group.
///
/// Otherwise the result is null and `handle`'s group is left untouched.
pub fn try_cast<T: Any, U: ?Sized + AsAny>(handle: &Shared<U>) -> Shared<T>
{
    let Some(raw) = handle.raw() else {
        return Shared::null();
    };
    let object = unsafe { &*raw.observed.as_ptr() };
    if !U::as_any(object).is::<T>() {
        return Shared::null();
    }
    raw.control().add_ref();
    // A thin cast of the group's own pointer; the `&dyn Any` above only
    // grants shared access.
    unsafe { Shared::from_parts(raw.view(raw.observed.cast::<T>())) }
}

impl<T: ?Sized> Shared<T>
{
    /// Converts the handle into a view as `U`, keeping its reference.
    pub fn upcast<U: ?Sized>(self) -> Shared<U>
    where
        T: Upcast<U>,
    {
        match self.into_raw_parts() {
            Some(raw) => unsafe { Shared::from_parts(raw.view(<T as Upcast<U>>::upcast(raw.observed))) },
            None => Shared::null(),
        }
    }

    /// Converts the handle into a view as `U` if that is the concrete type of
    /// its object, handing it back otherwise.
    ///
    /// A null handle converts to a null handle.
    pub fn downcast<U: Any>(self) -> Result<Shared<U>, Self>
    where
        T: AsAny,
    {
        let Some(raw) = self.raw() else {
            return Ok(Shared::null());
        };
        let object = unsafe { &*raw.observed.as_ptr() };
        if !T::as_any(object).is::<U>() {
            return Err(self);
        }
        // The reference moves over to the new view.
        let _ = self.into_raw_parts();
        Ok(unsafe { Shared::from_parts(raw.view(raw.observed.cast::<U>())) })
    }

    /// New handle in the same group viewing the part of the object `f`
    /// selects, typically a field.
    pub fn map<U: ?Sized, F>(this: &Self, f: F) -> Shared<U>
    where
        T: Send + Sync,
        for<'a> F: FnOnce(&'a T) -> &'a U,
    {
        match this.raw() {
            Some(raw) => {
                let observed = NonNull::from(f(unsafe { &*raw.observed.as_ptr() }));
                raw.control().add_ref();
                unsafe { Shared::from_parts(raw.projection(observed)) }
            }
            None => Shared::null(),
        }
    }
}

#[cfg(test)]
mod tests
{
    use std::fmt::Debug;

    use super::*;

    trait Named: AsAny
    {
        fn name(&self) -> String;
    }

    struct Plain(&'static str);
    struct Loud(&'static str);

    impl Named for Plain
    {
        fn name(&self) -> String { self.0.to_string() }
    }

    impl Named for Loud
    {
        fn name(&self) -> String { self.0.to_uppercase() }
    }

    upcast!(Plain => dyn Named, Loud => dyn Named, Loud => dyn Debug);

    impl Debug for Loud
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { write!(f, "Loud") }
    }

    #[test]
    fn cast_aliases_group()
    {
        let loud = Shared::new(Loud("hey"));
        let named = cast::<dyn Named, _>(&loud);
        let debug = cast::<dyn Debug, _>(&loud);

        assert_eq!(named.name(), "HEY");
        assert_eq!(format!("{:?}", &*debug), "Loud");
        assert_eq!(loud.use_count(), 3);
        assert!(Shared::same_group(&loud, &named));
        assert!(Shared::same_group(&named, &debug));
    }

    #[test]
    fn cast_of_null_is_null()
    {
        let null = Shared::<Plain>::null();
        assert!(cast::<dyn Named, _>(&null).is_null());
        assert!(try_cast::<Plain, dyn Named>(&Shared::null()).is_null());
    }

    #[test]
    fn try_cast_checks_concrete_type()
    {
        let named: Shared<dyn Named> = Shared::new(Plain("quiet")).upcast();

        let loud = try_cast::<Loud, _>(&named);
        assert!(loud.is_null());
        assert_eq!(named.use_count(), 1);

        let plain = try_cast::<Plain, _>(&named);
        assert_eq!(plain.0, "quiet");
        assert_eq!(named.use_count(), 2);
    }

    #[test]
    fn downcast_hands_back_on_mismatch()
    {
        let named: Shared<dyn Named> = Shared::new(Loud("a")).upcast();
        let Err(named) = named.downcast::<Plain>() else {
            panic!("a Loud is not a Plain");
        };
        assert_eq!(named.use_count(), 1);

        let loud = named.downcast::<Loud>().ok().unwrap();
        assert_eq!(loud.0, "a");
        assert_eq!(loud.use_count(), 1);
    }

    #[test]
    fn checked_views_write_through_when_unique()
    {
        let named: Shared<dyn Named> = Shared::new(Plain("before")).upcast();
        let mut plain = try_cast::<Plain, _>(&named);
        assert!(plain.get_mut().is_none());

        drop(named);
        plain.get_mut().unwrap().0 = "after";
        assert_eq!(plain.name(), "after");

        let named: Shared<dyn Named> = plain.upcast();
        let mut plain = named.downcast::<Plain>().ok().unwrap();
        plain.get_mut().unwrap().0 = "again";
        assert_eq!(plain.0, "again");
    }

    #[test]
    fn map_views_a_field()
    {
        let pair = Shared::new((String::from("left"), 7u32));
        let right = Shared::map(&pair, |p| &p.1);
        drop(pair);

        assert_eq!(*right, 7);
        assert_eq!(right.use_count(), 1);
    }
}
