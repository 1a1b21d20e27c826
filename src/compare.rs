//! Comparisons between handles, by the address of the object they observe.
//!
//! Two handles are equal when they observe the same address, whether or not
//! they view it as the same type. Pointer metadata (vtables, lengths) is
//! ignored.
//!
//! Distinct zero-sized objects may sit at the same address, so a zero-sized
//! view is only equal to views in its own group.

use std::{
    cmp::Ordering,
    hash::{Hash, Hasher},
    mem,
    ptr,
};

use crate::pointers::Shared;

/// The null sentinel. Equal to every null handle and to no owning one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Null;

impl<T: ?Sized> From<Null> for Shared<T>
{
    fn from(_: Null) -> Self { Self::null() }
}

/// The key every comparison goes through: the observed address, then the
/// control block for zero-sized views.
fn identity<T: ?Sized>(handle: &Shared<T>) -> (*const (), *const ())
{
    match handle.raw() {
        Some(raw) if mem::size_of_val(unsafe { raw.observed.as_ref() }) == 0 => {
            (handle.addr(), raw.control.cast::<()>().as_ptr() as *const ())
        }
        _ => (handle.addr(), ptr::null()),
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Shared<U>> for Shared<T>
{
    fn eq(&self, other: &Shared<U>) -> bool { identity(self) == identity(other) }
}

impl<T: ?Sized> Eq for Shared<T> {}

impl<T: ?Sized> PartialEq<Null> for Shared<T>
{
    fn eq(&self, _: &Null) -> bool { self.is_null() }
}

impl<T: ?Sized> PartialEq<Shared<T>> for Null
{
    fn eq(&self, other: &Shared<T>) -> bool { other.is_null() }
}

impl<T: ?Sized, U: ?Sized> PartialOrd<Shared<U>> for Shared<T>
{
    fn partial_cmp(&self, other: &Shared<U>) -> Option<Ordering> { Some(identity(self).cmp(&identity(other))) }
}

impl<T: ?Sized> Ord for Shared<T>
{
    fn cmp(&self, other: &Self) -> Ordering { identity(self).cmp(&identity(other)) }
}

impl<T: ?Sized> Hash for Shared<T>
{
    fn hash<H: Hasher>(&self, state: &mut H) { identity(self).hash(state) }
}
