//! Process-wide ledger of ownership groups, for diagnosing leaks.
//!
//! Only touched when a group is created or its object destroyed, never on
//! clone or drop of a handle that is not the last.

use std::{any::type_name, collections::HashMap};

use lazy_static::lazy_static;
use parking_lot::Mutex;

lazy_static! {
    static ref LEDGER: Mutex<HashMap<&'static str, TypeStats>> = Mutex::new(HashMap::new());
}

/// Group counts for one concrete type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TypeStats
{
    /// Groups created for objects of this type.
    pub acquired: usize,

    /// Objects of this type destroyed by their last handle.
    pub released: usize,
}

impl TypeStats
{
    /// Objects of this type still owned by some handle.
    pub fn live(&self) -> usize { self.acquired - self.released }
}

/// Snapshot of the ledger, keyed by concrete type name.
#[derive(Debug, Default, Clone)]
pub struct Stats
{
    pub by_type: HashMap<&'static str, TypeStats>,
}

impl Stats
{
    /// Counts for objects created as a `T`.
    pub fn of<T: ?Sized>(&self) -> TypeStats
    {
        self.by_type
            .get(type_name::<T>())
            .copied()
            .unwrap_or_default()
    }

    pub fn acquired(&self) -> usize { self.by_type.values().map(|s| s.acquired).sum() }

    pub fn released(&self) -> usize { self.by_type.values().map(|s| s.released).sum() }

    /// Number of objects still alive across all types.
    pub fn live_objects(&self) -> usize { self.by_type.values().map(TypeStats::live).sum() }
}

pub fn get_stats() -> Stats
{
    Stats {
        by_type: LEDGER.lock().clone(),
    }
}

pub(crate) fn record_acquire(type_name: &'static str)
{
    LEDGER.lock().entry(type_name).or_default().acquired += 1;
}

pub(crate) fn record_release(type_name: &'static str)
{
    LEDGER.lock().entry(type_name).or_default().released += 1;
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::{cast, upcast, Shared};

    struct Ledgered(#[allow(dead_code)] u32);

    trait Marker {}
    impl Marker for Ledgered {}
    upcast!(Ledgered => dyn Marker);

    #[test]
    fn ledger_tracks_groups()
    {
        let before = get_stats().of::<Ledgered>();

        let a = Shared::new(Ledgered(1));
        let b = a.clone();
        let c = cast::<dyn Marker, _>(&b);
        let d = Shared::new(Ledgered(2));

        let during = get_stats().of::<Ledgered>();
        assert_eq!(during.acquired - before.acquired, 2);
        assert_eq!(during.live() - before.live(), 2);

        drop((a, b, d));
        let after_some = get_stats().of::<Ledgered>();
        assert_eq!(after_some.released - before.released, 1);

        drop(c);
        let after = get_stats().of::<Ledgered>();
        assert_eq!(after.released - before.released, 2);
        assert_eq!(after.live(), before.live());
        assert_eq!(get_stats().of::<dyn Marker>(), TypeStats::default());
    }
}
