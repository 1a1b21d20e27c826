//! Thread-safe shared ownership with type-erased destruction.
//!
//! [`Shared<T>`] is a reference-counted handle: any number of handles may
//! own one heap object, which is destroyed exactly once, when the last of
//! them goes away. Handles owning the same object form an *ownership group*
//! around one control block. The control block remembers how to drop the
//! object as the type it was created with, so a group may be viewed through
//! trait objects or fields ([`cast`], [`try_cast`], [`Shared::map`]) and still
//! be destroyed correctly by whichever handle happens to be last.
//!
//! ```
//! use sharedref::{cast, try_cast, upcast, AsAny, Shared};
//!
//! trait Animal: AsAny { fn noise(&self) -> &'static str; }
//! struct Dog;
//! impl Animal for Dog { fn noise(&self) -> &'static str { "woof" } }
//! upcast!(Dog => dyn Animal);
//!
//! let dog = Shared::new(Dog);
//! let animal = cast::<dyn Animal, _>(&dog);
//! drop(dog);
//!
//! assert_eq!(animal.noise(), "woof");
//! let dog = try_cast::<Dog, _>(&animal);
//! assert!(dog.is_some());
//! assert_eq!(animal.use_count(), 2);
//! ```
//!
//! Counting is per group: an atomic counter by default, or a lock owned by
//! each control block with the `locked-count` feature. The `stats` feature
//! keeps a process-wide ledger of created and destroyed objects by type.
//!
//! Not provided: weak references, cycle collection, custom allocators.

pub(crate) mod control;
pub(crate) mod counter;
pub mod casts;
pub mod compare;
pub mod pointers;
#[cfg(feature = "stats")]
pub mod stats;

pub use casts::{cast, try_cast, AsAny, Upcast};
pub use compare::Null;
pub use pointers::Shared;
#[cfg(feature = "stats")]
pub use stats::{get_stats, Stats, TypeStats};
