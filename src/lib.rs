#![no_std]
#![warn(missing_docs)]

//! Resizable storage backends for capacity-generic data structures.
//!
//! Growable containers usually hard-code their allocation strategy. This
//! crate separates *how capacity is obtained, grown, and released* from
//! *what a container logically holds*, so that the same container logic can
//! run unmodified over the global heap, a fixed inline buffer, a hybrid
//! small-buffer strategy, or a custom allocator.
//!
//! The building blocks, from the bottom up:
//!
//! - [`Block`] is a raw, non-owning capacity descriptor, and [`Constructed`]
//!   is a view denoting "this many live elements start at this offset".
//! - [`raw`] contains the in-place construction and destruction primitives,
//!   including the [`InitGuard`](raw::InitGuard) that keeps bulk construction
//!   panic-safe.
//! - [`GrowthPolicy`] decides how big a replacement block should be.
//! - [`Storage`] is the backend contract, implemented by
//!   [`AllocStorage`](storage::AllocStorage), [`InlineStorage`],
//!   and [`SpillStorage`].
//! - [`ops`] contains the backend-agnostic algorithms (normalize, assign,
//!   fill, transfer, duplicate, clear) that containers build on.
//!
//! Everything is single-threaded and synchronous. Allocation failure and
//! fixed-capacity exhaustion are reported through [`StorageError`]; element
//! `clone`/`drop` panics propagate to the caller after each algorithm has
//! unwound exactly its own partial work, so no element is ever leaked or
//! dropped twice.
//!
//! # Examples
//! ```
//! use yucca::{ops, Constructed, SmallStorage, Storage};
//!
//! let mut storage = SmallStorage::<u32, 4>::new();
//! let mut live = Constructed::new();
//!
//! unsafe {
//!     for i in 0..10 {
//!         storage.reserve(1, &mut live).unwrap();
//!         storage.block().at(live.len()).write(i);
//!         live.set_len(live.len() + 1);
//!     }
//!
//!     // Growing past the inline capacity spilled onto the heap...
//!     assert!(!storage.is_inline());
//!
//!     // ...and clearing out moves back into the inline buffer.
//!     ops::clear_and_release(&mut storage, &mut live).unwrap();
//!     assert!(storage.is_inline());
//! }
//! ```

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(test)]
extern crate std;

use core::fmt::{self, Display, Formatter};

pub mod block;
pub mod ops;
pub mod policy;
pub mod raw;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::block::{Block, Constructed};
pub use crate::policy::{Doubling, ExactFit, FactorGrowth, GrowthPolicy};
pub use crate::storage::{AllocStorage, InlineStorage, RawAllocator, SpillStorage, Storage};

#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub use crate::storage::{Global, HeapStorage, SmallStorage};

/// The error type for fallible storage operations.
///
/// The two variants are deliberately distinct: callers backing off to a
/// different strategy (such as spilling to the heap) need to tell a buffer
/// that *cannot* grow apart from an allocator that *would not* deliver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying allocator refused the request, or the requested
    /// capacity does not fit the backend's maximum size.
    AllocFailed,
    /// A fixed-capacity buffer was asked to grow beyond its bound.
    /// There is no fallback allocation.
    CapacityExceeded,
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::AllocFailed => f.write_str("memory allocation failed"),
            StorageError::CapacityExceeded => f.write_str("fixed storage capacity exceeded"),
        }
    }
}

/// A specialized result type for storage operations.
pub type Result<T> = core::result::Result<T, StorageError>;
