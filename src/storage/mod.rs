//! Storage backends: owners of exactly one memory block.
//!
//! A backend owns a single [`Block`] at a time and knows how to grow it,
//! shrink it, and exchange it with a sibling of the same type, migrating
//! the live elements described by a [`Constructed`] view along the way.
//! Everything a backend does with individual elements goes through the
//! primitives in [`crate::raw`].
//!
//! Three backends are provided:
//!
//! - [`AllocStorage`] drives a [`RawAllocator`] and grows without bound
//!   (modulo memory); [`HeapStorage`] is its global-allocator shorthand.
//! - [`InlineStorage`] is a fixed buffer embedded in the backend object;
//!   it cannot grow, only fail.
//! - [`SpillStorage`] starts out as an inline buffer and promotes itself
//!   to an [`AllocStorage`] the first time it is asked for more;
//!   [`SmallStorage`] is its global-allocator shorthand.

use crate::block::{Block, Constructed};

mod heap;
mod inline;
mod small;

pub use heap::{AllocStorage, RawAllocator};
pub use inline::InlineStorage;
pub use small::SpillStorage;

#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub use heap::{Global, HeapStorage};

#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub use small::SmallStorage;

/// An interface for maintaining a resizable block of uninitialized storage.
///
/// Implementations own exactly one [`Block`] at a time. They never track
/// which slots are initialized; that bookkeeping belongs to the caller,
/// who passes the current [`Constructed`] view into every operation that
/// needs it and receives the updated view back through the same reference.
///
/// Backends are not copyable; ownership of a block moves only through
/// [`swap`](Storage::swap) or the algorithms in [`crate::ops`].
///
/// # Safety
/// Implementors must ensure that
/// - the block returned by [`block`](Storage::block) stays valid and keeps
///   its identity until the next call to `reserve`, `shrink_to_fit`, or
///   `swap`, and that those are the only operations that may replace it;
/// - every operation preserves the values and order of the live elements
///   described by the views it is given, updating the views to match the
///   elements' new location;
/// - `reserve` and `shrink_to_fit` leave the backend and its elements
///   untouched when they return an error.
pub unsafe trait Storage<T> {
    /// Backend-specific construction arguments.
    ///
    /// These travel with block ownership: the transfer algorithms propagate
    /// them rather than duplicating backends' configuration. For backends
    /// that need none this is a zero-sized type and costs nothing to store.
    type Args: Clone;

    /// Constructs an empty backend from its arguments.
    fn with_args(args: Self::Args) -> Self
    where
        Self: Sized;

    /// Returns a copy of the backend's construction arguments.
    fn args(&self) -> Self::Args;

    /// Returns the size of the currently owned block in units of `T`.
    fn capacity(&self) -> usize;

    /// Returns the currently owned block.
    ///
    /// The block is invalidated by the next `reserve`, `shrink_to_fit`,
    /// or `swap` on this backend and must be re-fetched afterwards.
    fn block(&mut self) -> Block<T>;

    /// Returns the largest capacity a backend with the given arguments
    /// can ever provide.
    fn max_size(args: &Self::Args) -> usize;

    /// Ensures capacity for at least `live.len() + additional` elements.
    ///
    /// On success the view is normalized to offset zero, so the next free
    /// slot is `block().at(live.len())`. When a different-sized block is
    /// needed, the live elements are migrated into it and the old block is
    /// released; blocks are never resized in place. On error, nothing has
    /// changed.
    ///
    /// # Safety
    /// `live` must accurately describe the run of initialized elements in
    /// this backend's block.
    unsafe fn reserve(&mut self, additional: usize, live: &mut Constructed) -> crate::Result<()>;

    /// Releases surplus capacity, keeping room for the live elements.
    ///
    /// On success the view is normalized to offset zero. On error, nothing
    /// has changed. Never fails when the view is empty.
    ///
    /// # Safety
    /// As for [`reserve`](Storage::reserve).
    unsafe fn shrink_to_fit(&mut self, live: &mut Constructed) -> crate::Result<()>;

    /// Exchanges the contents of two backends of the same type.
    ///
    /// Afterwards `a` holds the elements previously described by `live_b`
    /// and vice versa; both views are updated to match. Construction
    /// arguments travel with their block. This operation cannot fail.
    ///
    /// # Safety
    /// Each view must accurately describe the run of initialized elements
    /// in its backend's block, and `a` and `b` must be distinct objects.
    unsafe fn swap(a: &mut Self, live_a: &mut Constructed, b: &mut Self, live_b: &mut Constructed);
}
