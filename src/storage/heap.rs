//! Allocator-backed storage.

use core::alloc::Layout;
use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use crate::block::{Block, Constructed};
use crate::ops;
use crate::policy::{Doubling, GrowthPolicy};
use crate::raw;
use crate::storage::Storage;
use crate::StorageError;

/// A minimal allocator interface, rebound to raw bytes.
///
/// This is the seam through which [`AllocStorage`] obtains and releases
/// memory. Handles are cloned when a backend propagates its construction
/// arguments, so implementations referring to shared state should be
/// reference-like.
///
/// # Safety
/// Implementors must ensure that a successful `allocate` returns a pointer
/// valid for reads and writes of `layout.size()` bytes at `layout.align()`
/// alignment, which stays valid until passed to `deallocate` on a clone of
/// the same handle.
pub unsafe trait RawAllocator: Clone {
    /// Attempts to allocate a block of memory fitting `layout`.
    ///
    /// # Safety
    /// `layout` must have nonzero size.
    unsafe fn allocate(&self, layout: Layout) -> crate::Result<NonNull<u8>>;

    /// Releases a block of memory.
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate` with the same `layout`
    /// on this handle or a clone of it, and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// The global allocator, as a [`RawAllocator`] handle.
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Global;

#[cfg(feature = "alloc")]
unsafe impl RawAllocator for Global {
    #[inline]
    unsafe fn allocate(&self, layout: Layout) -> crate::Result<NonNull<u8>> {
        NonNull::new(alloc::alloc::alloc(layout)).ok_or(StorageError::AllocFailed)
    }

    #[inline]
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        alloc::alloc::dealloc(ptr.as_ptr(), layout);
    }
}

/// Storage driving an externally supplied allocator.
///
/// `reserve` allocates the replacement block, relocates the live elements
/// into it, and only then frees the old block, so an allocation failure
/// leaves the previous state untouched. [`swap`](Storage::swap) exchanges
/// ownership fields only and never touches elements.
///
/// Dropping the backend releases the block but not the elements in it;
/// destroying those first is the owner's job (see
/// [`ops::clear_and_release`](crate::ops::clear_and_release)).
///
/// Zero-sized element types never allocate; the backend then reports
/// unbounded capacity.
pub struct AllocStorage<T, A: RawAllocator, P: GrowthPolicy = Doubling> {
    ptr: NonNull<T>,
    cap: usize,
    alloc: A,
    policy: PhantomData<P>,
}

/// Storage on the global heap.
///
/// # Examples
/// ```
/// use yucca::{Constructed, HeapStorage, Storage};
///
/// let mut storage = HeapStorage::<char>::new();
/// let mut live = Constructed::new();
/// assert_eq!(storage.capacity(), 0);
///
/// unsafe {
///     storage.reserve(3, &mut live).unwrap();
///     assert!(storage.capacity() >= 3);
/// }
/// ```
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub type HeapStorage<T, P = Doubling> = AllocStorage<T, Global, P>;

#[cfg(feature = "alloc")]
impl<T, P: GrowthPolicy> AllocStorage<T, Global, P> {
    /// Creates an empty backend on the global heap.
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

#[cfg(feature = "alloc")]
impl<T, P: GrowthPolicy> Default for AllocStorage<T, Global, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, A: RawAllocator, P: GrowthPolicy> AllocStorage<T, A, P> {
    /// Creates an empty backend driving the given allocator.
    pub fn new_in(alloc: A) -> Self {
        AllocStorage {
            ptr: NonNull::dangling(),
            cap: 0,
            alloc,
            policy: PhantomData,
        }
    }

    fn array_layout(cap: usize) -> crate::Result<Layout> {
        Layout::array::<T>(cap).map_err(|_| StorageError::AllocFailed)
    }

    /// The layout of the currently owned block.
    ///
    /// # Safety
    /// Only valid while `self.cap > 0`; the multiplication cannot overflow
    /// then, because the block was successfully allocated with it before.
    unsafe fn current_layout(&self) -> Layout {
        Layout::from_size_align_unchecked(size_of::<T>().wrapping_mul(self.cap), align_of::<T>())
    }

    /// Allocates a block for `cap` elements, replacing the current one.
    ///
    /// The live elements are relocated and the old block is freed last;
    /// on error nothing has changed.
    unsafe fn migrate(&mut self, new_cap: usize, live: &mut Constructed) -> crate::Result<()> {
        debug_assert!(new_cap >= live.len());
        let new_layout = Self::array_layout(new_cap)?;
        let new_ptr = self.alloc.allocate(new_layout)?.cast::<T>();

        raw::relocate(self.ptr.as_ptr().add(live.offset()), new_ptr.as_ptr(), live.len());
        if self.cap > 0 {
            self.alloc.deallocate(self.ptr.cast(), self.current_layout());
        }

        self.ptr = new_ptr;
        self.cap = new_cap;
        live.set_offset(0);
        Ok(())
    }
}

unsafe impl<T, A: RawAllocator, P: GrowthPolicy> Storage<T> for AllocStorage<T, A, P> {
    type Args = A;

    fn with_args(args: A) -> Self {
        Self::new_in(args)
    }

    fn args(&self) -> A {
        self.alloc.clone()
    }

    #[inline]
    fn capacity(&self) -> usize {
        if size_of::<T>() == 0 {
            usize::MAX
        } else {
            self.cap
        }
    }

    #[inline]
    fn block(&mut self) -> Block<T> {
        unsafe { Block::from_raw_parts(self.ptr, self.capacity()) }
    }

    fn max_size(_args: &A) -> usize {
        if size_of::<T>() == 0 {
            usize::MAX
        } else {
            isize::MAX as usize / size_of::<T>()
        }
    }

    unsafe fn reserve(&mut self, additional: usize, live: &mut Constructed) -> crate::Result<()> {
        if size_of::<T>() == 0 {
            live.set_offset(0);
            return Ok(());
        }

        let required = live
            .len()
            .checked_add(additional)
            .ok_or(StorageError::AllocFailed)?;
        if required > Self::max_size(&self.alloc) {
            return Err(StorageError::AllocFailed);
        }

        if self.cap - live.len() >= additional {
            // Enough room once the view sits at offset zero.
            ops::normalize(self, live);
            return Ok(());
        }

        let new_cap = P::grow(self.cap, required - self.cap, Self::max_size(&self.alloc));
        debug_assert!(new_cap >= required);
        self.migrate(new_cap, live)
    }

    unsafe fn shrink_to_fit(&mut self, live: &mut Constructed) -> crate::Result<()> {
        if size_of::<T>() == 0 {
            live.set_offset(0);
            return Ok(());
        }

        let target = P::shrink(self.cap, live.len(), Self::max_size(&self.alloc));
        if target >= self.cap {
            ops::normalize(self, live);
            return Ok(());
        }

        if target == 0 {
            // live.len() is zero here, or target could not be below cap
            self.alloc.deallocate(self.ptr.cast(), self.current_layout());
            self.ptr = NonNull::dangling();
            self.cap = 0;
            live.set_offset(0);
            return Ok(());
        }

        self.migrate(target, live)
    }

    unsafe fn swap(a: &mut Self, live_a: &mut Constructed, b: &mut Self, live_b: &mut Constructed) {
        core::mem::swap(&mut a.ptr, &mut b.ptr);
        core::mem::swap(&mut a.cap, &mut b.cap);
        core::mem::swap(&mut a.alloc, &mut b.alloc);
        core::mem::swap(live_a, live_b);
    }
}

impl<T, A: RawAllocator, P: GrowthPolicy> Drop for AllocStorage<T, A, P> {
    fn drop(&mut self) {
        if size_of::<T>() != 0 && self.cap > 0 {
            unsafe { self.alloc.deallocate(self.ptr.cast(), self.current_layout()) };
        }
    }
}
