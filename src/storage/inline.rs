//! Fixed-capacity storage embedded in the backend object.

use core::mem::MaybeUninit;
use core::ptr::{self, NonNull};

use crate::block::{Block, Constructed};
use crate::ops;
use crate::raw;
use crate::storage::Storage;
use crate::StorageError;

/// A fixed block of `N` slots carried inside the backend object itself.
///
/// This backend never allocates: [`reserve`](Storage::reserve) either
/// succeeds trivially or fails with
/// [`CapacityExceeded`](crate::StorageError::CapacityExceeded).
///
/// Because the block cannot leave the object, [`swap`](Storage::swap)
/// physically exchanges the live elements rather than ownership fields:
/// element-wise over the common prefix, then by relocating the longer
/// side's surplus into the shorter side's vacated tail.
///
/// # Examples
/// ```
/// use yucca::{Constructed, InlineStorage, Storage, StorageError};
///
/// // 32 bytes of storage for 4-byte elements.
/// let mut storage = InlineStorage::<u32, 8>::new();
/// let mut live = Constructed::new();
///
/// unsafe {
///     assert!(storage.reserve(6, &mut live).is_ok());
///     for i in 0..8 {
///         storage.reserve(1, &mut live).unwrap();
///         storage.block().at(live.len()).write(i);
///         live.set_len(live.len() + 1);
///     }
///     // All 32 bytes in use: asking for 8 more must fail.
///     assert_eq!(storage.reserve(2, &mut live), Err(StorageError::CapacityExceeded));
/// }
/// ```
pub struct InlineStorage<T, const N: usize> {
    buf: [MaybeUninit<T>; N],
}

impl<T, const N: usize> InlineStorage<T, N> {
    /// Creates a backend with all `N` slots uninitialized.
    pub fn new() -> Self {
        InlineStorage {
            buf: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }
}

impl<T, const N: usize> Default for InlineStorage<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<T, const N: usize> Storage<T> for InlineStorage<T, N> {
    type Args = ();

    fn with_args(_args: ()) -> Self {
        Self::new()
    }

    fn args(&self) -> () {}

    #[inline]
    fn capacity(&self) -> usize {
        N
    }

    #[inline]
    fn block(&mut self) -> Block<T> {
        let ptr = unsafe { NonNull::new_unchecked(self.buf.as_mut_ptr().cast::<T>()) };
        unsafe { Block::from_raw_parts(ptr, N) }
    }

    fn max_size(_args: &()) -> usize {
        N
    }

    unsafe fn reserve(&mut self, additional: usize, live: &mut Constructed) -> crate::Result<()> {
        if N - live.len() < additional {
            return Err(StorageError::CapacityExceeded);
        }
        ops::normalize(self, live);
        Ok(())
    }

    unsafe fn shrink_to_fit(&mut self, live: &mut Constructed) -> crate::Result<()> {
        ops::normalize(self, live);
        Ok(())
    }

    unsafe fn swap(a: &mut Self, live_a: &mut Constructed, b: &mut Self, live_b: &mut Constructed) {
        ops::normalize(a, live_a);
        ops::normalize(b, live_b);

        let common = live_a.len().min(live_b.len());
        let a_base = a.block().as_ptr();
        let b_base = b.block().as_ptr();
        ptr::swap_nonoverlapping(a_base, b_base, common);

        if live_a.len() > common {
            raw::relocate(a_base.add(common), b_base.add(common), live_a.len() - common);
        } else if live_b.len() > common {
            raw::relocate(b_base.add(common), a_base.add(common), live_b.len() - common);
        }

        core::mem::swap(live_a, live_b);
    }
}
