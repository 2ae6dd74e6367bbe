//! Hybrid storage: an inline buffer that spills onto an allocator.

use core::mem;

use crate::block::{Block, Constructed};
use crate::policy::{Doubling, GrowthPolicy};
use crate::raw;
use crate::storage::heap::{AllocStorage, RawAllocator};
use crate::storage::inline::InlineStorage;
use crate::storage::Storage;
use crate::StorageError;

#[cfg(feature = "alloc")]
use crate::storage::heap::Global;

enum Repr<T, const N: usize, A: RawAllocator, P: GrowthPolicy> {
    Small(InlineStorage<T, N>),
    Big(AllocStorage<T, A, P>),
}

/// Storage that starts inline and spills onto an allocator when it must.
///
/// Below `N` elements this behaves exactly like an
/// [`InlineStorage`]; the first [`reserve`](Storage::reserve) that needs
/// more promotes the backend by allocating a big block, relocating the
/// live elements into it once, and taking over as an [`AllocStorage`].
/// [`shrink_to_fit`](Storage::shrink_to_fit) demotes back into the inline
/// buffer as soon as the live elements fit again.
///
/// Promotion allocates before anything is moved, so a failing allocator
/// leaves the inline state untouched; demotion performs no fallible work
/// at all.
pub struct SpillStorage<T, const N: usize, A: RawAllocator, P: GrowthPolicy = Doubling> {
    repr: Repr<T, N, A, P>,
    alloc: A,
}

/// Hybrid storage spilling onto the global heap.
///
/// # Examples
/// ```
/// use yucca::{Constructed, SmallStorage, Storage};
///
/// let mut storage = SmallStorage::<u8, 16>::new();
/// let mut live = Constructed::new();
/// assert!(storage.is_inline());
///
/// unsafe {
///     storage.reserve(16, &mut live).unwrap(); // still fits
///     assert!(storage.is_inline());
///     storage.reserve(17, &mut live).unwrap(); // spills
///     assert!(!storage.is_inline());
/// }
/// ```
#[cfg(feature = "alloc")]
#[cfg_attr(docs_rs, doc(cfg(feature = "alloc")))]
pub type SmallStorage<T, const N: usize, P = Doubling> = SpillStorage<T, N, Global, P>;

#[cfg(feature = "alloc")]
impl<T, const N: usize, P: GrowthPolicy> SpillStorage<T, N, Global, P> {
    /// Creates an empty backend spilling onto the global heap.
    pub fn new() -> Self {
        Self::new_in(Global)
    }
}

#[cfg(feature = "alloc")]
impl<T, const N: usize, P: GrowthPolicy> Default for SpillStorage<T, N, Global, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize, A: RawAllocator, P: GrowthPolicy> SpillStorage<T, N, A, P> {
    /// Creates an empty backend spilling onto the given allocator.
    pub fn new_in(alloc: A) -> Self {
        SpillStorage {
            repr: Repr::Small(InlineStorage::new()),
            alloc,
        }
    }

    /// Returns `true` while the elements live in the inline buffer.
    #[inline]
    pub fn is_inline(&self) -> bool {
        matches!(self.repr, Repr::Small(_))
    }
}

unsafe impl<T, const N: usize, A: RawAllocator, P: GrowthPolicy> Storage<T>
    for SpillStorage<T, N, A, P>
{
    type Args = A;

    fn with_args(args: A) -> Self {
        Self::new_in(args)
    }

    fn args(&self) -> A {
        self.alloc.clone()
    }

    fn capacity(&self) -> usize {
        match self.repr {
            Repr::Small(ref small) => small.capacity(),
            Repr::Big(ref big) => big.capacity(),
        }
    }

    fn block(&mut self) -> Block<T> {
        match self.repr {
            Repr::Small(ref mut small) => small.block(),
            Repr::Big(ref mut big) => big.block(),
        }
    }

    fn max_size(args: &A) -> usize {
        let heap_max = AllocStorage::<T, A, P>::max_size(args);
        if heap_max < N {
            N
        } else {
            heap_max
        }
    }

    unsafe fn reserve(&mut self, additional: usize, live: &mut Constructed) -> crate::Result<()> {
        match self.repr {
            Repr::Big(ref mut big) => return big.reserve(additional, live),
            Repr::Small(ref mut small) if N - live.len() >= additional => {
                return small.reserve(additional, live);
            }
            Repr::Small(_) => {}
        }

        // Promote: allocate the big block first, so a failure here leaves
        // the inline state untouched.
        let required = live
            .len()
            .checked_add(additional)
            .ok_or(StorageError::AllocFailed)?;
        let heap_max = AllocStorage::<T, A, P>::max_size(&self.alloc);
        if required > heap_max {
            return Err(StorageError::AllocFailed);
        }

        let target = P::grow(N, required - N, heap_max);
        let mut big = AllocStorage::<T, A, P>::with_args(self.alloc.clone());
        let mut big_live = Constructed::new();
        big.reserve(target, &mut big_live)?;

        if let Repr::Small(ref mut small) = self.repr {
            raw::relocate(
                small.block().at(live.offset()),
                big.block().as_ptr(),
                live.len(),
            );
        }
        self.repr = Repr::Big(big);
        live.set_offset(0);
        Ok(())
    }

    unsafe fn shrink_to_fit(&mut self, live: &mut Constructed) -> crate::Result<()> {
        match self.repr {
            Repr::Small(ref mut small) => small.shrink_to_fit(live),
            Repr::Big(_) if live.len() <= N => {
                // Demote: relocation into the inline buffer is bitwise and
                // cannot fail.
                let mut small = InlineStorage::<T, N>::new();
                if let Repr::Big(ref mut big) = self.repr {
                    raw::relocate(
                        big.block().at(live.offset()),
                        small.block().as_ptr(),
                        live.len(),
                    );
                }
                // Replacing the representation drops the big backend,
                // releasing its (now elementless) block.
                self.repr = Repr::Small(small);
                live.set_offset(0);
                Ok(())
            }
            Repr::Big(ref mut big) => big.shrink_to_fit(live),
        }
    }

    unsafe fn swap(a: &mut Self, live_a: &mut Constructed, b: &mut Self, live_b: &mut Constructed) {
        if let (Repr::Small(ref mut small_a), Repr::Small(ref mut small_b)) =
            (&mut a.repr, &mut b.repr)
        {
            InlineStorage::swap(small_a, live_a, small_b, live_b);
            mem::swap(&mut a.alloc, &mut b.alloc);
            return;
        }

        // At least one side owns its elements through a relocatable
        // representation, so the whole footprints can trade places.
        mem::swap(a, b);
        mem::swap(live_a, live_b);
    }
}
