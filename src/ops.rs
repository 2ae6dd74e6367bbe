//! Backend-agnostic storage algorithms.
//!
//! These operations are written once against the [`Storage`] contract and
//! reused by every backend and every container built on top. They never
//! inspect which backend they are given; everything they need is the
//! block, the [`Constructed`] view, and the backend's `reserve`,
//! `shrink_to_fit`, and `swap`.
//!
//! # Safety
//! All functions here share one caller obligation: each view passed in
//! must accurately describe the run of initialized elements in its
//! backend's block, and sources passed by reference (`src` slices, fill
//! values) must not alias that block.
//!
//! # Failure behavior
//! Storage errors are returned; element `clone`/`drop` panics propagate.
//! In both cases the algorithm has unwound exactly its own partial
//! construction, and the view remains an accurate description of the
//! survivors. The assignment family is *weakly* safe: a panicking clone
//! mid-overwrite leaves a valid mix of old and new values, and the
//! reallocating strategy destroys the destination before reserving, so a
//! late failure leaves it empty. [`duplicate_assign`] alone is strong:
//! on any failure the destination is untouched.

use core::ptr;
use core::slice;

use crate::block::Constructed;
use crate::raw::{self, InitGuard};
use crate::storage::Storage;

/// Moves the live run to the front of the block.
///
/// A no-op when the view already starts at offset zero; a single memmove
/// otherwise. Idempotent, and cannot fail: relocation is bitwise.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety).
pub unsafe fn normalize<T, S: Storage<T>>(storage: &mut S, live: &mut Constructed) {
    let offset = live.offset();
    if offset == 0 {
        return;
    }

    let block = storage.block();
    if offset >= live.len() {
        // The gap swallows the whole run; no overlap.
        ptr::copy_nonoverlapping(block.at(offset), block.as_ptr(), live.len());
    } else {
        ptr::copy(block.at(offset), block.as_ptr(), live.len());
    }
    live.set_offset(0);
}

/// Replaces the destination's contents with clones of `src`, in order.
///
/// Picks one of three strategies by comparing lengths: overwrite the
/// common prefix and trim the excess, overwrite and clone-construct the
/// remainder into existing tail capacity, or clear everything, reserve
/// enough, and construct from scratch.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety).
///
/// # Examples
/// ```
/// use yucca::{ops, Constructed, HeapStorage, Storage};
///
/// let mut storage = HeapStorage::<i32>::new();
/// let mut live = Constructed::new();
/// unsafe {
///     ops::assign_slice(&mut storage, &mut live, &[1, 2, 3]).unwrap();
///     ops::assign_slice(&mut storage, &mut live, &[9]).unwrap();
///     assert_eq!(live.len(), 1);
///     assert_eq!(*storage.block().at(0), 9);
/// }
/// ```
pub unsafe fn assign_slice<T: Clone, S: Storage<T>>(
    storage: &mut S,
    live: &mut Constructed,
    src: &[T],
) -> crate::Result<()> {
    normalize(storage, live);
    let n = src.len();
    let len = live.len();

    if n <= len {
        let block = storage.block();
        let dst = slice::from_raw_parts_mut(block.as_ptr(), len);
        dst[..n].clone_from_slice(&src[..n]);
        live.set_len(n);
        raw::destroy_range(block.at(n), len - n);
    } else if n <= storage.capacity() {
        let block = storage.block();
        let dst = slice::from_raw_parts_mut(block.as_ptr(), len);
        dst.clone_from_slice(&src[..len]);
        raw::clone_range(src.as_ptr().add(len), n - len, block.at(len));
        live.set_len(n);
    } else {
        clear_and_release(storage, live)?;
        storage.reserve(n, live)?;
        raw::clone_range(src.as_ptr(), n, storage.block().as_ptr());
        live.set_len(n);
    }
    Ok(())
}

/// Replaces the destination's contents with the iterator's items, in order.
///
/// This is the moving counterpart of [`assign_slice`]: items are
/// transferred out of the iterator rather than cloned. The same three
/// strategies apply, chosen by the iterator's reported length; an
/// iterator that under-delivers simply yields a shorter result.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety).
pub unsafe fn assign_iter<T, S, I>(
    storage: &mut S,
    live: &mut Constructed,
    iter: I,
) -> crate::Result<()>
where
    S: Storage<T>,
    I: ExactSizeIterator<Item = T>,
{
    normalize(storage, live);
    let n = iter.len();
    let len = live.len();
    let mut iter = iter;

    if n <= len {
        let block = storage.block();
        let mut written = 0;
        while written < n {
            match iter.next() {
                Some(value) => {
                    overwrite(block.at(written), value);
                    written += 1;
                }
                None => break,
            }
        }
        live.set_len(written);
        raw::destroy_range(block.at(written), len - written);
    } else if n <= storage.capacity() {
        let block = storage.block();
        let mut written = 0;
        while written < len {
            match iter.next() {
                Some(value) => {
                    overwrite(block.at(written), value);
                    written += 1;
                }
                None => break,
            }
        }
        let mut guard = InitGuard::new(block.at(written));
        for value in (&mut iter).take(n - written) {
            guard.push(value);
        }
        live.set_len(written + guard.release());
        if written < len {
            // The iterator under-delivered mid-overwrite; trim the old tail.
            raw::destroy_range(block.at(written), len - written);
        }
    } else {
        clear_and_release(storage, live)?;
        storage.reserve(n, live)?;
        let mut guard = InitGuard::new(storage.block().as_ptr());
        for value in iter.take(n) {
            guard.push(value);
        }
        live.set_len(guard.release());
    }
    Ok(())
}

/// Replaces the destination's contents with `n` clones of `value`.
///
/// Strategy selection matches [`assign_slice`].
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety).
pub unsafe fn fill<T: Clone, S: Storage<T>>(
    storage: &mut S,
    live: &mut Constructed,
    n: usize,
    value: &T,
) -> crate::Result<()> {
    normalize(storage, live);
    let len = live.len();

    if n <= len {
        let block = storage.block();
        let dst = slice::from_raw_parts_mut(block.as_ptr(), len);
        for slot in &mut dst[..n] {
            slot.clone_from(value);
        }
        live.set_len(n);
        raw::destroy_range(block.at(n), len - n);
    } else if n <= storage.capacity() {
        let block = storage.block();
        let dst = slice::from_raw_parts_mut(block.as_ptr(), len);
        for slot in dst.iter_mut() {
            slot.clone_from(value);
        }
        let mut guard = InitGuard::new(block.at(len));
        while guard.initialized() < n - len {
            guard.push(value.clone());
        }
        guard.release();
        live.set_len(n);
    } else {
        clear_and_release(storage, live)?;
        storage.reserve(n, live)?;
        let mut guard = InitGuard::new(storage.block().as_ptr());
        while guard.initialized() < n {
            guard.push(value.clone());
        }
        live.set_len(guard.release());
    }
    Ok(())
}

/// Moves `other`'s contents into `dest` with no per-element work.
///
/// Destroys `dest`'s current elements and releases its block, then swaps
/// backends: `dest` acquires `other`'s block and elements wholesale, and
/// `other` is left empty. `other`'s construction arguments travel with
/// the block. This is the move-assignment of a whole container.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety); additionally,
/// `dest` and `other` must be distinct objects.
pub unsafe fn transfer_assign<T, S: Storage<T>>(
    dest: &mut S,
    dest_live: &mut Constructed,
    other: &mut S,
    other_live: &mut Constructed,
) -> crate::Result<()> {
    clear_and_release(dest, dest_live)?;
    S::swap(dest, dest_live, other, other_live);
    Ok(())
}

/// Replaces `dest`'s contents with clones of `other`'s, strongly.
///
/// Builds a temporary backend from `other`'s construction arguments,
/// clones into it, and only then destroys `dest`'s elements and swaps the
/// temporary in. If reservation fails or a clone panics, `dest` is
/// untouched and the partial temporary unwinds cleanly.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety); additionally,
/// `dest` and `other` must be distinct objects.
pub unsafe fn duplicate_assign<T: Clone, S: Storage<T>>(
    dest: &mut S,
    dest_live: &mut Constructed,
    other: &mut S,
    other_live: &mut Constructed,
) -> crate::Result<()> {
    let mut tmp = S::with_args(other.args());
    let mut tmp_live = Constructed::new();
    tmp.reserve(other_live.len(), &mut tmp_live)?;
    raw::clone_range(
        other.block().at(other_live.offset()),
        other_live.len(),
        tmp.block().as_ptr(),
    );
    tmp_live.set_len(other_live.len());

    let old_len = dest_live.len();
    let old_base = dest.block().at(dest_live.offset());
    dest_live.set_len(0);
    dest_live.set_offset(0);
    raw::destroy_range(old_base, old_len);

    S::swap(dest, dest_live, &mut tmp, &mut tmp_live);
    Ok(())
    // tmp now owns dest's old, empty block and releases it on drop
}

/// Destroys all live elements and releases the capacity down to empty.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety).
pub unsafe fn clear_and_release<T, S: Storage<T>>(
    storage: &mut S,
    live: &mut Constructed,
) -> crate::Result<()> {
    clear(storage, live);
    storage.shrink_to_fit(live)
}

/// Destroys all live elements, then ensures capacity for `target` elements.
///
/// # Safety
/// See the [module-level documentation](crate::ops#safety).
pub unsafe fn clear_and_reserve<T, S: Storage<T>>(
    storage: &mut S,
    live: &mut Constructed,
    target: usize,
) -> crate::Result<()> {
    clear(storage, live);
    storage.reserve(target, live)
}

/// Destroys all live elements, emptying the view before the first drop
/// runs so a panicking destructor cannot leave it stale.
unsafe fn clear<T, S: Storage<T>>(storage: &mut S, live: &mut Constructed) {
    let len = live.len();
    let base = storage.block().at(live.offset());
    live.set_len(0);
    live.set_offset(0);
    raw::destroy_range(base, len);
}

/// Drops the old value at `ptr` and moves `value` in, in the order that
/// keeps the slot live even if the old value's destructor panics.
#[inline]
unsafe fn overwrite<T>(ptr: *mut T, value: T) {
    let old = ptr.read();
    ptr.write(value);
    drop(old);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InlineStorage, SmallStorage};
    use crate::test_utils::*;
    use crate::StorageError;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::vec::Vec;

    #[test]
    fn normalize_is_idempotent() {
        let counter = DropCounter::new();
        let mut storage = InlineStorage::<Droppable<'_>, 8>::new();
        let mut live = Constructed::new();

        unsafe {
            for i in 0..6 {
                push(&mut storage, &mut live, counter.new_droppable(i)).unwrap();
            }
            // Vacate two front slots to force the overlapping case.
            raw::destroy_range(storage.block().as_ptr(), 2);
            live.set_offset(2);
            live.set_len(4);

            normalize(&mut storage, &mut live);
            assert_eq!(live.offset(), 0);
            let first = tags(&mut storage, &live);

            normalize(&mut storage, &mut live);
            assert_eq!(live.offset(), 0);
            assert_eq!(tags(&mut storage, &live), first);
            assert_eq!(first, [2, 3, 4, 5]);

            clear_and_release(&mut storage, &mut live).unwrap();
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn normalize_handles_the_disjoint_case() {
        let mut storage = InlineStorage::<u32, 8>::new();
        let mut live = Constructed::new();

        unsafe {
            // Construct two elements at the back half only.
            storage.block().at(5).write(50);
            storage.block().at(6).write(60);
            live.set_offset(5);
            live.set_len(2);

            normalize(&mut storage, &mut live);
            assert_eq!(live.offset(), 0);
            assert_eq!(contents(&mut storage, &live), [50, 60]);
        }
    }

    #[test]
    fn assign_grid_preserves_source_exactly() {
        // Source size 20 crosses the small-buffer threshold of 8.
        for &dest_size in &[0usize, 1, 4] {
            for &src_size in &[0usize, 1, 4, 20] {
                let mut storage = SmallStorage::<u32, 8>::new();
                let mut live = Constructed::new();
                let src: Vec<u32> = (100..100 + src_size as u32).collect();

                unsafe {
                    for i in 0..dest_size as u32 {
                        push(&mut storage, &mut live, i).unwrap();
                    }
                    assign_slice(&mut storage, &mut live, &src).unwrap();
                    assert_eq!(contents(&mut storage, &live), src);
                    assert!(storage.capacity() >= src_size);
                }
            }
        }
    }

    #[test]
    fn assign_does_not_leak_any_strategy() {
        let counter = DropCounter::new();

        // trim (4 -> 1), extend (1 -> 4), reallocate (4 -> 20)
        let mut storage = SmallStorage::<Droppable<'_>, 8>::new();
        let mut live = Constructed::new();

        unsafe {
            let four: Vec<_> = (0..4).map(|i| counter.new_droppable(i)).collect();
            let one: Vec<_> = (7..8).map(|i| counter.new_droppable(i)).collect();
            let twenty: Vec<_> = (20..40).map(|i| counter.new_droppable(i)).collect();

            assign_slice(&mut storage, &mut live, &four).unwrap();
            assert_eq!(tags(&mut storage, &live), [0, 1, 2, 3]);

            assign_slice(&mut storage, &mut live, &one).unwrap();
            assert_eq!(tags(&mut storage, &live), [7]);

            assign_slice(&mut storage, &mut live, &four).unwrap();
            assert_eq!(tags(&mut storage, &live), [0, 1, 2, 3]);

            assign_slice(&mut storage, &mut live, &twenty).unwrap();
            assert_eq!(tags(&mut storage, &live).len(), 20);

            clear_and_release(&mut storage, &mut live).unwrap();
            drop(four);
            drop(one);
            drop(twenty);
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn assign_iter_moves_the_items() {
        let counter = DropCounter::new();
        let mut storage = SmallStorage::<Droppable<'_>, 4>::new();
        let mut live = Constructed::new();

        unsafe {
            push(&mut storage, &mut live, counter.new_droppable(99)).unwrap();

            let items: Vec<_> = (0..6).map(|i| counter.new_droppable(i)).collect();
            let live_before = counter.live(); // 7
            assign_iter(&mut storage, &mut live, items.into_iter()).unwrap();

            // The old element is gone, the six moved ones live on.
            assert_eq!(counter.live(), live_before - 1);
            assert_eq!(tags(&mut storage, &live), [0, 1, 2, 3, 4, 5]);

            clear_and_release(&mut storage, &mut live).unwrap();
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn fill_replicates_the_value() {
        let counter = DropCounter::new();
        let mut storage = SmallStorage::<Droppable<'_>, 4>::new();
        let mut live = Constructed::new();

        unsafe {
            let value = counter.new_droppable(5);

            fill(&mut storage, &mut live, 3, &value).unwrap();
            assert_eq!(tags(&mut storage, &live), [5, 5, 5]);

            fill(&mut storage, &mut live, 7, &value).unwrap();
            assert_eq!(tags(&mut storage, &live), [5; 7]);

            fill(&mut storage, &mut live, 1, &value).unwrap();
            assert_eq!(tags(&mut storage, &live), [5]);

            clear_and_release(&mut storage, &mut live).unwrap();
            drop(value);
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn fill_to_zero_clears() {
        let mut storage = InlineStorage::<u32, 4>::new();
        let mut live = Constructed::new();

        unsafe {
            push(&mut storage, &mut live, 1).unwrap();
            push(&mut storage, &mut live, 2).unwrap();
            fill(&mut storage, &mut live, 0, &0).unwrap();
            assert!(live.is_empty());
        }
    }

    #[test]
    fn oversized_fill_on_fixed_storage_reports_exhaustion() {
        let mut storage = InlineStorage::<u32, 4>::new();
        let mut live = Constructed::new();

        unsafe {
            let err = fill(&mut storage, &mut live, 5, &7).unwrap_err();
            assert_eq!(err, StorageError::CapacityExceeded);
        }
    }

    #[test]
    fn transfer_assign_moves_the_block() {
        let counter = DropCounter::new();
        let mut dest = SmallStorage::<Droppable<'_>, 2>::new();
        let mut other = SmallStorage::<Droppable<'_>, 2>::new();
        let (mut dest_live, mut other_live) = (Constructed::new(), Constructed::new());

        unsafe {
            push(&mut dest, &mut dest_live, counter.new_droppable(1)).unwrap();
            for i in 10..15 {
                push(&mut other, &mut other_live, counter.new_droppable(i)).unwrap();
            }
            let other_base = other.block().as_ptr();
            let clones_before = counter.created();

            transfer_assign(&mut dest, &mut dest_live, &mut other, &mut other_live).unwrap();

            // No element was cloned; dest owns the very block other held.
            assert_eq!(counter.created(), clones_before);
            assert_eq!(dest.block().as_ptr(), other_base);
            assert_eq!(tags(&mut dest, &dest_live), [10, 11, 12, 13, 14]);
            assert!(other_live.is_empty());

            clear_and_release(&mut dest, &mut dest_live).unwrap();
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn duplicate_assign_copies_and_leaves_the_source() {
        let counter = DropCounter::new();
        let mut dest = SmallStorage::<Droppable<'_>, 2>::new();
        let mut other = SmallStorage::<Droppable<'_>, 2>::new();
        let (mut dest_live, mut other_live) = (Constructed::new(), Constructed::new());

        unsafe {
            push(&mut dest, &mut dest_live, counter.new_droppable(1)).unwrap();
            for i in 10..14 {
                push(&mut other, &mut other_live, counter.new_droppable(i)).unwrap();
            }

            duplicate_assign(&mut dest, &mut dest_live, &mut other, &mut other_live).unwrap();
            assert_eq!(tags(&mut dest, &dest_live), [10, 11, 12, 13]);
            assert_eq!(tags(&mut other, &other_live), [10, 11, 12, 13]);

            clear_and_release(&mut dest, &mut dest_live).unwrap();
            clear_and_release(&mut other, &mut other_live).unwrap();
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn duplicate_assign_is_strong_under_a_panicking_clone() {
        let counter = DropCounter::new();
        let mut dest = SmallStorage::<Droppable<'_>, 2>::new();
        let mut other = SmallStorage::<Droppable<'_>, 2>::new();
        let (mut dest_live, mut other_live) = (Constructed::new(), Constructed::new());

        unsafe {
            push(&mut dest, &mut dest_live, counter.new_droppable(1)).unwrap();
            push(&mut other, &mut other_live, counter.new_droppable(10)).unwrap();
            push(&mut other, &mut other_live, counter.new_poisoned(11)).unwrap();
            let live_before = counter.live();

            let result = catch_unwind(AssertUnwindSafe(|| {
                duplicate_assign(&mut dest, &mut dest_live, &mut other, &mut other_live)
            }));
            assert!(result.is_err());

            // Neither side changed, and the aborted clone left no stragglers.
            assert_eq!(counter.live(), live_before);
            assert_eq!(tags(&mut dest, &dest_live), [1]);
            assert_eq!(tags(&mut other, &other_live), [10, 11]);

            clear_and_release(&mut dest, &mut dest_live).unwrap();
            clear_and_release(&mut other, &mut other_live).unwrap();
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn aborted_extend_assign_destroys_only_its_own_work() {
        let counter = DropCounter::new();
        let mut storage = SmallStorage::<Droppable<'_>, 8>::new();
        let mut live = Constructed::new();

        unsafe {
            push(&mut storage, &mut live, counter.new_droppable(0)).unwrap();

            // Fails while clone-constructing into tail capacity.
            let src = [
                counter.new_droppable(1),
                counter.new_droppable(2),
                counter.new_poisoned(3),
                counter.new_droppable(4),
            ];
            let live_before = counter.live();

            let result = catch_unwind(AssertUnwindSafe(|| {
                assign_slice(&mut storage, &mut live, &src)
            }));
            assert!(result.is_err());
            assert_eq!(counter.live(), live_before);

            // The destination survived with its length intact (values in the
            // overwritten prefix are unspecified but live).
            assert_eq!(live.len(), 1);

            clear_and_release(&mut storage, &mut live).unwrap();
            drop(src);
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn clear_survives_a_panicking_drop() {
        let counter = DropCounter::new();
        let mut storage = InlineStorage::<Droppable<'_>, 4>::new();
        let mut live = Constructed::new();

        unsafe {
            push(&mut storage, &mut live, counter.new_droppable(0)).unwrap();
            push(&mut storage, &mut live, counter.new_drop_bomb(1)).unwrap();
            push(&mut storage, &mut live, counter.new_droppable(2)).unwrap();

            let result = catch_unwind(AssertUnwindSafe(|| {
                clear_and_release(&mut storage, &mut live)
            }));
            assert!(result.is_err());

            // The view was emptied before the first drop ran, and the
            // elements behind the panicking one were still destroyed.
            assert!(live.is_empty());
        }
        assert_eq!(counter.live(), 0);
    }

    #[test]
    fn clear_and_reserve_leaves_empty_capacity() {
        let counter = DropCounter::new();
        let mut storage = SmallStorage::<Droppable<'_>, 2>::new();
        let mut live = Constructed::new();

        unsafe {
            for i in 0..5 {
                push(&mut storage, &mut live, counter.new_droppable(i)).unwrap();
            }
            clear_and_reserve(&mut storage, &mut live, 12).unwrap();
            assert!(live.is_empty());
            assert!(storage.capacity() >= 12);
        }
        assert_eq!(counter.live(), 0);
    }
}
