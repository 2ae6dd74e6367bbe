//! Primitives for constructing and destroying elements in raw storage.
//!
//! Everything above this module - the backends and the generic algorithms -
//! funnels its actual construct/destroy work through these functions, so the
//! panic-safety reasoning lives in one place. The central piece is
//! [`InitGuard`], which turns "destroy exactly the elements constructed so
//! far on any exit path" into a scoped guard instead of a property that has
//! to be re-derived at every call site.
//!
//! Note that there is no fallible bulk *move* here: a Rust move is a bitwise
//! copy and cannot fail, so the destructive relocation of a whole range is
//! the single nothrow [`relocate`]. Only cloning can fail mid-bulk, and
//! [`clone_range`] guards against that.

use core::mem;
use core::ptr;

/// Constructs a value in place and returns its address.
///
/// # Safety
/// `ptr` must be valid for writes and properly aligned. Any value
/// previously held in the slot is overwritten without being dropped.
#[inline]
pub unsafe fn construct_at<T>(ptr: *mut T, value: T) -> *mut T {
    ptr.write(value);
    ptr
}

/// Runs the destructor of the value at `ptr`.
///
/// # Safety
/// `ptr` must point to a live, properly aligned value of type `T`,
/// which is considered dead afterwards.
#[inline]
pub unsafe fn destroy_at<T>(ptr: *mut T) {
    ptr::drop_in_place(ptr);
}

/// Runs the destructors of the `len` values starting at `ptr`.
///
/// If one of the destructors panics, the remaining values are still
/// dropped before the panic propagates (slice drop semantics).
///
/// # Safety
/// `ptr` must point to `len` consecutive live values of type `T`,
/// all of which are considered dead afterwards.
#[inline]
pub unsafe fn destroy_range<T>(ptr: *mut T, len: usize) {
    ptr::drop_in_place(ptr::slice_from_raw_parts_mut(ptr, len));
}

/// Destructively relocates `len` values from `src` to `dst`.
///
/// This is the moral equivalent of move-constructing every destination
/// value and then destroying the source range; since Rust moves are
/// bitwise, it compiles to a single copy and cannot fail.
///
/// # Safety
/// `src` must point to `len` consecutive live values, `dst` must be valid
/// for writes of `len` values, and the two ranges must not overlap. The
/// source range is uninitialized afterwards and must not be read from or
/// dropped.
#[inline]
pub unsafe fn relocate<T>(src: *const T, dst: *mut T, len: usize) {
    ptr::copy_nonoverlapping(src, dst, len);
}

/// Clone-constructs the `len` values starting at `src` into `dst`.
///
/// If any clone panics, every destination value constructed so far is
/// destroyed before the panic propagates; the source range is untouched
/// either way.
///
/// # Safety
/// `src` must point to `len` consecutive live values, `dst` must be valid
/// for writes of `len` values, and the two ranges must not overlap.
pub unsafe fn clone_range<T: Clone>(src: *const T, len: usize, dst: *mut T) {
    let mut guard = InitGuard::new(dst);
    for i in 0..len {
        guard.push((*src.add(i)).clone());
    }
    guard.release();
}

/// A scoped guard over a partially constructed prefix.
///
/// The guard tracks how many elements have been constructed into the
/// target so far and, unless explicitly [`release`](InitGuard::release)d,
/// destroys exactly that many when dropped - including during unwinding.
///
/// # Examples
/// ```
/// use core::mem::MaybeUninit;
/// use yucca::raw::InitGuard;
///
/// let mut slots = [MaybeUninit::<String>::uninit(), MaybeUninit::uninit()];
/// unsafe {
///     let mut guard = InitGuard::new(slots.as_mut_ptr().cast::<String>());
///     guard.push("a".to_string());
///     guard.push("b".to_string());
///     assert_eq!(guard.release(), 2);
///     // the two strings are now live and must be dropped by hand
///     core::ptr::drop_in_place(slots.as_mut_ptr().cast::<[String; 2]>());
/// }
/// ```
pub struct InitGuard<T> {
    ptr: *mut T,
    initialized: usize,
}

impl<T> InitGuard<T> {
    /// Creates a guard over an empty prefix starting at `ptr`.
    ///
    /// # Safety
    /// `ptr` must be valid for writes of as many consecutive values as will
    /// be [`push`](InitGuard::push)ed, for the lifetime of the guard.
    #[inline]
    pub unsafe fn new(ptr: *mut T) -> Self {
        InitGuard {
            ptr,
            initialized: 0,
        }
    }

    /// Returns the number of elements constructed so far.
    #[inline]
    pub fn initialized(&self) -> usize {
        self.initialized
    }

    /// Constructs `value` into the next slot.
    ///
    /// # Safety
    /// The slot at `initialized()` must lie within the range promised to
    /// [`new`](InitGuard::new).
    #[inline]
    pub unsafe fn push(&mut self, value: T) {
        construct_at(self.ptr.add(self.initialized), value);
        self.initialized += 1;
    }

    /// Disarms the guard, leaving all constructed elements live.
    ///
    /// Returns how many elements were constructed.
    #[inline]
    pub fn release(self) -> usize {
        let n = self.initialized;
        mem::forget(self);
        n
    }
}

impl<T> Drop for InitGuard<T> {
    fn drop(&mut self) {
        unsafe { destroy_range(self.ptr, self.initialized) };
    }
}
