//! Raw memory blocks and the constructed-prefix view into them.

use core::fmt::{self, Debug, Formatter};
use core::marker::PhantomData;
use core::ptr::NonNull;

/// A contiguous run of uninitialized slots for elements of type `T`.
///
/// A `Block` is purely a capacity descriptor: it carries no type-level
/// ownership and never allocates or frees anything. Exactly one
/// [`Storage`](crate::Storage) backend owns the memory behind any given
/// block at a time; which slots hold live elements is tracked separately
/// by a [`Constructed`] view.
pub struct Block<T> {
    ptr: NonNull<T>,
    cap: usize,
    elem: PhantomData<*mut T>,
}

impl<T> Clone for Block<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Block<T> {}

impl<T> Debug for Block<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("ptr", &self.ptr)
            .field("cap", &self.cap)
            .finish()
    }
}

impl<T> Block<T> {
    /// Creates an empty block with a dangling, well-aligned base pointer.
    #[inline]
    pub const fn dangling() -> Self {
        Block {
            ptr: NonNull::dangling(),
            cap: 0,
            elem: PhantomData,
        }
    }

    /// Creates a block from a base pointer and a capacity in elements.
    ///
    /// # Safety
    /// `ptr` must point to (or one past) an allocation valid for reads and
    /// writes of `cap` consecutive values of type `T` for as long as the
    /// block is dereferenced through.
    #[inline]
    pub const unsafe fn from_raw_parts(ptr: NonNull<T>, cap: usize) -> Self {
        Block {
            ptr,
            cap,
            elem: PhantomData,
        }
    }

    /// Returns the size of the block in units of `T`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.cap
    }

    /// Returns the base pointer of the block.
    #[inline]
    pub const fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns a pointer to the slot at position `index`.
    ///
    /// # Safety
    /// `index` must be less than or equal to `capacity()`. The resulting
    /// pointer is one past the end in the boundary case and must not be
    /// dereferenced then; even in bounds, the slot it points to may not
    /// hold an initialized value.
    #[inline]
    pub unsafe fn at(&self, index: usize) -> *mut T {
        debug_assert!(index <= self.cap);
        self.ptr.as_ptr().add(index)
    }
}

/// A view denoting a run of live elements inside some backend's block.
///
/// The run covers the slots `offset..offset + len`. In the steady state
/// `offset` is zero; a nonzero offset is a legal *transient* condition
/// (left behind, for instance, by a container removing from the front),
/// which the [`ops`](crate::ops) algorithms normalize away before doing
/// other work.
///
/// A `Constructed` value makes no promises by itself: the pairing between
/// a view and the storage it describes is an obligation on the caller of
/// every `unsafe` operation that consumes both.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Constructed {
    offset: usize,
    len: usize,
}

impl Constructed {
    /// Creates an empty view at offset zero.
    #[inline]
    pub const fn new() -> Self {
        Constructed { offset: 0, len: 0 }
    }

    /// Creates a view from an offset and a length, both in elements.
    #[inline]
    pub const fn from_raw_parts(offset: usize, len: usize) -> Self {
        Constructed { offset, len }
    }

    /// Returns the number of live elements in the view.
    #[inline]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the view contains no live elements.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the index of the first live element.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Returns the index one past the last live element.
    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Forces the length of the view to `len`.
    ///
    /// This only rebinds the descriptor; constructing or destroying the
    /// elements it newly covers or abandons is the caller's business.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
    }

    /// Forces the offset of the view to `offset`.
    ///
    /// See [`set_len`](Constructed::set_len) for the caveat.
    #[inline]
    pub fn set_offset(&mut self, offset: usize) {
        self.offset = offset;
    }
}
