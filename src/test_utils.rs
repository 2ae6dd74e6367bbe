//! Shared scaffolding for the unit tests: element types that count their
//! drops and can be primed to panic on clone, a bookkeeping allocator with
//! failure injection, and small helpers for driving a bare backend the way
//! a container would.

use core::alloc::Layout;
use core::cell::Cell;
use core::ptr::NonNull;
use core::slice;

use std::rc::Rc;
use std::vec::Vec;

use crate::block::Constructed;
use crate::storage::{RawAllocator, Storage};
use crate::StorageError;

/// Tracks constructions and destructions of the [`Droppable`]s minted
/// from it, so tests can assert that nothing leaked or double-dropped.
pub(crate) struct DropCounter {
    created: Cell<usize>,
    dropped: Cell<usize>,
}

impl DropCounter {
    pub fn new() -> Self {
        DropCounter {
            created: Cell::new(0),
            dropped: Cell::new(0),
        }
    }

    pub fn new_droppable(&self, value: usize) -> Droppable<'_> {
        self.created.set(self.created.get() + 1);
        Droppable {
            value,
            poisoned: false,
            drop_bomb: false,
            counter: self,
        }
    }

    /// Like [`new_droppable`](DropCounter::new_droppable), but the result
    /// panics when cloned.
    pub fn new_poisoned(&self, value: usize) -> Droppable<'_> {
        self.created.set(self.created.get() + 1);
        Droppable {
            value,
            poisoned: true,
            drop_bomb: false,
            counter: self,
        }
    }

    /// Like [`new_droppable`](DropCounter::new_droppable), but the result
    /// panics when dropped (after registering the drop, and only when not
    /// already unwinding).
    pub fn new_drop_bomb(&self, value: usize) -> Droppable<'_> {
        self.created.set(self.created.get() + 1);
        Droppable {
            value,
            poisoned: false,
            drop_bomb: true,
            counter: self,
        }
    }

    pub fn created(&self) -> usize {
        self.created.get()
    }

    pub fn live(&self) -> usize {
        self.created.get() - self.dropped.get()
    }
}

/// A non-trivial element type tagged with a test-chosen value.
pub(crate) struct Droppable<'a> {
    pub value: usize,
    poisoned: bool,
    drop_bomb: bool,
    counter: &'a DropCounter,
}

impl Clone for Droppable<'_> {
    fn clone(&self) -> Self {
        if self.poisoned {
            panic!("cloned a poisoned element");
        }
        self.counter.new_droppable(self.value)
    }
}

impl Drop for Droppable<'_> {
    fn drop(&mut self) {
        self.counter.dropped.set(self.counter.dropped.get() + 1);
        if self.drop_bomb && !std::thread::panicking() {
            panic!("dropped a drop bomb");
        }
    }
}

#[derive(Default)]
struct AllocStats {
    allocs: Cell<usize>,
    deallocs: Cell<usize>,
    fail_next: Cell<bool>,
}

/// A [`RawAllocator`] over the global heap that counts outstanding blocks
/// and can be told to refuse its next request.
#[derive(Clone, Default)]
pub(crate) struct CountingAlloc {
    stats: Rc<AllocStats>,
}

impl CountingAlloc {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `allocate` call fail with [`StorageError::AllocFailed`].
    pub fn fail_next(&self) {
        self.stats.fail_next.set(true);
    }

    /// The number of blocks allocated but not yet deallocated.
    pub fn outstanding(&self) -> usize {
        self.stats.allocs.get() - self.stats.deallocs.get()
    }

    pub fn total_allocs(&self) -> usize {
        self.stats.allocs.get()
    }
}

unsafe impl RawAllocator for CountingAlloc {
    unsafe fn allocate(&self, layout: Layout) -> crate::Result<NonNull<u8>> {
        if self.stats.fail_next.replace(false) {
            return Err(StorageError::AllocFailed);
        }
        let ptr = NonNull::new(std::alloc::alloc(layout)).ok_or(StorageError::AllocFailed)?;
        self.stats.allocs.set(self.stats.allocs.get() + 1);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        std::alloc::dealloc(ptr.as_ptr(), layout);
        self.stats.deallocs.set(self.stats.deallocs.get() + 1);
    }
}

/// Appends one element the way a container's `push` would.
pub(crate) unsafe fn push<T, S: Storage<T>>(
    storage: &mut S,
    live: &mut Constructed,
    value: T,
) -> crate::Result<()> {
    storage.reserve(1, live)?;
    storage.block().at(live.len()).write(value);
    live.set_len(live.len() + 1);
    Ok(())
}

/// Copies the live elements out for comparison.
pub(crate) unsafe fn contents<T: Clone, S: Storage<T>>(
    storage: &mut S,
    live: &Constructed,
) -> Vec<T> {
    let block = storage.block();
    slice::from_raw_parts(block.at(live.offset()), live.len()).to_vec()
}

/// Reads out the tag values of live [`Droppable`]s without cloning them.
pub(crate) unsafe fn tags<'a, S: Storage<Droppable<'a>>>(
    storage: &mut S,
    live: &Constructed,
) -> Vec<usize> {
    let block = storage.block();
    slice::from_raw_parts(block.at(live.offset()), live.len())
        .iter()
        .map(|d| d.value)
        .collect()
}
