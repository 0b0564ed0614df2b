use std::alloc::{Layout, alloc, dealloc};
use std::any::type_name;
use std::marker::PhantomData;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::{Error, Result};

/// Both block memory and element strides are aligned to this boundary, so no two items in a
/// block ever share a cache line.
pub(crate) const CACHE_LINE: usize = 64;

/// One contiguous aligned allocation holding a fixed number of element slots.
///
/// The block is pure storage plus a live-item count - it does not know which of its slots hold
/// constructed values. The pool tracks slot occupancy in its slot table and is responsible for
/// constructing and dropping values at the pointers the block hands out. The block only
/// allocates and deallocates the memory itself.
///
/// A block whose live count drops to zero is released by the pool: its memory is returned to
/// the allocator while the block entry itself stays in the pool's block list, because its
/// capacity still participates in index-to-offset arithmetic. A released block is never
/// allocated again.
#[derive(Debug)]
pub(crate) struct Block<T> {
    /// Base of the aligned allocation, or `None` once the block has been released.
    storage: Option<NonNull<u8>>,

    /// Number of element slots in this block. Retained after release for offset arithmetic.
    capacity: NonZero<usize>,

    /// Number of constructed items currently stored in this block. Maintained by the pool;
    /// the pool releases the block when this returns to zero.
    live: usize,

    _item: PhantomData<T>,
}

impl<T> Block<T> {
    /// Allocates a new block with room for `capacity` items.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    pub(crate) fn new(capacity: NonZero<usize>) -> Result<Self> {
        assert!(
            size_of::<T>() > 0,
            "Block must have non-zero item size"
        );

        let layout = Self::layout(capacity);

        // SAFETY: The layout is never zero-sized because both the item size (asserted above)
        // and the capacity (NonZero) are non-zero.
        let ptr = unsafe { alloc(layout) };

        let Some(storage) = NonNull::new(ptr) else {
            return Err(Error::AllocationFailed {
                size: layout.size(),
                align: layout.align(),
            });
        };

        Ok(Self {
            storage: Some(storage),
            capacity,
            live: 0,
            _item: PhantomData,
        })
    }

    /// The alignment of the block allocation: a full cache line, or stricter if `T` demands it.
    pub(crate) fn alignment() -> usize {
        CACHE_LINE.max(align_of::<T>())
    }

    /// Distance in bytes between consecutive slots: the item size rounded up to a multiple of
    /// the block alignment, so every slot starts on its own cache line.
    pub(crate) fn stride() -> usize {
        size_of::<T>()
            .checked_next_multiple_of(Self::alignment())
            .expect("padding an item to its cache line cannot overflow for any real type")
    }

    fn layout(capacity: NonZero<usize>) -> Layout {
        let size = Self::stride()
            .checked_mul(capacity.get())
            .expect("block size in bytes cannot exceed the address space");

        Layout::from_size_align(size, Self::alignment())
            .expect("a cache-line-aligned layout of non-zero size is always valid")
    }

    #[must_use]
    pub(crate) fn capacity(&self) -> NonZero<usize> {
        self.capacity
    }

    #[must_use]
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    #[must_use]
    pub(crate) fn is_released(&self) -> bool {
        self.storage.is_none()
    }

    /// Pointer to the slot at `offset`. The slot may or may not hold a constructed value -
    /// that is for the caller to know.
    ///
    /// # Panics
    ///
    /// Panics if the offset is out of bounds or the block has been released. Both indicate a
    /// bookkeeping defect in the pool, never a caller error.
    #[must_use]
    pub(crate) fn slot_ptr(&self, offset: usize) -> NonNull<T> {
        assert!(
            offset < self.capacity.get(),
            "slot offset {offset} out of bounds in block of {}",
            type_name::<T>()
        );

        let storage = self
            .storage
            .expect("requested a slot pointer into a released block");

        // Cannot overflow: offset is bounded by the capacity the allocation was sized for.
        let byte_offset = offset.wrapping_mul(Self::stride());

        // SAFETY: Guarded by the bounds check above, so the result stays inside the
        // allocation made in `new()`.
        unsafe { storage.add(byte_offset) }.cast::<T>()
    }

    /// Records one more constructed item in this block.
    pub(crate) fn increment_live(&mut self) {
        self.live = self
            .live
            .checked_add(1)
            .expect("a block cannot hold more live items than fit in virtual memory");
    }

    /// Records the removal of one constructed item and returns the remaining live count.
    pub(crate) fn decrement_live(&mut self) -> usize {
        self.live = self
            .live
            .checked_sub(1)
            .expect("an item was removed from a block that had no live items");

        self.live
    }

    /// Returns the block's memory to the allocator. Idempotent; the capacity stays on record.
    ///
    /// The caller must have dropped every value stored in the block before calling this.
    #[cfg_attr(test, mutants::skip)] // Skipping the dealloc is not observable from safe code, only as a leak.
    pub(crate) fn release(&mut self) {
        let Some(storage) = self.storage.take() else {
            return;
        };

        // SAFETY: The layout matches the one used by the matching `alloc` in `new()`.
        unsafe {
            dealloc(storage.as_ptr(), Self::layout(self.capacity));
        }
    }
}

impl<T> Drop for Block<T> {
    fn drop(&mut self) {
        self.release();
    }
}

// SAFETY: The raw base pointer is exclusively owned and nothing about the storage is tied to a
// particular thread, so the block can move between threads whenever the item type can.
unsafe impl<T: Send> Send for Block<T> {}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn stride_is_cache_line_multiple() {
        assert_eq!(Block::<u8>::stride(), 64);
        assert_eq!(Block::<u64>::stride(), 64);
        assert_eq!(Block::<[u8; 64]>::stride(), 64);
        assert_eq!(Block::<[u8; 65]>::stride(), 128);
        assert_eq!(Block::<[u8; 100]>::stride(), 128);
    }

    #[test]
    fn stride_covers_the_item() {
        assert!(Block::<[u8; 100]>::stride() >= 100);
        assert!(Block::<String>::stride() >= size_of::<String>());
    }

    #[test]
    fn slots_are_cache_line_aligned() {
        let block = Block::<u64>::new(nz!(8)).unwrap();

        for offset in 0..8 {
            let address = block.slot_ptr(offset).as_ptr() as usize;
            assert_eq!(address % CACHE_LINE, 0, "slot {offset} is misaligned");
        }
    }

    #[test]
    fn live_count_round_trips() {
        let mut block = Block::<u64>::new(nz!(4)).unwrap();

        assert_eq!(block.live(), 0);

        block.increment_live();
        block.increment_live();
        assert_eq!(block.live(), 2);

        assert_eq!(block.decrement_live(), 1);
        assert_eq!(block.decrement_live(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let mut block = Block::<u64>::new(nz!(4)).unwrap();

        assert!(!block.is_released());

        block.release();
        assert!(block.is_released());
        assert_eq!(block.capacity(), nz!(4));

        // A second release is a no-op rather than a double free.
        block.release();
        assert!(block.is_released());
    }

    #[test]
    #[should_panic]
    fn slot_ptr_out_of_bounds_panics() {
        let block = Block::<u64>::new(nz!(4)).unwrap();

        _ = block.slot_ptr(4);
    }

    #[test]
    #[should_panic]
    fn slot_ptr_into_released_block_panics() {
        let mut block = Block::<u64>::new(nz!(4)).unwrap();
        block.release();

        _ = block.slot_ptr(0);
    }

    #[test]
    #[should_panic]
    fn zst_is_panic() {
        drop(Block::<()>::new(nz!(4)));
    }
}
