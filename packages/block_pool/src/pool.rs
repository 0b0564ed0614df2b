use std::num::NonZero;
use std::ptr;

use new_zealand::nz;

use crate::{Block, BlockPoolBuilder, Error, Result};

/// A growable object pool that stores items in cache-line-aligned memory blocks and hands out
/// stable integer keys for them.
///
/// Storage is provisioned in blocks. The first block has the configured initial capacity and
/// every later block doubles the capacity of the one before it, so a pool holding N items owns
/// only O(log N) allocations. Each item occupies its own 64-byte-aligned slot, so neighboring
/// items never share a cache line.
///
/// Inserting returns a [`Key`]. Removal destroys the item and recycles its index through a
/// free list, most recently freed first. When the last item of a block is removed, the whole
/// block is returned to the allocator immediately and every index that ever pointed into it is
/// permanently retired - such indices are never handed out again, which is what makes it safe
/// to free the memory out from under them.
///
/// The pool has no internal synchronization. All mutating operations take `&mut self`; wrap
/// the pool in a `Mutex` to share it between threads.
///
/// # Example
///
/// ```rust
/// use block_pool::BlockPool;
/// use new_zealand::nz;
///
/// let mut pool = BlockPool::<String>::builder()
///     .initial_block_capacity(nz!(4))
///     .build();
///
/// let key = pool.insert("Alice".to_string())?;
/// assert!(pool.is_alive(key));
/// assert_eq!(*pool.get(key)?, "Alice");
///
/// pool.remove(key)?;
/// assert!(!pool.is_alive(key));
/// # Ok::<(), block_pool::Error>(())
/// ```
#[derive(Debug)]
pub struct BlockPool<T> {
    /// Every block ever allocated, in creation order. Released blocks stay in the list with
    /// their memory gone but their capacity on record, because logical indices resolve to a
    /// (block, offset) pair by scanning this list and subtracting capacities.
    blocks: Vec<Block<T>>,

    /// One entry per logical index ever issued, mapping the index to its storage location.
    /// This table only grows; indices whose block was released are tombstoned, never removed.
    slots: Vec<Slot>,

    /// Indices available for reuse, used as a stack. Contains only indices whose backing
    /// block is still allocated.
    free_indices: Vec<usize>,

    /// Number of indices currently holding a live item.
    live_count: usize,

    /// Sum of the capacities of every block ever created, including released ones. This is
    /// the growth trigger, not a measure of resident memory.
    total_capacity: usize,

    /// Capacity the next block will be created with. Doubles on every growth.
    next_block_capacity: NonZero<usize>,
}

/// Where a logical index currently points.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Slot {
    /// The index holds a constructed item at `offset` within `block_index`.
    Live { block_index: usize, offset: usize },

    /// The index holds nothing: either its item was removed (the index is then on the free
    /// list) or its backing block was released (the index is then permanently retired).
    Empty,
}

/// A key that references an item in a [`BlockPool`].
///
/// Keys are plain logical indices under the hood. An index freed by [`BlockPool::remove()`]
/// may be handed out again by a later insertion - unless its backing block was released in
/// the meantime, in which case the index is retired and will never be issued again.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Key {
    index: usize,
}

impl Key {
    /// The logical index behind this key. Useful for diagnostics and for data structures
    /// that want to index by key.
    #[must_use]
    pub fn index(self) -> usize {
        self.index
    }
}

impl<T> BlockPool<T> {
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub(crate) fn new_inner(initial_block_capacity: NonZero<usize>) -> Self {
        assert!(
            size_of::<T>() > 0,
            "BlockPool must have non-zero item size"
        );

        Self {
            blocks: Vec::new(),
            slots: Vec::new(),
            free_indices: Vec::new(),
            live_count: 0,
            total_capacity: 0,
            next_block_capacity: initial_block_capacity,
        }
    }

    /// Creates a new [`BlockPool`] with the default configuration.
    ///
    /// The pool starts empty and allocates its first block on the first insertion.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<String>::new();
    ///
    /// assert_eq!(pool.len(), 0);
    /// assert!(pool.is_empty());
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a new [`BlockPool`].
    ///
    /// Use this to set the initial block capacity, the pool's only configuration knob.
    pub fn builder() -> BlockPoolBuilder<T> {
        BlockPoolBuilder::new()
    }

    /// The number of items currently in the pool.
    ///
    /// Increases by one per successful insert and decreases by one per successful remove.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live_count
    }

    /// Whether the pool holds no items.
    ///
    /// An empty pool may still be holding block memory from items it used to hold, unless
    /// every block has been released.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live_count == 0
    }

    /// The cumulative capacity of every block ever created, including released ones.
    ///
    /// This value never decreases and is an upper bound on the indices issued so far, not a
    /// measure of currently-resident memory.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.total_capacity
    }

    /// Whether `key` currently refers to a live item.
    ///
    /// False for keys whose item was removed, keys retired by a block release, and keys the
    /// pool never issued. Use this to guard against double-removal.
    #[must_use]
    pub fn is_alive(&self, key: Key) -> bool {
        matches!(self.slots.get(key.index), Some(Slot::Live { .. }))
    }

    /// Inserts an item into the pool and returns its key.
    ///
    /// The most recently freed slot is reused if one is available; otherwise the item goes
    /// into the next never-used slot, growing the pool by a new block if all blocks are at
    /// capacity. Growth is the only fallible step: if the allocator cannot provide a new
    /// aligned block, [`Error::AllocationFailed`] is returned and the pool is unchanged.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<i32>::new();
    ///
    /// let key = pool.insert(42)?;
    /// assert_eq!(*pool.get(key)?, 42);
    /// # Ok::<(), block_pool::Error>(())
    /// ```
    pub fn insert(&mut self, value: T) -> Result<Key> {
        let index = if let Some(&index) = self.free_indices.last() {
            // The free list never contains an index of a released block, so this slot's
            // storage is guaranteed to still exist.
            let (block_index, offset) = self.resolve(index)?;

            let block = self
                .blocks
                .get_mut(block_index)
                .expect("resolution returned the position of an existing block");

            // SAFETY: The slot is empty (its index came from the free list) and its block is
            // still allocated, so this writes a fresh value into unoccupied storage.
            unsafe {
                block.slot_ptr(offset).write(value);
            }

            block.increment_live();

            _ = self.free_indices.pop();

            *self
                .slots
                .get_mut(index)
                .expect("free list indices always have a slot table entry") =
                Slot::Live {
                    block_index,
                    offset,
                };

            index
        } else {
            if self.slots.len() == self.total_capacity {
                self.grow()?;
            }

            let index = self.slots.len();
            let (block_index, offset) = self.resolve(index)?;

            let block = self
                .blocks
                .get_mut(block_index)
                .expect("resolution returned the position of an existing block");

            // SAFETY: This slot has never been issued, so the storage is unoccupied, and the
            // block holding the next never-used position is always still allocated.
            unsafe {
                block.slot_ptr(offset).write(value);
            }

            block.increment_live();

            self.slots.push(Slot::Live {
                block_index,
                offset,
            });

            index
        };

        self.live_count = self
            .live_count
            .checked_add(1)
            .expect("the pool cannot hold more items than fit in virtual memory");

        Ok(Key { index })
    }

    /// Returns a reference to the item at `key`.
    ///
    /// Returns [`Error::OutOfRange`] if the key does not refer to a live item.
    pub fn get(&self, key: Key) -> Result<&T> {
        let index = key.index;

        let Some(&Slot::Live {
            block_index,
            offset,
        }) = self.slots.get(index)
        else {
            return Err(Error::OutOfRange { index });
        };

        let block = self
            .blocks
            .get(block_index)
            .expect("live slots always reference a block in the list");

        // SAFETY: The slot is live, so this points at a constructed value. The shared borrow
        // of the pool keeps the value in place for the lifetime of the returned reference.
        Ok(unsafe { block.slot_ptr(offset).as_ref() })
    }

    /// Returns an exclusive reference to the item at `key`.
    ///
    /// Returns [`Error::OutOfRange`] if the key does not refer to a live item.
    pub fn get_mut(&mut self, key: Key) -> Result<&mut T> {
        let index = key.index;

        let Some(&Slot::Live {
            block_index,
            offset,
        }) = self.slots.get(index)
        else {
            return Err(Error::OutOfRange { index });
        };

        let block = self
            .blocks
            .get_mut(block_index)
            .expect("live slots always reference a block in the list");

        // SAFETY: The slot is live, so this points at a constructed value. The exclusive
        // borrow of the pool makes the returned reference unique.
        Ok(unsafe { block.slot_ptr(offset).as_mut() })
    }

    /// Removes the item at `key`, dropping it and recycling its slot.
    ///
    /// Returns [`Error::OutOfRange`] if the key does not refer to a live item, so removing
    /// the same key twice fails cleanly.
    ///
    /// If this was the last live item in its block, the entire block is released back to the
    /// allocator: every index in the block's range is permanently retired and purged from the
    /// free list, and the block's memory is freed immediately.
    ///
    /// # Example
    ///
    /// ```rust
    /// use block_pool::BlockPool;
    ///
    /// let mut pool = BlockPool::<i32>::new();
    /// let key = pool.insert(42)?;
    ///
    /// pool.remove(key)?;
    ///
    /// assert!(!pool.is_alive(key));
    /// assert!(pool.remove(key).is_err());
    /// # Ok::<(), block_pool::Error>(())
    /// ```
    pub fn remove(&mut self, key: Key) -> Result<()> {
        let index = key.index;

        let Some(&Slot::Live {
            block_index,
            offset,
        }) = self.slots.get(index)
        else {
            return Err(Error::OutOfRange { index });
        };

        let block_now_empty = {
            let block = self
                .blocks
                .get_mut(block_index)
                .expect("live slots always reference a block in the list");

            // SAFETY: The slot is live, so this drops a constructed value exactly once - the
            // entry is tombstoned immediately below and can never be resolved again.
            unsafe {
                ptr::drop_in_place(block.slot_ptr(offset).as_ptr());
            }

            block.decrement_live() == 0
        };

        *self
            .slots
            .get_mut(index)
            .expect("this entry was just read above") = Slot::Empty;

        self.free_indices.push(index);

        self.live_count = self
            .live_count
            .checked_sub(1)
            .expect("a live slot existed, so the live count was non-zero");

        if block_now_empty {
            self.release_block(block_index);
        }

        Ok(())
    }

    /// Allocates the next block in the doubling sequence and accounts for its capacity.
    fn grow(&mut self) -> Result<()> {
        let capacity = self.next_block_capacity;

        let block = Block::new(capacity)?;
        self.blocks.push(block);

        self.total_capacity = self
            .total_capacity
            .checked_add(capacity.get())
            .expect("cumulative capacity cannot exceed the address space");

        self.next_block_capacity = capacity
            .checked_mul(nz!(2))
            .expect("doubling the block capacity cannot overflow before allocation fails");

        Ok(())
    }

    /// Resolves a logical index to its (block position, offset within block) pair by walking
    /// the block list in creation order. Released blocks still take part with their recorded
    /// capacity, which is what keeps later indices stable after a release.
    fn resolve(&self, index: usize) -> Result<(usize, usize)> {
        let mut remaining = index;

        for (block_index, block) in self.blocks.iter().enumerate() {
            if remaining < block.capacity().get() {
                return Ok((block_index, remaining));
            }

            remaining = remaining
                .checked_sub(block.capacity().get())
                .expect("guarded by the range check above");
        }

        Err(Error::InvariantViolated { index })
    }

    /// Frees an emptied block's memory and permanently retires every index in its range.
    ///
    /// The range can extend past the indices issued so far (a block can empty out before all
    /// of its slots were ever used); those never-issued positions are tombstoned too, so no
    /// future insertion can land in the freed memory.
    fn release_block(&mut self, block_index: usize) {
        let base = self
            .blocks
            .iter()
            .take(block_index)
            .fold(0_usize, |sum, block| {
                sum.checked_add(block.capacity().get())
                    .expect("cumulative capacity cannot exceed the address space")
            });

        let capacity = self
            .blocks
            .get(block_index)
            .expect("the caller passes the position of an existing block")
            .capacity()
            .get();

        let end = base
            .checked_add(capacity)
            .expect("a block's index range lies within the cumulative capacity");

        if self.slots.len() < end {
            self.slots.resize(end, Slot::Empty);
        }

        for slot in self
            .slots
            .get_mut(base..end)
            .expect("the slot table was just extended to cover this range")
        {
            *slot = Slot::Empty;
        }

        self.free_indices
            .retain(|&index| !(base..end).contains(&index));

        self.blocks
            .get_mut(block_index)
            .expect("the caller passes the position of an existing block")
            .release();
    }
}

impl<T> Default for BlockPool<T> {
    /// Creates a new [`BlockPool`] with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for BlockPool<T> {
    fn drop(&mut self) {
        for index in 0..self.slots.len() {
            let Some(&Slot::Live {
                block_index,
                offset,
            }) = self.slots.get(index)
            else {
                continue;
            };

            let block = self
                .blocks
                .get_mut(block_index)
                .expect("live slots always reference a block in the list");

            // SAFETY: The slot is live, so this drops a constructed value exactly once - the
            // entry is tombstoned immediately below.
            unsafe {
                ptr::drop_in_place(block.slot_ptr(offset).as_ptr());
            }

            *self
                .slots
                .get_mut(index)
                .expect("this entry was just read above") = Slot::Empty;
        }

        // The blocks deallocate their own memory as they drop.
    }
}

#[cfg(test)]
impl<T> BlockPool<T> {
    /// Asserts the bookkeeping invariants that tie the slot table, free list, block live
    /// counts and counters together.
    fn integrity_check(&self) {
        let total: usize = self.blocks.iter().map(|b| b.capacity().get()).sum();
        assert_eq!(
            total, self.total_capacity,
            "total_capacity does not match the sum of block capacities"
        );

        let live_entries = self
            .slots
            .iter()
            .filter(|slot| matches!(slot, Slot::Live { .. }))
            .count();
        assert_eq!(
            live_entries, self.live_count,
            "live_count does not match the number of live slot table entries"
        );

        for (block_index, block) in self.blocks.iter().enumerate() {
            let pointing_here = self
                .slots
                .iter()
                .filter(|slot| matches!(slot, Slot::Live { block_index: b, .. } if *b == block_index))
                .count();
            assert_eq!(
                pointing_here,
                block.live(),
                "block {block_index} live count does not match its slot table entries"
            );

            if block.is_released() {
                assert_eq!(block.live(), 0, "a released block reports live items");
            }
        }

        for &index in &self.free_indices {
            assert_eq!(
                self.slots.get(index),
                Some(&Slot::Empty),
                "free list index {index} is not an empty slot"
            );

            let (block_index, _offset) = self.resolve(index).unwrap();
            assert!(
                !self
                    .blocks
                    .get(block_index)
                    .unwrap()
                    .is_released(),
                "free list index {index} belongs to a released block"
            );
        }
    }
}
