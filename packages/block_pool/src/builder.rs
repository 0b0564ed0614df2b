use std::marker::PhantomData;
use std::num::NonZero;

use new_zealand::nz;

use crate::BlockPool;

/// Capacity of the first block when not configured through the builder. Subsequent blocks
/// double in capacity, so this only anchors the growth sequence.
const DEFAULT_INITIAL_BLOCK_CAPACITY: NonZero<usize> = nz!(128);

/// Builder for creating an instance of [`BlockPool`].
///
/// You only need to use this builder if you want to customize the pool configuration.
/// The default configuration used by [`BlockPool::new()`][1] is sufficient for most use cases.
///
/// # Examples
///
/// ```
/// use block_pool::BlockPool;
/// use new_zealand::nz;
///
/// let pool = BlockPool::<u32>::builder()
///     .initial_block_capacity(nz!(4))
///     .build();
/// ```
///
/// [1]: BlockPool::new
#[must_use]
pub struct BlockPoolBuilder<T> {
    initial_block_capacity: NonZero<usize>,

    _item: PhantomData<T>,
}

impl<T> std::fmt::Debug for BlockPoolBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockPoolBuilder")
            .field(
                "item_type",
                &std::format_args!("{}", std::any::type_name::<T>()),
            )
            .field("initial_block_capacity", &self.initial_block_capacity)
            .finish()
    }
}

impl<T> BlockPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            initial_block_capacity: DEFAULT_INITIAL_BLOCK_CAPACITY,
            _item: PhantomData,
        }
    }

    /// Sets the capacity of the first block the pool allocates. Every later block doubles the
    /// capacity of the block before it. This is the pool's only configuration knob.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    /// use new_zealand::nz;
    ///
    /// let pool = BlockPool::<u32>::builder()
    ///     .initial_block_capacity(nz!(1024))
    ///     .build();
    /// ```
    pub fn initial_block_capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.initial_block_capacity = capacity;
        self
    }

    /// Builds the block pool with the specified configuration.
    ///
    /// No memory is allocated until the first insertion.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    ///
    /// # Examples
    ///
    /// ```
    /// use block_pool::BlockPool;
    ///
    /// let pool = BlockPool::<u32>::builder().build();
    /// ```
    #[must_use]
    pub fn build(self) -> BlockPool<T> {
        BlockPool::new_inner(self.initial_block_capacity)
    }
}
