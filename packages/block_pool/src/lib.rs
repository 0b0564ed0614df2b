//! A growable object pool that stores items of one type in cache-line-aligned memory blocks
//! and hands out stable integer keys for them.
//!
//! This crate provides [`BlockPool`], a pool that allocates storage in fixed-capacity blocks,
//! placing every item on its own 64-byte cache line boundary. Compared to allocating each item
//! on the heap individually, the pool performs one allocation per block and keeps items of the
//! same type physically close together.
//!
//! # Key features
//!
//! - **Stable integer keys**: every insert returns a [`Key`] that stays valid until the item
//!   is removed.
//! - **Cache-line alignment**: item strides are padded to 64 bytes so neighboring items never
//!   share a cache line.
//! - **Geometric growth**: each new block doubles the capacity of the previous one, so the
//!   block count grows only logarithmically with the item count.
//! - **Whole-block reclamation**: when the last item of a block is removed, the block's memory
//!   is returned to the allocator immediately and every index that ever lived in it is
//!   permanently retired.
//! - **Slot reuse**: indices of removed items whose block is still alive are reused by later
//!   insertions, most recently freed first.
//!
//! The pool is not thread-safe; wrap it in a `Mutex` if you need to share it.
//!
//! # Example
//!
//! ```rust
//! use block_pool::BlockPool;
//!
//! let mut pool = BlockPool::<String>::new();
//!
//! let key = pool.insert("Hello, World!".to_string())?;
//! assert_eq!(*pool.get(key)?, "Hello, World!");
//!
//! pool.remove(key)?;
//! assert!(!pool.is_alive(key));
//! # Ok::<(), block_pool::Error>(())
//! ```

mod block;
mod builder;
mod error;
mod pool;

pub use builder::*;
pub use error::*;
pub use pool::*;

pub(crate) use block::*;
