//! Demonstrates whole-block memory reclamation:
//!
//! * Filling the first block of a pool.
//! * Watching the doubling growth when it overflows.
//! * Emptying the first block and seeing its indices retire for good.

use block_pool::{BlockPool, Error};
use new_zealand::nz;

fn main() -> Result<(), Error> {
    // A tiny first block so the interesting transitions happen early.
    let mut pool = BlockPool::<u64>::builder()
        .initial_block_capacity(nz!(4))
        .build();

    // Fill the first block completely.
    let first_block_keys: Vec<_> = (0..4)
        .map(|i| pool.insert(i))
        .collect::<Result<_, _>>()?;

    println!(
        "After 4 inserts: len = {}, capacity = {}",
        pool.len(),
        pool.capacity()
    );

    // One more insert exhausts the first block; the pool grows by a block of double size.
    let overflow_key = pool.insert(100)?;
    println!(
        "After the 5th insert: len = {}, capacity = {} (a block of 8 was added)",
        pool.len(),
        pool.capacity()
    );

    // Remove everything that lives in the first block. The last removal empties the block,
    // so its memory goes back to the allocator immediately.
    for key in &first_block_keys {
        pool.remove(*key)?;
    }

    println!(
        "After emptying the first block: len = {}, capacity = {} (capacity is cumulative)",
        pool.len(),
        pool.capacity()
    );

    // The released block's indices are permanently retired...
    for key in &first_block_keys {
        assert!(!pool.is_alive(*key));
    }

    // ...so the next insert gets a fresh index instead of reusing 0..4.
    let fresh_key = pool.insert(200)?;
    println!(
        "Next insert got index {} (indices 0..4 are retired, never reused)",
        fresh_key.index()
    );

    // The item in the second block was untouched by the release.
    assert_eq!(*pool.get(overflow_key)?, 100);

    Ok(())
}
