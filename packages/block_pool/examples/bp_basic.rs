//! Basic usage of the `block_pool` crate:
//!
//! * Creating a pool.
//! * Adding items.
//! * Retrieving items.
//! * Removing items.

use block_pool::{BlockPool, Error};

fn main() -> Result<(), Error> {
    let mut pool = BlockPool::<String>::new();

    // Inserting an item gives you a key that you can later use to look up the item again.
    let alice_key = pool.insert("Alice".to_string())?;
    let bob_key = pool.insert("Bob".to_string())?;
    let charlie_key = pool.insert("Charlie".to_string())?;

    println!(
        "Object pool contains {} items, with a cumulative capacity of {}",
        pool.len(),
        pool.capacity()
    );

    // Retrieving items from a pool is fast, similar to `Vec[index]`.
    let alice = pool.get(alice_key)?;
    println!("Retrieved item: {alice}");

    pool.remove(bob_key)?;
    pool.remove(charlie_key)?;

    // Retrieving an item borrows the pool for as long as you use the item, so we have to
    // re-lookup `alice` here because otherwise the above `remove()` would be blocked.
    let alice = pool.get(alice_key)?;
    println!("Retrieved item after removal of other items: {alice}");

    // Removed keys no longer resolve, and `is_alive()` lets you check without
    // consuming an error.
    assert!(!pool.is_alive(bob_key));
    assert!(pool.get(bob_key).is_err());

    pool.remove(alice_key)?;
    println!(
        "Pool is now empty ({} items), capacity stays at {}",
        pool.len(),
        pool.capacity()
    );

    Ok(())
}
