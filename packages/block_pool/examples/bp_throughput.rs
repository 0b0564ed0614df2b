//! Measures raw pool throughput with a large payload type:
//!
//! * N insertions (the pool grows by doubling blocks as needed).
//! * N reads back through the returned keys.
//! * N removals, guarded by `is_alive()`, which release every block.

use std::hint::black_box;
use std::time::Instant;

use block_pool::{BlockPool, Error};
use new_zealand::nz;

/// A deliberately bulky payload, 4 KiB of data plus a label, so the block allocations and
/// cache behavior resemble pooling real objects rather than integers.
struct Payload {
    data: [u8; 4096],
    info: String,
}

impl Payload {
    fn new(x: usize, info: String) -> Self {
        let mut data = [0_u8; 4096];
        data[0] = x as u8;
        Self { data, info }
    }
}

const N: usize = 10_000;

fn main() -> Result<(), Error> {
    let mut pool = BlockPool::<Payload>::builder()
        .initial_block_capacity(nz!(4))
        .build();

    let insert_start = Instant::now();
    let mut keys = Vec::with_capacity(N);
    for i in 0..N {
        keys.push(pool.insert(Payload::new(i, format!("PoolFabric#{i}")))?);
    }
    let insert_elapsed = insert_start.elapsed();
    println!(
        "insert: total {} ns, avg {:.1} ns per op",
        insert_elapsed.as_nanos(),
        insert_elapsed.as_nanos() as f64 / N as f64
    );

    let read_start = Instant::now();
    let mut checksum = 0_usize;
    for key in &keys {
        let payload = pool.get(*key)?;
        checksum += usize::from(black_box(payload).data[0]);
        checksum += payload.info.len();
    }
    let read_elapsed = read_start.elapsed();
    println!(
        "get: total {} ns, avg {:.1} ns per op",
        read_elapsed.as_nanos(),
        read_elapsed.as_nanos() as f64 / N as f64
    );
    println!("Checksum: {checksum} (ignore, prevents optimization)");

    println!("Now removing all items...");
    let remove_start = Instant::now();
    for key in keys {
        if pool.is_alive(key) {
            pool.remove(key)?;
        }
    }
    let remove_elapsed = remove_start.elapsed();
    println!(
        "remove: total {} ns, avg {:.1} ns per op",
        remove_elapsed.as_nanos(),
        remove_elapsed.as_nanos() as f64 / N as f64
    );

    println!(
        "After removal and block release: len = {}, cumulative capacity = {}",
        pool.len(),
        pool.capacity()
    );

    Ok(())
}
