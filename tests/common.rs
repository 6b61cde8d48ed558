#![allow(dead_code)]

use shardmap::bucket::{Bucket, LockFreeList, LockingList, ShardedList};
use shardmap::hash::KeyHash;
use shardmap::{HashMap, ShardSelect, ShardedMap, Store};

// Run the test on every store configuration.
//
// The closure builds a store with the given initial capacity (per shard, for sharded stores).
pub fn with_store<K, V>(mut test: impl FnMut(&dyn Fn(u64) -> Box<dyn Store<K, V>>))
where
    K: KeyHash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // Locking buckets.
    test(
        &(|capacity| -> Box<dyn Store<K, V>> { Box::new(HashMap::<K, V, _>::locking(capacity)) }),
    );

    // Lock-free buckets.
    test(
        &(|capacity| -> Box<dyn Store<K, V>> {
            Box::new(HashMap::<K, V, _>::lock_free(capacity))
        }),
    );

    // Striped lock-free buckets, so every bucket is itself a small table.
    if !cfg!(shardmap_stress) {
        test(
            &(|capacity| -> Box<dyn Store<K, V>> {
                let inner = LockFreeList::<K, V>::factory();
                Box::new(HashMap::<K, V, _>::with_factory(capacity, move || {
                    ShardedList::with_factory(4, inner.clone())
                }))
            }),
        );
    }

    // Sharded over locking buckets, selected by modulo with a shard count that is
    // not a power of two.
    test(
        &(|capacity| -> Box<dyn Store<K, V>> {
            Box::new(
                ShardedMap::<K, V>::builder()
                    .shards(6)
                    .capacity(capacity)
                    .build_locking(),
            )
        }),
    );

    // Sharded over lock-free buckets, selected by mask.
    test(
        &(|capacity| -> Box<dyn Store<K, V>> {
            Box::new(
                ShardedMap::<K, V>::builder()
                    .shards(8)
                    .capacity(capacity)
                    .select(ShardSelect::Mask)
                    .build_lock_free(),
            )
        }),
    );
}

// Run the test on every bucket type.
pub fn with_bucket<K, V>(mut test: impl FnMut(&dyn Fn() -> Box<dyn Bucket<K, V>>))
where
    K: KeyHash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    test(&(|| -> Box<dyn Bucket<K, V>> { Box::new(LockingList::new()) }));
    test(&(|| -> Box<dyn Bucket<K, V>> { Box::new(LockFreeList::new()) }));
    test(&(|| -> Box<dyn Bucket<K, V>> { Box::new(ShardedList::<LockingList<K, V>>::locking(4)) }));
    test(&(|| -> Box<dyn Bucket<K, V>> { Box::new(ShardedList::<LockFreeList<K, V>>::lock_free(8)) }));
}

// Installs a test subscriber so `RUST_LOG=shardmap=debug` shows resize events.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Returns the number of threads to use for stress testing.
pub fn threads() -> usize {
    if cfg!(miri) {
        2
    } else {
        num_cpus::get_physical().next_power_of_two().min(8)
    }
}
