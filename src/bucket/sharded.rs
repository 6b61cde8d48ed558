use std::fmt;

use tracing::warn;

use super::{Bucket, LockFreeList, LockingList, Upsert};
use crate::hash::KeyHash;
use crate::Result;

/// A bucket that stripes its keys across a fixed set of inner buckets.
///
/// Each key is routed to one inner bucket by the top bits of its mixed hash,
/// so writers to different stripes never contend. The stripe is picked from
/// different bits than a map's bucket index, keeping keys that share a bucket
/// spread across stripes. The stripe count is rounded up to a power of two.
pub struct ShardedList<B> {
    shards: Box<[B]>,
    // `64 - log2(shards)`, so a single stripe shifts everything out.
    shift: u32,
}

// Fibonacci hashing multiplier, `2^64 / φ`.
const MIX: u64 = 0x9e37_79b9_7f4a_7c15;

impl<B> ShardedList<B> {
    /// The stripe count used when zero is requested.
    pub const DEFAULT_SHARDS: usize = 16;

    /// Creates a list with `shards` inner buckets built by `factory`.
    pub fn with_factory(shards: usize, factory: impl Fn() -> B) -> ShardedList<B> {
        let shards = if shards == 0 {
            warn!(default = Self::DEFAULT_SHARDS, "zero stripes requested for sharded list");
            Self::DEFAULT_SHARDS
        } else {
            shards.next_power_of_two()
        };

        ShardedList {
            shards: (0..shards).map(|_| factory()).collect(),
            shift: u64::BITS - shards.trailing_zeros(),
        }
    }

    /// Returns the number of inner buckets.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the inner buckets.
    pub fn shards(&self) -> &[B] {
        &self.shards
    }

    /// Returns the index of the inner bucket that owns `key`.
    pub fn shard_index<K: KeyHash + ?Sized>(&self, key: &K) -> usize {
        let mixed = key.key_hash().wrapping_mul(MIX);
        mixed.checked_shr(self.shift).unwrap_or(0) as usize
    }

    fn shard<K: KeyHash + ?Sized>(&self, key: &K) -> &B {
        &self.shards[self.shard_index(key)]
    }
}

impl<K, V> ShardedList<LockingList<K, V>> {
    /// Creates a list striped over `shards` locking lists.
    pub fn locking(shards: usize) -> Self {
        ShardedList::with_factory(shards, LockingList::new)
    }
}

impl<K: 'static, V: 'static> ShardedList<LockFreeList<K, V>> {
    /// Creates a list striped over `shards` lock-free lists sharing one collector.
    pub fn lock_free(shards: usize) -> Self {
        ShardedList::with_factory(shards, LockFreeList::factory())
    }
}

impl<B> Default for ShardedList<B>
where
    B: Default,
{
    fn default() -> Self {
        ShardedList::with_factory(Self::DEFAULT_SHARDS, B::default)
    }
}

impl<K, V, B> Bucket<K, V> for ShardedList<B>
where
    K: KeyHash,
    B: Bucket<K, V>,
{
    fn get(&self, key: &K) -> Option<V> {
        self.shard(key).get(key)
    }

    fn set(&self, key: K, value: V) -> Result<Upsert> {
        self.shard(&key).set(key, value)
    }

    fn delete(&self, key: &K) -> Result<bool> {
        self.shard(key).delete(key)
    }

    fn for_each(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let mut stopped = false;
        for shard in self.shards.iter() {
            shard.for_each(&mut |key, value| {
                stopped = !visit(key, value);
                !stopped
            });

            if stopped {
                return;
            }
        }
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.len()).sum()
    }

    fn contains_key(&self, key: &K) -> bool {
        self.shard(key).contains_key(key)
    }
}

impl<B: fmt::Debug> fmt::Debug for ShardedList<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.shards.iter()).finish()
    }
}
