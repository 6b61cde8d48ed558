use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::thread;

use tracing::{trace, warn};

use crate::bucket::{Bucket, LockFreeList, LockingList};
use crate::hash::KeyHash;
use crate::map::{Factory, DEFAULT_CAPACITY};
use crate::{HashMap, Result};

/// How a [`ShardedMap`] maps a key hash to a shard.
///
/// The policy is fixed when the map is built, so a key always lives in the
/// same shard no matter how that shard resizes internally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShardSelect {
    /// `hash % shards`, using the requested shard count as is.
    #[default]
    Modulo,
    /// `hash & (shards - 1)`, with the shard count rounded up to a power of two.
    Mask,
}

/// A store split into independent [`HashMap`] shards.
///
/// Keyed operations are routed to exactly one shard by hash and delegated to
/// it, including its resize behavior. Whole-store operations fan out:
/// [`clear`](ShardedMap::clear) clears every shard concurrently and
/// [`size`](ShardedMap::size) sums the shard sizes one after another. The sum
/// is not a snapshot: under concurrent writes it may report a count that never
/// existed at any single instant.
///
/// # Examples
///
/// ```
/// use shardmap::{ShardSelect, ShardedMap};
///
/// let map: ShardedMap<String, u32, _> = ShardedMap::builder()
///     .shards(6)
///     .capacity(32)
///     .select(ShardSelect::Mask)
///     .build_lock_free();
///
/// assert_eq!(map.shard_count(), 8);
/// map.set("key".to_owned(), 1).unwrap();
/// assert_eq!(map.get(&"key".to_owned()), Some(1));
/// ```
pub struct ShardedMap<K, V, B = LockingList<K, V>> {
    shards: Box<[HashMap<K, V, B>]>,
    select: ShardSelect,
}

/// A builder for a [`ShardedMap`].
///
/// Defaults to 16 shards of 16 buckets each, selected by modulo.
pub struct ShardedMapBuilder<K, V> {
    shards: usize,
    capacity: u64,
    select: ShardSelect,
    _kv: PhantomData<fn(K) -> V>,
}

impl<K, V> ShardedMapBuilder<K, V> {
    /// The shard count used when none is configured.
    pub const DEFAULT_SHARDS: usize = 16;

    /// Set the number of shards.
    ///
    /// Rounded up to a power of two under [`ShardSelect::Mask`]. Zero is raised to one.
    pub fn shards(self, shards: usize) -> Self {
        ShardedMapBuilder { shards, ..self }
    }

    /// Set the initial bucket capacity of every shard.
    pub fn capacity(self, capacity: u64) -> Self {
        ShardedMapBuilder { capacity, ..self }
    }

    /// Set the shard selection policy. See [`ShardSelect`] for details.
    pub fn select(self, select: ShardSelect) -> Self {
        ShardedMapBuilder { select, ..self }
    }

    /// Construct a [`ShardedMap`] whose shards build their buckets with `factory`.
    pub fn build<B, F>(self, factory: F) -> ShardedMap<K, V, B>
    where
        F: Fn() -> B + Send + Sync + 'static,
    {
        ShardedMap::from_builder(self, Arc::new(factory))
    }

    /// Construct a [`ShardedMap`] over [`LockingList`] buckets.
    pub fn build_locking(self) -> ShardedMap<K, V, LockingList<K, V>>
    where
        K: 'static,
        V: 'static,
    {
        self.build(LockingList::new)
    }

    /// Construct a [`ShardedMap`] over [`LockFreeList`] buckets.
    ///
    /// All shards share one collector.
    pub fn build_lock_free(self) -> ShardedMap<K, V, LockFreeList<K, V>>
    where
        K: 'static,
        V: 'static,
    {
        self.build(LockFreeList::factory())
    }
}

impl<K, V> fmt::Debug for ShardedMapBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMapBuilder")
            .field("shards", &self.shards)
            .field("capacity", &self.capacity)
            .field("select", &self.select)
            .finish()
    }
}

impl<K, V> ShardedMap<K, V> {
    /// Returns a builder for a `ShardedMap`.
    pub fn builder() -> ShardedMapBuilder<K, V> {
        ShardedMapBuilder {
            shards: ShardedMapBuilder::<K, V>::DEFAULT_SHARDS,
            capacity: DEFAULT_CAPACITY,
            select: ShardSelect::default(),
            _kv: PhantomData,
        }
    }
}

impl<K, V, B> ShardedMap<K, V, B> {
    /// Creates a map of `shards` shards, each with `capacity` buckets built by
    /// `factory`, selected by modulo.
    pub fn new<F>(shards: usize, capacity: u64, factory: F) -> ShardedMap<K, V, B>
    where
        F: Fn() -> B + Send + Sync + 'static,
    {
        ShardedMap::builder()
            .shards(shards)
            .capacity(capacity)
            .build(factory)
    }

    fn from_builder(builder: ShardedMapBuilder<K, V>, factory: Factory<B>) -> ShardedMap<K, V, B> {
        let shards = match builder.shards {
            0 => {
                warn!("zero shards requested for sharded map, using 1");
                1
            }
            n => n,
        };

        let shards = match builder.select {
            ShardSelect::Modulo => shards,
            ShardSelect::Mask => shards.next_power_of_two(),
        };

        ShardedMap {
            shards: (0..shards)
                .map(|_| HashMap::with_shared_factory(builder.capacity, factory.clone()))
                .collect(),
            select: builder.select,
        }
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the shard selection policy.
    pub fn select(&self) -> ShardSelect {
        self.select
    }

    /// Returns the shards.
    pub fn shards(&self) -> &[HashMap<K, V, B>] {
        &self.shards
    }

    /// Returns the index of the shard that owns `key`.
    pub fn shard_index(&self, key: &K) -> usize
    where
        K: KeyHash,
    {
        let hash = key.key_hash();
        let shards = self.shards.len() as u64;

        let index = match self.select {
            ShardSelect::Modulo => hash % shards,
            ShardSelect::Mask => hash & (shards - 1),
        };

        index as usize
    }

    /// Returns the sum of every shard's size.
    pub fn size(&self) -> u64 {
        self.shards.iter().map(HashMap::size).sum()
    }

    /// Returns `true` if every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(HashMap::is_empty)
    }
}

impl<K, V, B> ShardedMap<K, V, B>
where
    K: KeyHash + Eq + Clone,
    V: Clone,
    B: Bucket<K, V>,
{
    fn shard(&self, key: &K) -> &HashMap<K, V, B> {
        &self.shards[self.shard_index(key)]
    }

    /// Returns a clone of the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.shard(key).get(key)
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.shard(key).contains_key(key)
    }

    /// Stores `value` for `key`, replacing any previous value.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        self.shard(&key).set(key, value)
    }

    /// Removes the entry for `key`.
    ///
    /// Returns [`Error::NotFound`](crate::Error::NotFound) if the key is not present.
    pub fn delete(&self, key: &K) -> Result<()> {
        self.shard(key).delete(key)
    }

    /// Removes every entry, clearing all shards concurrently.
    ///
    /// Returns once every shard has been cleared.
    pub fn clear(&self) {
        trace!(shards = self.shards.len(), "clearing sharded map");

        if let [shard] = &self.shards[..] {
            shard.clear();
            return;
        }

        thread::scope(|s| {
            for shard in self.shards.iter() {
                s.spawn(move || shard.clear());
            }
        });
    }
}

impl<K, V> Default for ShardedMap<K, V, LockingList<K, V>>
where
    K: 'static,
    V: 'static,
{
    fn default() -> Self {
        ShardedMap::builder().build_locking()
    }
}

impl<K, V, B> fmt::Debug for ShardedMap<K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedMap")
            .field("select", &self.select)
            .field("shards", &self.shards)
            .finish()
    }
}
