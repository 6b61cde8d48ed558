use crate::bucket::Bucket;
use crate::hash::KeyHash;
use crate::{HashMap, Result, ShardedMap};

/// The operations shared by every store strategy.
///
/// Implemented by [`HashMap`] and [`ShardedMap`] for any bucket type, so code
/// can be written once and run against locking, lock-free or sharded stores.
///
/// ```
/// use shardmap::{HashMap, ShardedMap, Store};
///
/// fn fill(store: &dyn Store<u64, u64>) {
///     for i in 0..100 {
///         store.set(i, i).unwrap();
///     }
/// }
///
/// let map = HashMap::<u64, u64, _>::lock_free(8);
/// let sharded: ShardedMap<u64, u64, _> = ShardedMap::builder().shards(4).build_locking();
/// fill(&map);
/// fill(&sharded);
/// assert_eq!(map.size(), sharded.size());
/// ```
pub trait Store<K, V>: Send + Sync {
    /// Returns a clone of the value stored for `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` for `key`, replacing any previous value.
    fn set(&self, key: K, value: V) -> Result<()>;

    /// Removes the entry for `key`, failing with
    /// [`Error::NotFound`](crate::Error::NotFound) if it is absent.
    fn delete(&self, key: &K) -> Result<()>;

    /// Removes every entry.
    fn clear(&self);

    /// Returns the number of live entries.
    fn size(&self) -> u64;

    /// Returns `true` if the store holds an entry for `key`.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Returns `true` if the store holds no entries.
    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl<K, V, B> Store<K, V> for HashMap<K, V, B>
where
    K: KeyHash + Eq + Clone,
    V: Clone,
    B: Bucket<K, V>,
{
    fn get(&self, key: &K) -> Option<V> {
        HashMap::get(self, key)
    }

    fn set(&self, key: K, value: V) -> Result<()> {
        HashMap::set(self, key, value)
    }

    fn delete(&self, key: &K) -> Result<()> {
        HashMap::delete(self, key)
    }

    fn clear(&self) {
        HashMap::clear(self)
    }

    fn size(&self) -> u64 {
        HashMap::size(self)
    }

    fn contains_key(&self, key: &K) -> bool {
        HashMap::contains_key(self, key)
    }
}

impl<K, V, B> Store<K, V> for ShardedMap<K, V, B>
where
    K: KeyHash + Eq + Clone,
    V: Clone,
    B: Bucket<K, V>,
{
    fn get(&self, key: &K) -> Option<V> {
        ShardedMap::get(self, key)
    }

    fn set(&self, key: K, value: V) -> Result<()> {
        ShardedMap::set(self, key, value)
    }

    fn delete(&self, key: &K) -> Result<()> {
        ShardedMap::delete(self, key)
    }

    fn clear(&self) {
        ShardedMap::clear(self)
    }

    fn size(&self) -> u64 {
        ShardedMap::size(self)
    }

    fn contains_key(&self, key: &K) -> bool {
        ShardedMap::contains_key(self, key)
    }
}
