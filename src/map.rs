use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockWriteGuard};
use tracing::{debug, trace, warn};

use crate::bucket::{Bucket, LockFreeList, LockingList, Upsert};
use crate::hash::KeyHash;
use crate::{Error, Result};

/// The initial capacity used by [`HashMap::default`].
pub const DEFAULT_CAPACITY: u64 = 16;

/// The table grows once it holds more than `LOAD_FACTOR` entries per bucket.
pub const LOAD_FACTOR: u64 = 2;

// A shared bucket constructor.
pub(crate) type Factory<B> = Arc<dyn Fn() -> B + Send + Sync>;

/// A concurrent hash map built from bucket lists.
///
/// The map owns an array of buckets and a live entry count. A key lives in
/// bucket `hash(key) % capacity`, and all per-key work is delegated to that
/// bucket, so the concurrency discipline is chosen by the bucket type `B`:
/// [`LockingList`] (the default), [`LockFreeList`] or
/// [`ShardedList`](crate::bucket::ShardedList).
///
/// The bucket array and capacity sit behind a reader-writer lock. Keyed
/// operations hold it in shared mode, so they only contend inside their own
/// bucket. Once an insert pushes the count past `2 × capacity`, the inserting
/// thread takes the lock exclusively, doubles the capacity and rehashes every
/// entry into a fresh array.
///
/// # Examples
///
/// ```
/// use shardmap::HashMap;
///
/// let map = HashMap::<u64, u64, _>::locking(4);
/// for i in 0..9 {
///     map.set(i, i * 10).unwrap();
/// }
///
/// assert_eq!(map.capacity(), 8);
/// assert_eq!(map.get(&3), Some(30));
/// assert!(map.delete(&42).is_err());
/// ```
pub struct HashMap<K, V, B = LockingList<K, V>> {
    table: RwLock<Table<B>>,
    // Signed: a delete may be counted before the racing insert it removed.
    count: AtomicI64,
    factory: Factory<B>,
    _kv: PhantomData<fn(K) -> V>,
}

// The bucket array and its capacity, always replaced together.
struct Table<B> {
    buckets: Box<[Arc<B>]>,
    capacity: u64,
}

impl<B> Table<B> {
    fn new(capacity: u64, factory: &Factory<B>) -> Table<B> {
        Table {
            buckets: (0..capacity).map(|_| Arc::new(factory())).collect(),
            capacity,
        }
    }

    #[inline]
    fn bucket(&self, hash: u64) -> &Arc<B> {
        &self.buckets[(hash % self.capacity) as usize]
    }
}

#[inline]
fn exceeds_load(count: i64, capacity: u64) -> bool {
    count > 0 && count as u64 > capacity.saturating_mul(LOAD_FACTOR)
}

impl<K, V, B> HashMap<K, V, B> {
    /// Creates a map with `capacity` buckets built by `factory`.
    ///
    /// A capacity of zero is raised to one.
    pub fn with_factory<F>(capacity: u64, factory: F) -> HashMap<K, V, B>
    where
        F: Fn() -> B + Send + Sync + 'static,
    {
        HashMap::with_shared_factory(capacity, Arc::new(factory))
    }

    pub(crate) fn with_shared_factory(capacity: u64, factory: Factory<B>) -> HashMap<K, V, B> {
        let capacity = if capacity == 0 {
            warn!("zero capacity requested for hash map, using 1");
            1
        } else {
            capacity
        };

        HashMap {
            table: RwLock::new(Table::new(capacity, &factory)),
            count: AtomicI64::new(0),
            factory,
            _kv: PhantomData,
        }
    }

    /// Returns the current number of buckets.
    pub fn capacity(&self) -> u64 {
        self.table.read().capacity
    }

    /// Returns the number of live entries.
    pub fn size(&self) -> u64 {
        let _table = self.table.read();
        self.count.load(Ordering::Acquire).max(0) as u64
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Removes every entry.
    ///
    /// Each bucket is replaced by a fresh one from the factory. The capacity
    /// is kept.
    pub fn clear(&self) {
        let mut table = self.table.write();
        let fresh = Table::new(table.capacity, &self.factory);
        let old = mem::replace(&mut table.buckets, fresh.buckets);
        self.count.store(0, Ordering::Release);
        trace!(capacity = table.capacity, "cleared hash map");

        // Release the lock before running the old buckets' destructors.
        drop(table);
        drop(old);
    }
}

impl<K, V, B> HashMap<K, V, B>
where
    B: Default + 'static,
{
    /// Creates a map with `capacity` buckets built with [`Default`].
    pub fn new(capacity: u64) -> HashMap<K, V, B> {
        HashMap::with_factory(capacity, B::default)
    }
}

impl<K, V> HashMap<K, V, LockingList<K, V>>
where
    K: 'static,
    V: 'static,
{
    /// Creates a map over [`LockingList`] buckets.
    pub fn locking(capacity: u64) -> Self {
        HashMap::with_factory(capacity, LockingList::new)
    }
}

impl<K, V> HashMap<K, V, LockFreeList<K, V>>
where
    K: 'static,
    V: 'static,
{
    /// Creates a map over [`LockFreeList`] buckets sharing a single collector.
    pub fn lock_free(capacity: u64) -> Self {
        HashMap::with_factory(capacity, LockFreeList::factory())
    }
}

impl<K, V, B> HashMap<K, V, B>
where
    K: KeyHash + Eq + Clone,
    V: Clone,
    B: Bucket<K, V>,
{
    /// Returns a clone of the value stored for `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let hash = key.key_hash();

        // The lock protects the bucket array, not the bucket's contents.
        let bucket = Arc::clone(self.table.read().bucket(hash));
        bucket.get(key)
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key(&self, key: &K) -> bool {
        let hash = key.key_hash();
        let bucket = Arc::clone(self.table.read().bucket(hash));
        bucket.contains_key(key)
    }

    /// Stores `value` for `key`, replacing any previous value.
    ///
    /// Growing the table happens on the calling thread when the insert pushes
    /// the entry count past the load factor.
    pub fn set(&self, key: K, value: V) -> Result<()> {
        let hash = key.key_hash();

        let grow = {
            // Hold the shared lock across the write so it can't land in a table
            // that a concurrent resize or clear has already replaced.
            let table = self.table.read();
            match table.bucket(hash).set(key, value)? {
                Upsert::Updated => false,
                Upsert::Inserted => {
                    let count = self.count.fetch_add(1, Ordering::AcqRel) + 1;
                    exceeds_load(count, table.capacity)
                }
            }
        };

        if grow {
            self.resize()?;
        }

        Ok(())
    }

    /// Removes the entry for `key`.
    ///
    /// Returns [`Error::NotFound`] if the key is not present.
    pub fn delete(&self, key: &K) -> Result<()> {
        let hash = key.key_hash();

        let table = self.table.read();
        let bucket = table.bucket(hash);

        if !bucket.contains_key(key) {
            return Err(Error::NotFound);
        }

        // A racing delete of the same key may still win between the check and the unlink.
        if !bucket.delete(key)? {
            return Err(Error::NotFound);
        }

        self.count.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }

    // Doubles the capacity if the load factor is still exceeded.
    fn resize(&self) -> Result<()> {
        let mut table = self.table.write();

        // Another thread may have resized while we waited for the lock.
        let count = self.count.load(Ordering::Acquire);
        if !exceeds_load(count, table.capacity) {
            return Ok(());
        }

        self.rehash(&mut table)
    }

    fn rehash(&self, table: &mut RwLockWriteGuard<'_, Table<B>>) -> Result<()> {
        let old_capacity = table.capacity;
        let new_capacity = old_capacity.saturating_mul(2);
        let new = Table::new(new_capacity, &self.factory);

        let mut moved = 0_u64;
        let mut failure = None;

        for bucket in table.buckets.iter() {
            bucket.for_each(&mut |key, value| {
                match new.bucket(key.key_hash()).set(key.clone(), value.clone()) {
                    Ok(_) => {
                        moved += 1;
                        true
                    }
                    Err(err) => {
                        failure = Some(err);
                        false
                    }
                }
            });

            if let Some(err) = failure {
                warn!(%err, old_capacity, "aborted hash map resize");
                return Err(err);
            }
        }

        table.buckets = new.buckets;
        table.capacity = new_capacity;

        debug!(old_capacity, new_capacity, moved, "resized hash map");
        Ok(())
    }
}

impl<K, V> Default for HashMap<K, V, LockingList<K, V>>
where
    K: 'static,
    V: 'static,
{
    fn default() -> Self {
        HashMap::locking(DEFAULT_CAPACITY)
    }
}

impl<K, V, B> fmt::Debug for HashMap<K, V, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.read();
        f.debug_struct("HashMap")
            .field("capacity", &table.capacity)
            .field("size", &self.count.load(Ordering::Relaxed).max(0))
            .finish_non_exhaustive()
    }
}
