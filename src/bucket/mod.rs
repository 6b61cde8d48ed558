//! Bucket containers.
//!
//! A bucket is a singly linked association list holding at most one value per
//! key. The [`HashMap`](crate::HashMap) keeps an array of buckets and delegates
//! all per-key work to the bucket that owns the key, so the concurrency
//! discipline of the whole map is decided by the bucket type:
//!
//! - [`LockingList`] guards its chain with a reader-writer lock.
//! - [`LockFreeList`] publishes and unlinks nodes with compare-and-swap and
//!   defers reclamation to a [`seize::Collector`].
//! - [`ShardedList`] stripes keys over a fixed set of inner buckets.

mod locking;
mod lock_free;
mod sharded;
mod tagged;

pub use lock_free::LockFreeList;
pub use locking::LockingList;
pub use sharded::ShardedList;

use crate::Result;

/// The outcome of [`Bucket::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The key was not present and a new entry was linked.
    Inserted,
    /// The key was present and its value was replaced.
    Updated,
}

/// A concurrent association list mapping keys to values.
///
/// Implementations must be safe to share between threads. Each operation is
/// linearizable with respect to other operations on the same bucket.
pub trait Bucket<K, V>: Send + Sync {
    /// Returns a clone of the value stored for `key`.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` for `key`, replacing any previous value.
    fn set(&self, key: K, value: V) -> Result<Upsert>;

    /// Removes the entry for `key`.
    ///
    /// Returns `Ok(false)` if the key was not present: deleting an absent key
    /// is not an error at the bucket level.
    fn delete(&self, key: &K) -> Result<bool>;

    /// Calls `visit` on every entry until it returns `false`.
    fn for_each(&self, visit: &mut dyn FnMut(&K, &V) -> bool);

    /// Returns the number of entries in the bucket.
    fn len(&self) -> usize;

    /// Returns `true` if the bucket holds no entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if the bucket holds an entry for `key`.
    fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }
}
