use std::fmt;

use parking_lot::RwLock;

use super::{Bucket, Upsert};
use crate::Result;

/// A bucket list guarded by a single reader-writer lock.
///
/// Lookups and traversals take the lock in shared mode, mutations take it
/// exclusively. New keys are appended at the tail, so iteration follows
/// insertion order.
pub struct LockingList<K, V> {
    inner: RwLock<Chain<K, V>>,
}

struct Chain<K, V> {
    head: Link<K, V>,
    len: usize,
}

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    next: Link<K, V>,
}

impl<K, V> LockingList<K, V> {
    /// Creates an empty list.
    pub fn new() -> LockingList<K, V> {
        LockingList {
            inner: RwLock::new(Chain { head: None, len: 0 }),
        }
    }
}

impl<K, V> Default for LockingList<K, V> {
    fn default() -> Self {
        LockingList::new()
    }
}

impl<K, V> Chain<K, V> {
    fn iter(&self) -> impl Iterator<Item = &Node<K, V>> {
        std::iter::successors(self.head.as_deref(), |node| node.next.as_deref())
    }
}

impl<K, V> Bucket<K, V> for LockingList<K, V>
where
    K: Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let chain = self.inner.read();
        let value = chain
            .iter()
            .find(|node| node.key == *key)
            .map(|node| node.value.clone());
        value
    }

    fn set(&self, key: K, value: V) -> Result<Upsert> {
        let mut chain = self.inner.write();
        let chain = &mut *chain;

        let mut link = &mut chain.head;
        loop {
            match link {
                None => break,
                Some(node) if node.key == key => {
                    node.value = value;
                    return Ok(Upsert::Updated);
                }
                Some(node) => link = &mut node.next,
            }
        }

        *link = Some(Box::new(Node {
            key,
            value,
            next: None,
        }));
        chain.len += 1;

        Ok(Upsert::Inserted)
    }

    fn delete(&self, key: &K) -> Result<bool> {
        let mut chain = self.inner.write();
        let chain = &mut *chain;

        let mut link = &mut chain.head;
        loop {
            match link {
                None => return Ok(false),
                Some(node) if node.key == *key => break,
                Some(node) => link = &mut node.next,
            }
        }

        // `link` points at the matching node: splice it out.
        if let Some(mut node) = link.take() {
            *link = node.next.take();
            chain.len -= 1;
        }

        Ok(true)
    }

    fn for_each(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let chain = self.inner.read();
        for node in chain.iter() {
            if !visit(&node.key, &node.value) {
                return;
            }
        }
    }

    fn len(&self) -> usize {
        self.inner.read().len
    }

    fn contains_key(&self, key: &K) -> bool {
        self.inner.read().iter().any(|node| node.key == *key)
    }
}

impl<K, V> Drop for Chain<K, V> {
    fn drop(&mut self) {
        // Unlink iteratively so long chains don't overflow the stack.
        let mut link = self.head.take();
        while let Some(mut node) = link {
            link = node.next.take();
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LockingList<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chain = self.inner.read();
        f.debug_map()
            .entries(chain.iter().map(|node| (&node.key, &node.value)))
            .finish()
    }
}
