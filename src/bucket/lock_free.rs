use std::marker::PhantomData;
use std::sync::atomic::{AtomicIsize, AtomicPtr, Ordering};
use std::sync::Arc;
use std::{fmt, ptr};

use seize::{reclaim, Collector, Guard};

use super::tagged::{StrictProvenance, Unpack};
use super::{Bucket, Upsert};
use crate::Result;

/// A lock-free bucket list.
///
/// New keys are pushed onto the head with a compare-and-swap, and retried
/// from a fresh scan whenever another writer changes the head first. Values
/// live behind their own atomic pointer, so updating an existing key is a
/// single swap.
///
/// Deletion is two-phase: the node is first marked as deleted by tagging its
/// `next` pointer, which is the point the entry stops existing, and is then
/// unlinked from its predecessor. Scans that run into a marked node help
/// unlink it. Unlinked nodes and replaced values are retired to a
/// [`seize::Collector`] and only freed once no thread can still be reading
/// them.
///
/// Lists created through [`LockFreeList::factory`] share one collector.
pub struct LockFreeList<K, V> {
    head: AtomicPtr<Node<K, V>>,
    // Signed: a delete may be counted before the racing insert that published its node.
    len: AtomicIsize,
    collector: Arc<Collector>,
    _kv: PhantomData<(K, V)>,
}

// A node in the chain.
struct Node<K, V> {
    key: K,
    // Never null once the node is published.
    value: AtomicPtr<V>,
    // Tagged with `DELETED` once the node is logically removed.
    next: AtomicPtr<Node<K, V>>,
}

impl Node<(), ()> {
    // The node owning this `next` pointer has been removed.
    const DELETED: usize = 0b1;
}

impl<K, V> Unpack for Node<K, V> {
    const MASK: usize = !Node::DELETED;
}

impl<K, V> Drop for Node<K, V> {
    fn drop(&mut self) {
        let value = *self.value.get_mut();
        if !value.is_null() {
            // Safety: the node owns its current value, replaced values are retired separately.
            unsafe { drop(Box::from_raw(value)) };
        }
    }
}

impl<K, V> LockFreeList<K, V> {
    /// Creates an empty list with its own collector.
    pub fn new() -> LockFreeList<K, V> {
        LockFreeList::with_collector(Arc::new(Collector::new()))
    }

    /// Creates an empty list that retires nodes to `collector`.
    pub fn with_collector(collector: Arc<Collector>) -> LockFreeList<K, V> {
        LockFreeList {
            head: AtomicPtr::new(ptr::null_mut()),
            len: AtomicIsize::new(0),
            collector,
            _kv: PhantomData,
        }
    }

    /// Returns a constructor for lists that all share a single collector.
    ///
    /// ```
    /// use shardmap::bucket::{Bucket, LockFreeList};
    ///
    /// let factory = LockFreeList::<u64, u64>::factory();
    /// let (a, b) = (factory(), factory());
    /// assert!(std::ptr::eq(a.collector(), b.collector()));
    /// ```
    pub fn factory() -> impl Fn() -> LockFreeList<K, V> + Clone + Send + Sync + 'static
    where
        K: 'static,
        V: 'static,
    {
        let collector = Arc::new(Collector::new());
        move || LockFreeList::with_collector(collector.clone())
    }

    /// Returns the collector nodes are retired to.
    pub fn collector(&self) -> &Collector {
        &self.collector
    }

    fn visit(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        let guard = self.collector.enter();
        let mut curr = guard.protect(&self.head, Ordering::Acquire);

        while !curr.is_null() {
            // Safety: loaded under the guard, so it is not reclaimed until the guard is dropped.
            let node = unsafe { &*curr };
            let next = guard.protect(&node.next, Ordering::Acquire).unpack();

            if next.tag() == 0 {
                let value = guard.protect(&node.value, Ordering::Acquire);
                // Safety: protected by the guard like the node itself.
                if !visit(&node.key, unsafe { &*value }) {
                    return;
                }
            }

            curr = next.ptr;
        }
    }
}

impl<K: Eq, V> LockFreeList<K, V> {
    // Searches for an unmarked node holding `key`, unlinking every marked node on the way.
    //
    // Returns the link that points at the node, together with the node, or the terminating
    // link and null if the key is not present.
    fn find<'g, G>(&'g self, key: &K, guard: &'g G) -> (&'g AtomicPtr<Node<K, V>>, *mut Node<K, V>)
    where
        G: Guard,
    {
        'retry: loop {
            let mut prev = &self.head;
            let mut curr = guard.protect(prev, Ordering::Acquire);

            loop {
                if curr.is_null() {
                    return (prev, curr);
                }

                // Safety: loaded under the guard.
                let node = unsafe { &*curr };
                let next = guard.protect(&node.next, Ordering::Acquire).unpack();

                if next.tag() & Node::DELETED != 0 {
                    // Help the deleting thread. Fails if `prev` was itself deleted or changed.
                    match prev.compare_exchange(
                        curr,
                        next.ptr,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => {
                            // Safety: the node is now unreachable and we are the thread that
                            // unlinked it, so nobody else retires it.
                            unsafe { guard.defer_retire(curr, reclaim::boxed::<Node<K, V>>) };
                            curr = next.ptr;
                            continue;
                        }
                        Err(_) => continue 'retry,
                    }
                }

                if node.key == *key {
                    return (prev, curr);
                }

                prev = &node.next;
                curr = next.ptr;
            }
        }
    }
}

impl<K, V> Bucket<K, V> for LockFreeList<K, V>
where
    K: Eq + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let guard = self.collector.enter();
        let mut curr = guard.protect(&self.head, Ordering::Acquire);

        while !curr.is_null() {
            // Safety: loaded under the guard.
            let node = unsafe { &*curr };
            let next = guard.protect(&node.next, Ordering::Acquire).unpack();

            if next.tag() == 0 && node.key == *key {
                let value = guard.protect(&node.value, Ordering::Acquire);
                // Safety: published values are never null, and are protected by the guard.
                return Some(unsafe { (*value).clone() });
            }

            curr = next.ptr;
        }

        None
    }

    fn set(&self, key: K, value: V) -> Result<Upsert> {
        let guard = self.collector.enter();

        let new = Box::into_raw(Box::new(Node {
            key,
            value: AtomicPtr::new(Box::into_raw(Box::new(value))),
            next: AtomicPtr::new(ptr::null_mut()),
        }));

        // Safety: `new` is owned by this thread until the head CAS succeeds.
        let key = unsafe { &(*new).key };

        loop {
            // Snapshot the head before scanning: any insert that races with the scan
            // changes the head and fails our CAS below.
            let head = guard.protect(&self.head, Ordering::Acquire);
            let (_, found) = self.find(key, &guard);

            if !found.is_null() {
                unsafe {
                    let value = (*new).value.swap(ptr::null_mut(), Ordering::Relaxed);
                    let old = (*found).value.swap(value, Ordering::AcqRel);
                    // Safety: `old` was published, so readers may still hold it.
                    guard.defer_retire(old, reclaim::boxed::<V>);
                    // Safety: `new` was never published.
                    drop(Box::from_raw(new));
                }

                return Ok(Upsert::Updated);
            }

            unsafe { (*new).next.store(head, Ordering::Relaxed) };

            if self
                .head
                .compare_exchange(head, new, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                self.len.fetch_add(1, Ordering::Relaxed);
                return Ok(Upsert::Inserted);
            }
        }
    }

    fn delete(&self, key: &K) -> Result<bool> {
        let guard = self.collector.enter();

        loop {
            let (prev, curr) = self.find(key, &guard);
            if curr.is_null() {
                return Ok(false);
            }

            // Safety: loaded under the guard.
            let node = unsafe { &*curr };
            let next = guard.protect(&node.next, Ordering::Acquire).unpack();

            // Another delete got here first, the next scan unlinks the node.
            if next.tag() != 0 {
                continue;
            }

            if node
                .next
                .compare_exchange(
                    next.raw,
                    next.with_tag(Node::DELETED),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_err()
            {
                continue;
            }

            self.len.fetch_sub(1, Ordering::Relaxed);

            match prev.compare_exchange(curr, next.ptr, Ordering::AcqRel, Ordering::Acquire) {
                // Safety: unlinked by this thread.
                Ok(_) => unsafe { guard.defer_retire(curr, reclaim::boxed::<Node<K, V>>) },
                // The predecessor changed underneath us, rescan to unlink.
                Err(_) => {
                    let _ = self.find(key, &guard);
                }
            }

            return Ok(true);
        }
    }

    fn for_each(&self, visit: &mut dyn FnMut(&K, &V) -> bool) {
        self.visit(visit);
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed).max(0) as usize
    }

    fn contains_key(&self, key: &K) -> bool {
        let mut found = false;
        self.visit(&mut |k, _| {
            found = k == key;
            !found
        });
        found
    }
}

impl<K, V> Default for LockFreeList<K, V> {
    fn default() -> Self {
        LockFreeList::new()
    }
}

impl<K, V> Drop for LockFreeList<K, V> {
    fn drop(&mut self) {
        // Nodes still in the chain, including marked ones that were never unlinked,
        // are owned by the list. Unlinked nodes belong to the collector.
        let mut curr = *self.head.get_mut();
        while !curr.is_null() {
            // Safety: we have unique access, nothing else can reach the chain.
            let mut node = unsafe { Box::from_raw(curr) };
            curr = (*node.next.get_mut()).unpack().ptr;
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for LockFreeList<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        self.visit(&mut |key, value| {
            map.entry(key, value);
            true
        });
        map.finish()
    }
}

// Safety: keys and values are shared between threads through `&self` and moved
// in and out of the list, which requires them to be both `Send` and `Sync`.
unsafe impl<K: Send + Sync, V: Send + Sync> Send for LockFreeList<K, V> {}
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for LockFreeList<K, V> {}
