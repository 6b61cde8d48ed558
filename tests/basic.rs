use std::net::Ipv4Addr;

use shardmap::hash::{Hashed, KeyHash, Rendered};
use shardmap::{Error, HashMap, ShardSelect, ShardedMap};

mod common;
use common::with_store;

#[test]
fn new() {
    with_store::<usize, usize>(|store| {
        let store = store(16);
        assert_eq!(store.size(), 0);
        assert!(store.is_empty());
    });
}

#[test]
fn get_empty() {
    with_store::<usize, usize>(|store| {
        let store = store(16);
        assert_eq!(store.get(&42), None);
        assert!(!store.contains_key(&42));
    });
}

#[test]
fn delete_empty() {
    with_store::<usize, usize>(|store| {
        let store = store(16);
        assert_eq!(store.delete(&42), Err(Error::NotFound));
        assert_eq!(store.size(), 0);
    });
}

#[test]
fn set_and_get() {
    with_store::<String, usize>(|store| {
        let store = store(16);
        store.set("key1".to_owned(), 42).unwrap();
        assert_eq!(store.get(&"key1".to_owned()), Some(42));
        assert_eq!(store.get(&"key2".to_owned()), None);
        assert_eq!(store.size(), 1);
    });
}

#[test]
fn set_multiple() {
    with_store::<String, usize>(|store| {
        let store = store(16);
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            store.set(key.to_owned(), i).unwrap();
        }

        assert_eq!(store.size(), 4);
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            assert_eq!(store.get(&key.to_owned()), Some(i));
        }
    });
}

#[test]
fn overwrite() {
    with_store::<usize, usize>(|store| {
        let store = store(16);
        store.set(7, 1).unwrap();
        store.set(7, 2).unwrap();
        assert_eq!(store.get(&7), Some(2));
        assert_eq!(store.size(), 1);
    });
}

#[test]
fn set_idempotent() {
    with_store::<usize, usize>(|store| {
        let store = store(4);
        for _ in 0..10 {
            store.set(3, 3).unwrap();
        }
        assert_eq!(store.get(&3), Some(3));
        assert_eq!(store.size(), 1);
    });
}

#[test]
fn delete() {
    with_store::<usize, usize>(|store| {
        let store = store(16);
        store.set(1, 10).unwrap();
        store.set(2, 20).unwrap();

        store.delete(&1).unwrap();
        assert_eq!(store.get(&1), None);
        assert_eq!(store.get(&2), Some(20));
        assert_eq!(store.size(), 1);

        assert_eq!(store.delete(&1), Err(Error::NotFound));
        assert_eq!(store.size(), 1);
    });
}

#[test]
fn delete_then_reinsert() {
    with_store::<usize, usize>(|store| {
        let store = store(2);
        store.set(5, 1).unwrap();
        store.delete(&5).unwrap();
        store.set(5, 2).unwrap();
        assert_eq!(store.get(&5), Some(2));
        assert_eq!(store.size(), 1);
    });
}

#[test]
fn size_tracks_inserts_and_deletes() {
    with_store::<usize, usize>(|store| {
        let store = store(4);
        for i in 0..50 {
            store.set(i, i).unwrap();
            assert_eq!(store.size(), i as u64 + 1);
        }

        for i in 0..50 {
            store.delete(&i).unwrap();
            assert_eq!(store.size(), 49 - i as u64);
        }

        assert!(store.is_empty());
    });
}

#[test]
fn clear() {
    with_store::<usize, usize>(|store| {
        let store = store(4);
        for i in 0..5 {
            store.set(i, 1).unwrap();
        }

        store.clear();
        assert!(store.is_empty());
        for i in 0..5 {
            assert_eq!(store.get(&i), None);
        }

        // Still usable after clearing.
        store.set(3, 4).unwrap();
        assert_eq!(store.get(&3), Some(4));
        assert_eq!(store.size(), 1);
    });
}

#[test]
fn clear_empty() {
    with_store::<usize, usize>(|store| {
        let store = store(4);
        store.clear();
        assert!(store.is_empty());
    });
}

#[test]
fn grows_past_initial_capacity() {
    with_store::<usize, usize>(|store| {
        let store = store(1);
        for i in 0..1000 {
            store.set(i, i * 2).unwrap();
        }

        assert_eq!(store.size(), 1000);
        for i in 0..1000 {
            assert_eq!(store.get(&i), Some(i * 2));
        }
    });
}

#[test]
fn zero_capacity() {
    with_store::<usize, usize>(|store| {
        let store = store(0);
        for i in 0..20 {
            store.set(i, i).unwrap();
        }
        assert_eq!(store.size(), 20);
        assert_eq!(store.get(&19), Some(19));
    });
}

#[test]
fn large_dataset() {
    const ENTRIES: usize = if cfg!(miri) { 128 } else { 10_000 };

    with_store::<String, usize>(|store| {
        let store = store(16);
        for i in 0..ENTRIES {
            store.set(format!("key-{i}"), i).unwrap();
        }

        assert_eq!(store.size(), ENTRIES as u64);
        for i in (0..ENTRIES).step_by(7) {
            assert_eq!(store.get(&format!("key-{i}")), Some(i));
        }
    });
}

#[test]
fn value_types() {
    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
        y: i32,
    }

    with_store::<u64, Vec<u8>>(|store| {
        let store = store(8);
        store.set(1, vec![1, 2, 3]).unwrap();
        store.set(2, Vec::new()).unwrap();
        assert_eq!(store.get(&1), Some(vec![1, 2, 3]));
        assert_eq!(store.get(&2), Some(Vec::new()));
    });

    with_store::<&'static str, Point>(|store| {
        let store = store(8);
        store.set("origin", Point { x: 0, y: 0 }).unwrap();
        store.set("unit", Point { x: 1, y: 1 }).unwrap();
        assert_eq!(store.get(&"unit"), Some(Point { x: 1, y: 1 }));
    });

    with_store::<i32, Option<String>>(|store| {
        let store = store(8);
        store.set(-1, None).unwrap();
        store.set(1, Some("one".to_owned())).unwrap();
        assert_eq!(store.get(&-1), Some(None));
        assert_eq!(store.get(&1), Some(Some("one".to_owned())));
    });
}

#[test]
fn zero_values() {
    with_store::<u64, u64>(|store| {
        let store = store(8);
        store.set(0, 0).unwrap();
        assert_eq!(store.get(&0), Some(0));
        assert!(store.contains_key(&0));
        store.delete(&0).unwrap();
        assert_eq!(store.get(&0), None);
    });
}

#[test]
fn colliding_keys() {
    // Every key lands in the same bucket and the same shard.
    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Collide(u32);

    impl KeyHash for Collide {
        fn key_hash(&self) -> u64 {
            0
        }
    }

    with_store::<Collide, u32>(|store| {
        let store = store(4);
        for i in 0..64 {
            store.set(Collide(i), i).unwrap();
        }

        assert_eq!(store.size(), 64);
        for i in 0..64 {
            assert_eq!(store.get(&Collide(i)), Some(i));
        }

        for i in (0..64).step_by(2) {
            store.delete(&Collide(i)).unwrap();
        }

        assert_eq!(store.size(), 32);
        assert_eq!(store.get(&Collide(2)), None);
        assert_eq!(store.get(&Collide(3)), Some(3));
    });
}

#[test]
fn wrapped_keys() {
    let localhost = Ipv4Addr::new(127, 0, 0, 1);
    with_store::<Rendered<Ipv4Addr>, &'static str>(|store| {
        let store = store(8);
        store.set(Rendered(localhost), "localhost").unwrap();
        assert_eq!(store.get(&Rendered(localhost)), Some("localhost"));
        assert_eq!(store.get(&Rendered(Ipv4Addr::UNSPECIFIED)), None);
    });

    with_store::<Hashed<(u8, char)>, u8>(|store| {
        let store = store(8);
        store.set(Hashed((1, 'a')), 1).unwrap();
        store.set(Hashed((2, 'b')), 2).unwrap();
        assert_eq!(store.get(&Hashed((2, 'b'))), Some(2));
        assert_eq!(store.size(), 2);
    });
}

#[test]
fn resize_doubles_capacity() {
    let map = HashMap::<usize, usize, _>::locking(4);

    // Eight entries fill four buckets to the load factor without growing.
    for i in 0..8 {
        map.set(i, i).unwrap();
    }
    assert_eq!(map.capacity(), 4);

    map.set(8, 8).unwrap();
    assert_eq!(map.capacity(), 8);
    for i in 0..=8 {
        assert_eq!(map.get(&i), Some(i));
    }

    for i in 9..=16 {
        map.set(i, i).unwrap();
    }
    assert_eq!(map.capacity(), 16);
    assert_eq!(map.size(), 17);
}

#[test]
fn resize_lock_free() {
    let map = HashMap::<usize, usize, _>::lock_free(4);
    for i in 0..=8 {
        map.set(i, i + 1).unwrap();
    }

    assert_eq!(map.capacity(), 8);
    for i in 0..=8 {
        assert_eq!(map.get(&i), Some(i + 1));
    }
}

#[test]
fn updates_do_not_resize() {
    let map = HashMap::<usize, usize, _>::locking(1);
    map.set(0, 0).unwrap();
    map.set(1, 0).unwrap();

    for i in 0..100 {
        map.set(0, i).unwrap();
    }
    assert_eq!(map.capacity(), 1);
}

#[test]
fn clear_keeps_capacity() {
    let map = HashMap::<usize, usize, _>::locking(2);
    for i in 0..10 {
        map.set(i, i).unwrap();
    }

    let capacity = map.capacity();
    assert!(capacity > 2);

    map.clear();
    assert_eq!(map.capacity(), capacity);
    assert!(map.is_empty());
}

#[test]
fn default_map() {
    let map: HashMap<String, u8> = HashMap::default();
    assert_eq!(map.capacity(), shardmap::DEFAULT_CAPACITY);
    map.set("a".to_owned(), 1).unwrap();
    assert_eq!(map.get(&"a".to_owned()), Some(1));
}

#[test]
fn sharded_clear() {
    let map: ShardedMap<u64, u64, _> = ShardedMap::builder().shards(8).build_locking();
    for i in 0..100 {
        map.set(i, i).unwrap();
    }
    assert_eq!(map.size(), 100);

    map.clear();
    assert_eq!(map.size(), 0);
    for i in 0..100 {
        assert_eq!(map.get(&i), None);
    }
}

#[test]
fn sharded_size_is_sum_of_shards() {
    let map: ShardedMap<u64, u64, _> = ShardedMap::builder().shards(5).build_lock_free();
    for i in 0..77 {
        map.set(i, i).unwrap();
    }

    let sum: u64 = map.shards().iter().map(HashMap::size).sum();
    assert_eq!(map.size(), 77);
    assert_eq!(sum, 77);
}

#[test]
fn sharded_routing_is_stable() {
    let map: ShardedMap<u64, u64, _> = ShardedMap::builder()
        .shards(4)
        .capacity(1)
        .select(ShardSelect::Mask)
        .build_locking();

    let before: Vec<_> = (0..500).map(|i| map.shard_index(&i)).collect();

    // Forces every shard to resize several times.
    for i in 0..500 {
        map.set(i, i).unwrap();
    }

    for i in 0..500 {
        let index = map.shard_index(&i);
        assert_eq!(index, before[i as usize]);
        assert_eq!(map.shards()[index].get(&i), Some(i));
    }
}

#[test]
fn shard_selection() {
    let modulo: ShardedMap<u64, u64, _> = ShardedMap::builder().shards(6).build_locking();
    assert_eq!(modulo.shard_count(), 6);
    assert_eq!(modulo.select(), ShardSelect::Modulo);
    assert_eq!(modulo.shard_index(&15), 3);

    let mask: ShardedMap<u64, u64, _> = ShardedMap::builder()
        .shards(6)
        .select(ShardSelect::Mask)
        .build_locking();
    assert_eq!(mask.shard_count(), 8);
    assert_eq!(mask.shard_index(&15), 7);

    let single: ShardedMap<u64, u64, _> = ShardedMap::builder().shards(0).build_locking();
    assert_eq!(single.shard_count(), 1);
    single.set(1, 1).unwrap();
    assert_eq!(single.get(&1), Some(1));
}

#[test]
fn sharded_default() {
    let map: ShardedMap<u64, u64> = ShardedMap::default();
    assert_eq!(map.shard_count(), 16);
    assert!(map.shards().iter().all(|shard| shard.capacity() == 16));
}

#[test]
fn debug() {
    let map = HashMap::<usize, usize, _>::lock_free(4);
    map.set(1, 1).unwrap();
    let debug = format!("{map:?}");
    assert!(debug.contains("capacity: 4"));
    assert!(debug.contains("size: 1"));
}
