#![no_main]

use libfuzzer_sys::fuzz_target;

use arbitrary::Arbitrary;
use shardmap::bucket::{Bucket, LockFreeList, LockingList, Upsert};
use shardmap::{Error, HashMap as ShardHashMap, ShardSelect, ShardedMap, Store};
use std::collections::HashMap as StdHashMap;

#[derive(Debug, Arbitrary)]
enum Operation<K, V> {
    Set(K, V),
    Delete(K),
    Get(K),
    Contains(K),
    Clear,
    Size,
    IsEmpty,
}

#[derive(Debug, Arbitrary)]
struct FuzzInput {
    capacity: u8,
    shards: u8,
    mask: bool,
    operations: Vec<Operation<u16, u32>>,
}

fn check_store(store: &dyn Store<u16, u32>, operations: &[Operation<u16, u32>]) {
    let mut std_map = StdHashMap::new();

    for op in operations {
        match *op {
            Operation::Set(k, v) => {
                std_map.insert(k, v);
                store.set(k, v).unwrap();
            }
            Operation::Delete(k) => {
                let std_result = std_map.remove(&k).map(drop).ok_or(Error::NotFound);
                assert_eq!(std_result, store.delete(&k));
            }
            Operation::Get(k) => {
                assert_eq!(std_map.get(&k).copied(), store.get(&k));
            }
            Operation::Contains(k) => {
                assert_eq!(std_map.contains_key(&k), store.contains_key(&k));
            }
            Operation::Clear => {
                std_map.clear();
                store.clear();
            }
            Operation::Size => {
                assert_eq!(std_map.len() as u64, store.size());
            }
            Operation::IsEmpty => {
                assert_eq!(std_map.is_empty(), store.is_empty());
            }
        }
    }

    // Final consistency checks
    for (k, v) in std_map.iter() {
        assert_eq!(Some(*v), store.get(k));
    }
    assert_eq!(std_map.len() as u64, store.size());
}

fn check_bucket(bucket: &dyn Bucket<u16, u32>, operations: &[Operation<u16, u32>]) {
    let mut std_map = StdHashMap::new();

    for op in operations {
        match *op {
            Operation::Set(k, v) => {
                let expected = match std_map.insert(k, v) {
                    Some(_) => Upsert::Updated,
                    None => Upsert::Inserted,
                };
                assert_eq!(Ok(expected), bucket.set(k, v));
            }
            Operation::Delete(k) => {
                assert_eq!(Ok(std_map.remove(&k).is_some()), bucket.delete(&k));
            }
            Operation::Get(k) => {
                assert_eq!(std_map.get(&k).copied(), bucket.get(&k));
            }
            Operation::Contains(k) => {
                assert_eq!(std_map.contains_key(&k), bucket.contains_key(&k));
            }
            // Buckets are cleared by replacing them.
            Operation::Clear => {}
            Operation::Size => {
                assert_eq!(std_map.len(), bucket.len());
            }
            Operation::IsEmpty => {
                assert_eq!(std_map.is_empty(), bucket.is_empty());
            }
        }
    }

    let mut visited = 0;
    bucket.for_each(&mut |k, v| {
        assert_eq!(std_map.get(k), Some(v));
        visited += 1;
        true
    });
    assert_eq!(visited, std_map.len());
}

fn fuzz_stores(input: FuzzInput) {
    let capacity = u64::from(input.capacity % 16);
    let select = if input.mask {
        ShardSelect::Mask
    } else {
        ShardSelect::Modulo
    };

    check_store(
        &ShardHashMap::<u16, u32, _>::locking(capacity),
        &input.operations,
    );
    check_store(
        &ShardHashMap::<u16, u32, _>::lock_free(capacity),
        &input.operations,
    );

    let sharded: ShardedMap<u16, u32, _> = ShardedMap::builder()
        .shards(usize::from(input.shards % 32))
        .capacity(capacity)
        .select(select)
        .build_lock_free();
    check_store(&sharded, &input.operations);

    check_bucket(&LockingList::<u16, u32>::new(), &input.operations);
    check_bucket(&LockFreeList::<u16, u32>::new(), &input.operations);
}

fuzz_target!(|data: FuzzInput| {
    fuzz_stores(data);
});
