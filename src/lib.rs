#![deny(unsafe_op_in_unsafe_fn)]
#![doc = include_str!("../README.md")]

pub mod bucket;
pub mod hash;

mod error;
mod map;
mod sharded;
mod store;

pub use error::{Error, Result};
pub use map::{HashMap, DEFAULT_CAPACITY, LOAD_FACTOR};
pub use sharded::{ShardSelect, ShardedMap, ShardedMapBuilder};
pub use store::Store;
