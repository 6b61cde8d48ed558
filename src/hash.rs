//! Key hashing.
//!
//! Every key stored in a [`HashMap`](crate::HashMap) or
//! [`ShardedMap`](crate::ShardedMap) implements [`KeyHash`], which derives the
//! unsigned integer used to pick both a bucket and a shard. Hashes are
//! deterministic across runs and processes: there is no random seed.
//!
//! Integers hash to their own bit pattern, strings to a polynomial accumulator
//! and byte sequences to FNV-1a. Types without an implementation can either
//! implement [`KeyHash`] directly, or be wrapped in [`Rendered`] (hashes the
//! `Display` output) or [`Hashed`] (feeds `std::hash::Hash` into [`Fnv1a`]).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;

/// A key that can produce its own hash.
pub trait KeyHash {
    /// Returns the hash of this key.
    fn key_hash(&self) -> u64;
}

/// Multiplier of the polynomial string accumulator.
const POLY_FACTOR: u64 = 31;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Polynomial accumulator: `h = h * 31 + byte` for every byte, wrapping on overflow.
#[inline]
pub fn poly31(bytes: &[u8]) -> u64 {
    poly31_extend(0, bytes)
}

#[inline]
fn poly31_extend(hash: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(hash, |hash, &byte| {
        hash.wrapping_mul(POLY_FACTOR).wrapping_add(u64::from(byte))
    })
}

/// 64-bit FNV-1a of a byte slice.
#[inline]
pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hasher = Fnv1a::default();
    hasher.write(bytes);
    hasher.finish()
}

/// A 64-bit FNV-1a [`Hasher`].
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a(u64);

impl Default for Fnv1a {
    fn default() -> Fnv1a {
        Fnv1a(FNV_OFFSET_BASIS)
    }
}

impl Hasher for Fnv1a {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 ^= u64::from(byte);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }
}

macro_rules! impl_key_hash_int {
    ($($ty:ty),*) => {$(
        impl KeyHash for $ty {
            // Signed values are reinterpreted, never negated: the result is always a valid index.
            #[inline]
            fn key_hash(&self) -> u64 {
                *self as u64
            }
        }
    )*};
}

impl_key_hash_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl KeyHash for u128 {
    #[inline]
    fn key_hash(&self) -> u64 {
        (*self as u64) ^ ((*self >> 64) as u64)
    }
}

impl KeyHash for i128 {
    #[inline]
    fn key_hash(&self) -> u64 {
        (*self as u128).key_hash()
    }
}

impl KeyHash for bool {
    #[inline]
    fn key_hash(&self) -> u64 {
        u64::from(*self)
    }
}

impl KeyHash for char {
    #[inline]
    fn key_hash(&self) -> u64 {
        let mut buf = [0; 4];
        poly31(self.encode_utf8(&mut buf).as_bytes())
    }
}

impl KeyHash for str {
    #[inline]
    fn key_hash(&self) -> u64 {
        poly31(self.as_bytes())
    }
}

impl KeyHash for String {
    #[inline]
    fn key_hash(&self) -> u64 {
        self.as_str().key_hash()
    }
}

impl KeyHash for [u8] {
    #[inline]
    fn key_hash(&self) -> u64 {
        fnv1a(self)
    }
}

impl<const N: usize> KeyHash for [u8; N] {
    #[inline]
    fn key_hash(&self) -> u64 {
        fnv1a(self)
    }
}

impl KeyHash for Vec<u8> {
    #[inline]
    fn key_hash(&self) -> u64 {
        fnv1a(self)
    }
}

impl<T: KeyHash + ?Sized> KeyHash for &T {
    #[inline]
    fn key_hash(&self) -> u64 {
        (**self).key_hash()
    }
}

impl<T: KeyHash + ?Sized> KeyHash for Box<T> {
    #[inline]
    fn key_hash(&self) -> u64 {
        (**self).key_hash()
    }
}

impl<T: KeyHash + ?Sized> KeyHash for Arc<T> {
    #[inline]
    fn key_hash(&self) -> u64 {
        (**self).key_hash()
    }
}

impl<T: KeyHash + ?Sized> KeyHash for Rc<T> {
    #[inline]
    fn key_hash(&self) -> u64 {
        (**self).key_hash()
    }
}

/// Hashes a key through its canonical string rendering.
///
/// The `Display` output is streamed into the polynomial accumulator, so two
/// keys that render identically hash identically.
///
/// ```
/// use shardmap::hash::{poly31, KeyHash, Rendered};
///
/// let key = Rendered(std::net::Ipv4Addr::LOCALHOST);
/// assert_eq!(key.key_hash(), poly31(b"127.0.0.1"));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Rendered<T>(pub T);

impl<T: fmt::Display> KeyHash for Rendered<T> {
    fn key_hash(&self) -> u64 {
        struct Accumulator(u64);

        impl fmt::Write for Accumulator {
            fn write_str(&mut self, s: &str) -> fmt::Result {
                self.0 = poly31_extend(self.0, s.as_bytes());
                Ok(())
            }
        }

        let mut acc = Accumulator(0);
        // Formatting into the accumulator cannot fail unless `Display` itself
        // reports an error, in which case the prefix written so far is used.
        let _ = fmt::write(&mut acc, format_args!("{}", self.0));
        acc.0
    }
}

/// Hashes a key through its [`Hash`] implementation with [`Fnv1a`].
///
/// ```
/// use shardmap::hash::{Hashed, KeyHash};
///
/// let a = Hashed((1u8, "one"));
/// let b = Hashed((1u8, "one"));
/// assert_eq!(a.key_hash(), b.key_hash());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hashed<T>(pub T);

impl<T: Hash> KeyHash for Hashed<T> {
    fn key_hash(&self) -> u64 {
        let mut hasher = Fnv1a::default();
        self.0.hash(&mut hasher);
        hasher.finish()
    }
}
