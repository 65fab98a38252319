//! Predicate sharding.
//!
//! A logical key is stored under one of several parallel predicates
//! (`key_0`, `key_1`, ...) so that concurrent transactions spread their
//! index and tablet load instead of all contending on a single field.
//! The mapping is a pure function of the key and the shard count.

use std::num::NonZeroU64;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

/// 64-bit FNV-1a over the key's little-endian bytes.
#[must_use]
pub fn hash_key(key: i64) -> u64 {
    key.to_le_bytes().iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// The predicate that stores `key`, out of `shards` predicates named `prefix_i`.
#[must_use]
pub fn predicate_for(prefix: &str, shards: NonZeroU64, key: i64) -> String {
    format!("{prefix}_{}", hash_key(key) % shards)
}

/// Every predicate `prefix_0 .. prefix_(shards - 1)`, in order.
pub fn all_predicates(prefix: &str, shards: NonZeroU64) -> impl Iterator<Item = String> + '_ {
    (0..shards.get()).map(move |i| format!("{prefix}_{i}"))
}
