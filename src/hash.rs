//! Hashing for the per-object lookup tables.
//!
//! Signal tables, connection slots and ledgers are small, private and keyed
//! by values the process itself produced, so they use a seeded foldhash
//! instead of the DoS-resistant std hasher.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};
use indexmap::IndexMap;

/// Zero-sized `BuildHasher` running foldhash with a fixed seed.
#[derive(Clone, Copy, Debug, Default)]
pub struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x9e37_79b9_7f4a_7c15).build_hasher()
    }
}

/// Insertion-ordered map used for every table whose iteration order is
/// observable (signal lists, connection lists, emission order).
pub type FastIndexMap<K, V> = IndexMap<K, V, FastHashBuilder>;
