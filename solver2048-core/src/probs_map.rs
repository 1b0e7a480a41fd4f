//! Storage for a stratum's board-to-`MoveProbs` map (spec.md 3, "Position
//! partitioning"). Hasher choice is feature-gated the same way the board
//! engine's column caches are, so callers can trade a faster hash for
//! weaker DoS resistance when it matters.
use cfg_if::cfg_if;

use crate::codec::MoveProbs;

cfg_if! {
    if #[cfg(feature = "fnv")] {
        type BuildHasher = fnv::FnvBuildHasher;
    } else {
        type BuildHasher = std::collections::hash_map::RandomState;
    }
}

cfg_if! {
    if #[cfg(feature = "hashbrown")] {
        type Map<K, V> = hashbrown::HashMap<K, V, BuildHasher>;
    } else {
        type Map<K, V> = std::collections::HashMap<K, V, BuildHasher>;
    }
}

pub type ProbsMap = Map<u64, MoveProbs>;
