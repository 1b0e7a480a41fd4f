//! Exhaustive static-endgame table generator for 4x4 2048: given a root
//! board, a set of squares whose tile values must stay fixed, and a goal
//! tile, enumerates every reachable position and computes per-move win
//! probabilities, persisting them as on-disk tables.
#![warn(missing_docs)]

#[macro_use]
extern crate lazy_static;

mod build_common;

pub mod board;
pub mod codec;
mod dedup;
mod enumerator;
mod evaluator;
pub mod lut;
mod orchestrator;
mod probs_map;
mod sharding;
pub mod storage;
mod table;

pub mod error;

pub use board::{Board, Direction, StaticConfig, DIRECTIONS};
pub use codec::MoveProbs;
pub use error::{Error, Result};
pub use table::{goal_nibble_from_value, read_meta, write_meta, Config, TableGenerator, DEFAULT_CACHE_SIZE};

/// Shared across `storage.rs`'s and `table.rs`'s test modules: anything
/// touching `POSITIONS_DIR` or a relative `table_dir` has to serialize on
/// the process-global current directory, since the default test harness
/// runs `#[test]` fns in parallel threads within one binary.
#[cfg(test)]
pub(crate) mod test_support {
    use std::env;
    use std::path::PathBuf;
    use std::sync::{Mutex, MutexGuard};

    lazy_static! {
        static ref CWD_LOCK: Mutex<()> = Mutex::new(());
    }

    pub(crate) struct Cwd {
        original: PathBuf,
        _dir: tempfile::TempDir,
        _lock: MutexGuard<'static, ()>,
    }

    impl Cwd {
        pub(crate) fn enter() -> Cwd {
            let lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let dir = tempfile::tempdir().unwrap();
            let original = env::current_dir().unwrap();
            env::set_current_dir(dir.path()).unwrap();
            Cwd {
                original,
                _dir: dir,
                _lock: lock,
            }
        }
    }

    impl Drop for Cwd {
        fn drop(&mut self) {
            let _ = env::set_current_dir(&self.original);
        }
    }
}
