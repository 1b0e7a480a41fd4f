//! Public facade tying the board engine, enumerator, evaluator, and
//! on-disk layout together (spec.md 6, "Core operations").
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Condvar, Mutex, RwLock};

use crate::board::{Board, StaticConfig};
use crate::codec::MoveProbs;
use crate::dedup::DedupCache;
use crate::error::{Error, Result};
use crate::lut;
use crate::orchestrator::{self, Shared, State};
use crate::probs_map::ProbsMap;
use crate::storage::{self, Meta};

/// Constructor inputs to the core (spec.md 6). `cache_size` and
/// `num_threads` may be `0` when the caller only intends to `read_table`.
#[derive(Clone, Debug)]
pub struct Config {
    pub table_dir: PathBuf,
    pub root: u64,
    pub static_tiles: u64,
    pub goal_tile: u8,
    pub cache_size: usize,
    pub num_threads: usize,
}

/// The cache-size default documented for the 10-square static
/// configuration the original ships with.
pub const DEFAULT_CACHE_SIZE: usize = 104_395_301;

impl Config {
    pub fn new(
        table_dir: impl Into<PathBuf>,
        root: u64,
        static_tiles: u64,
        goal_tile: u8,
        cache_size: usize,
        num_threads: usize,
    ) -> Result<Config> {
        if goal_tile > 15 {
            return Err(Error::BadInput(format!(
                "goal tile nibble {goal_tile} is out of range (max 15)"
            )));
        }
        Ok(Config {
            table_dir: table_dir.into(),
            root,
            static_tiles,
            goal_tile,
            cache_size,
            num_threads,
        })
    }
}

/// Validates that `value` is a power of two and returns its exponent, per
/// spec.md 9's resolved Open Question: reject non-power-of-two goals
/// outright rather than rounding `log2` like the original did.
pub fn goal_nibble_from_value(value: u64) -> Result<u8> {
    if value == 0 || !value.is_power_of_two() {
        return Err(Error::BadInput(format!(
            "goal tile {value} is not a power of two"
        )));
    }
    Ok(value.trailing_zeros() as u8)
}

pub fn write_meta(config: &Config) -> Result<()> {
    Meta {
        root: config.root,
        static_tiles: config.static_tiles,
        goal_tile: config.goal_tile,
    }
    .write(&config.table_dir)
}

pub fn read_meta(table_dir: &Path) -> Result<Meta> {
    Meta::read(table_dir)
}

pub struct TableGenerator {
    config: Config,
    static_config: StaticConfig,
}

impl TableGenerator {
    pub fn new(config: Config) -> Result<TableGenerator> {
        let static_config = StaticConfig::new(config.static_tiles);
        storage::ensure_dirs(&config.table_dir)?;
        lut::ensure_on_disk(&config.table_dir.join("lut.txt"))?;
        Ok(TableGenerator {
            config,
            static_config,
        })
    }

    /// Runs the full pipeline. When `positions_already_spilled` is `true`,
    /// the enumeration pass is skipped and the highest stratum already on
    /// disk under `positions/` is discovered and used as the evaluator's
    /// starting point.
    pub fn generate_table(&self, positions_already_spilled: bool) -> Result<()> {
        if self.config.num_threads == 0 {
            return Err(Error::BadInput(
                "num_threads must be > 0 to generate a table".to_string(),
            ));
        }
        if !positions_already_spilled && self.config.cache_size == 0 {
            return Err(Error::BadInput(
                "cache_size must be > 0 to generate a table".to_string(),
            ));
        }

        let root_board = Board(self.config.root);
        let original_sum = root_board.sum_of_tiles();
        let n = self.config.num_threads;

        let start_sum = if positions_already_spilled {
            orchestrator::discover_highest_stratum(original_sum, n)
        } else {
            original_sum
        };

        let mk_positions = || (0..n).map(|_| Arc::new(RwLock::new(Vec::new()))).collect::<Vec<_>>();
        let mk_probs = || {
            (0..n)
                .map(|_| Arc::new(RwLock::new(ProbsMap::default())))
                .collect::<Vec<_>>()
        };

        let current_positions = mk_positions();
        if !positions_already_spilled {
            current_positions[0].write().unwrap().push(self.config.root);
        }

        let state = State {
            tile_sum: start_sum,
            completed_threads: 0,
            error: None,
            current_positions,
            plus2_positions: mk_positions(),
            plus4_positions: mk_positions(),
            current_probs: mk_probs(),
            plus2_probs: mk_probs(),
            plus4_probs: mk_probs(),
        };

        let shared = Arc::new(Shared {
            config: self.static_config,
            goal_tile: self.config.goal_tile,
            num_threads: n,
            original_sum,
            table_dir: self.config.table_dir.clone(),
            cache: DedupCache::new(self.config.cache_size.max(1)),
            positions_generated: positions_already_spilled,
            flag_done: AtomicBool::new(false),
            state: Mutex::new(state),
            cv: Condvar::new(),
        });

        orchestrator::run(shared)
    }

    /// Opens the sum file for `board`'s tile sum and linear-scans it.
    pub fn read_table(&self, board: u64) -> Result<MoveProbs> {
        let board = Board(board);
        if !self.static_config.respects(board) {
            return Err(Error::BadInput(
                "board does not match this table's static tiles".to_string(),
            ));
        }
        let sum = board.sum_of_tiles();
        let packed = self.static_config.pack(board);
        storage::read_table(
            &self.config.table_dir,
            sum,
            self.static_config.packed_byte_len(),
            packed,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::Cwd;

    #[test]
    fn rejects_out_of_range_goal_nibble() {
        let err = Config::new("table", 0, 0, 16, 0, 0).unwrap_err();
        assert!(matches!(err, Error::BadInput(_)));
    }

    #[test]
    fn goal_nibble_rejects_non_power_of_two() {
        assert!(goal_nibble_from_value(3).is_err());
        assert_eq!(goal_nibble_from_value(2048).unwrap(), 11);
    }

    #[test]
    fn scenario_1_trivial_win_two_goal_tiles_already_present() {
        let _cwd = Cwd::enter();

        // two "2" tiles (nibble 1) adjacent: num_tiles(root, goal=1) >= 2
        let root = Board::from_human([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]])
            .unwrap()
            .0;
        let config = Config::new("table", root, 0, 1, 64, 2).unwrap();
        let generator = TableGenerator::new(config).unwrap();
        generator.generate_table(false).unwrap();

        let probs = generator.read_table(root).unwrap();
        assert_eq!(probs.probs, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn scenario_2_trivial_loss_game_over_root() {
        let _cwd = Cwd::enter();

        let root = Board::from_human([[4, 16, 8, 4], [8, 128, 32, 2], [2, 32, 16, 8], [4, 2, 4, 2]])
            .unwrap()
            .0;
        assert!(Board(root).game_over());

        let config = Config::new("table", root, 0, 11, 64, 1).unwrap();
        let generator = TableGenerator::new(config).unwrap();
        generator.generate_table(false).unwrap();

        let probs = generator.read_table(root).unwrap();
        assert_eq!(probs.probs, [0.0, 0.0, 0.0, 0.0]);
    }
}
