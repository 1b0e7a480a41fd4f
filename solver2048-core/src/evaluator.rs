//! Reverse-pass probability evaluator, spec.md 4.E.
use std::mem;
use std::sync::{Arc, RwLock};

use crate::board::{Board, Direction, DIRECTIONS};
use crate::codec::{self, MoveProbs};
use crate::error::Result;
use crate::orchestrator::{self, Shared, State};
use crate::probs_map::ProbsMap;
use crate::sharding::bad_hash;
use crate::storage;

pub(crate) fn run(shared: &Shared, thread_id: usize) -> Result<()> {
    loop {
        let sum = {
            let state = shared.state.lock().unwrap();
            state.tile_sum
        };
        if sum < shared.original_sum {
            break;
        }

        let (plus2_all, plus4_all, current_out) = {
            let state = shared.state.lock().unwrap();
            (
                state.plus2_probs.clone(),
                state.plus4_probs.clone(),
                Arc::clone(&state.current_probs[thread_id]),
            )
        };

        if let Err(e) = evaluate_positions(shared, thread_id, sum, &plus2_all, &plus4_all, &current_out) {
            return Err(orchestrator::fail(shared, e.to_string()));
        }
        if let Err(e) = storage::delete_spill_shard(sum, thread_id) {
            return Err(orchestrator::fail(shared, e.to_string()));
        }

        orchestrator::barrier(
            shared,
            |state| {
                let written = write_table(shared, state)?;
                log::info!("sum {} table flushed ({written} records)", state.tile_sum);
                state.tile_sum -= 2;
                rotate_probs(state, shared.num_threads);
                Ok(())
            },
            |state, saved_sum| state.error.is_some() || saved_sum != state.tile_sum,
        )?;
    }

    Ok(())
}

fn evaluate_positions(
    shared: &Shared,
    thread_id: usize,
    sum: u64,
    plus2_all: &[Arc<RwLock<ProbsMap>>],
    plus4_all: &[Arc<RwLock<ProbsMap>>],
    current_out: &Arc<RwLock<ProbsMap>>,
) -> Result<()> {
    let reader = storage::SpillReader::open(sum, thread_id)?;
    let mut local = ProbsMap::default();

    for board_result in reader {
        let raw = board_result?;
        let board = Board(raw);

        let move_probs = if board.game_over() {
            MoveProbs::TERMINAL_LOSS
        } else if board.num_tiles(shared.goal_tile) >= 2 {
            MoveProbs::TERMINAL_WIN
        } else {
            let mut probs = [0.0f32; 4];
            for (i, &dir) in DIRECTIONS.iter().enumerate() {
                probs[i] = evaluate_direction(shared, board, dir, plus2_all, plus4_all);
            }
            MoveProbs::new(probs)
        };

        local.insert(raw, move_probs);
    }

    if !local.is_empty() {
        current_out.write().unwrap().extend(local);
    }
    Ok(())
}

fn evaluate_direction(
    shared: &Shared,
    board: Board,
    dir: Direction,
    plus2_all: &[Arc<RwLock<ProbsMap>>],
    plus4_all: &[Arc<RwLock<ProbsMap>>],
) -> f32 {
    let moved = board.make_move(dir);
    if moved == board {
        return 0.0;
    }
    if !shared.config.respects(moved) {
        return 0.0;
    }

    let empty = moved.empty_squares();
    let num_empty = f64::from(empty.count_ones());
    if num_empty == 0.0 {
        return 0.0;
    }

    let mut prob = 0.0f64;
    for bit in 0..16u32 {
        if (empty >> bit) & 1 == 0 {
            continue;
        }
        let y = (bit / 4) as usize;
        let x = 3 - (bit % 4) as usize;

        let spawn_two = moved.set_tile(x, y, 1);
        prob += 0.9 * f64::from(lookup_prob(plus2_all, shared.num_threads, spawn_two.0)) / num_empty;

        let spawn_four = moved.set_tile(x, y, 2);
        prob += 0.1 * f64::from(lookup_prob(plus4_all, shared.num_threads, spawn_four.0)) / num_empty;
    }

    prob as f32
}

/// Spill sharding scattered boards by `bad_hash`, so the board a caller
/// spawns isn't necessarily in the caller's own map; look it up the same
/// way it was written (spec.md 4.E, "Lookup distribution").
fn lookup_prob(maps: &[Arc<RwLock<ProbsMap>>], num_threads: usize, key: u64) -> f32 {
    let shard = bad_hash(key, num_threads);
    maps[shard]
        .read()
        .unwrap()
        .get(&key)
        .map(MoveProbs::best_prob)
        .unwrap_or(0.0)
}

fn write_table(shared: &Shared, state: &mut State) -> Result<usize> {
    let sum = state.tile_sum;
    let board_bytes = shared.config.packed_byte_len();
    let mut writer = storage::create_table_writer(&shared.table_dir, sum)?;

    let mut written = 0usize;
    for arc in &state.current_probs {
        let guard = arc.read().unwrap();
        for (&board_raw, move_probs) in guard.iter() {
            let packed_board = shared.config.pack(Board(board_raw));
            let packed_probs = codec::pack_probs(&move_probs.probs, sum);
            storage::write_table_record(&mut writer, packed_board, board_bytes, packed_probs)?;
            written += 1;
        }
    }
    Ok(written)
}

/// New current is fresh, new `S+2` is the old current's results, new
/// `S+4` is the old `S+2`'s results; the old `S+4` map is no longer
/// reachable from any future stratum and is dropped (spec.md 4.E).
fn rotate_probs(state: &mut State, num_threads: usize) {
    let old_current = mem::take(&mut state.current_probs);
    let old_plus2 = mem::take(&mut state.plus2_probs);

    state.plus4_probs = old_plus2;
    state.plus2_probs = old_current;
    state.current_probs = (0..num_threads)
        .map(|_| Arc::new(RwLock::new(ProbsMap::default())))
        .collect();
}
