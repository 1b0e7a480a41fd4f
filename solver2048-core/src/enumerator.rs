//! Stratified BFS position enumerator, spec.md 4.D.
use std::mem;
use std::sync::{Arc, RwLock};

use crate::board::{Board, StaticConfig, Direction, DIRECTIONS};
use crate::dedup::DedupCache;
use crate::error::Result;
use crate::orchestrator::{self, Shared, State};
use crate::sharding::bad_hash;
use crate::storage;

pub(crate) fn run(shared: &Shared, thread_id: usize) -> Result<()> {
    loop {
        let (current, plus2_out, plus4_out) = {
            let state = shared.state.lock().unwrap();
            if orchestrator::positions_empty(&state) {
                break;
            }
            (
                state.current_positions.clone(),
                Arc::clone(&state.plus2_positions[thread_id]),
                Arc::clone(&state.plus4_positions[thread_id]),
            )
        };

        if let Err(e) = get_positions(shared, &current, thread_id, &plus2_out, &plus4_out) {
            return Err(orchestrator::fail(shared, e.to_string()));
        }

        orchestrator::barrier(
            shared,
            |state| {
                shared.cache.clear();
                spill_shuffle(shared, state)?;
                log::debug!("sum {} shards spilled to positions/", state.tile_sum);
                state.tile_sum += 2;
                log::info!("enumeration advanced to sum {}", state.tile_sum);
                rotate_positions(state);
                Ok(())
            },
            |state, saved_sum| {
                state.error.is_some() || saved_sum != state.tile_sum || orchestrator::positions_empty(state)
            },
        )?;
    }

    if !shared.flag_done.swap(true, std::sync::atomic::Ordering::SeqCst) {
        let mut state = shared.state.lock().unwrap();
        state.tile_sum -= 2;
        state.completed_threads = 0;
        let n = shared.num_threads;
        state.current_positions = (0..n).map(|_| Arc::new(RwLock::new(Vec::new()))).collect();
        state.plus2_positions = (0..n).map(|_| Arc::new(RwLock::new(Vec::new()))).collect();
        state.plus4_positions = (0..n).map(|_| Arc::new(RwLock::new(Vec::new()))).collect();
    }

    Ok(())
}

/// `(size, offset)` of this worker's contiguous slice within the flattened
/// stratum: the first `total mod n` workers take `ceil(total/n)`, the rest
/// take `floor(total/n)`.
fn partition_bounds(thread_id: usize, total: usize, n: usize) -> (usize, usize) {
    let rem = total % n;
    if thread_id < rem {
        let size = total / n + 1;
        (size, size * thread_id)
    } else {
        let size = total / n;
        let before = (total / n + 1) * rem + size * (thread_id - rem);
        (size, before)
    }
}

fn get_positions(
    shared: &Shared,
    current: &[Arc<RwLock<Vec<u64>>>],
    thread_id: usize,
    plus2_out: &Arc<RwLock<Vec<u64>>>,
    plus4_out: &Arc<RwLock<Vec<u64>>>,
) -> Result<()> {
    let guards: Vec<_> = current.iter().map(|a| a.read().unwrap()).collect();
    let total: usize = guards.iter().map(|g| g.len()).sum();
    if total == 0 {
        return Ok(());
    }

    let (partition_size, before_size) = partition_bounds(thread_id, total, shared.num_threads);

    let mut local2 = Vec::new();
    let mut local4 = Vec::new();

    let mut taken = 0usize;
    let mut global_offset = 0usize;
    for guard in &guards {
        if taken >= partition_size {
            break;
        }
        let len = guard.len();
        let seg_end = global_offset + len;
        if seg_end <= before_size {
            global_offset = seg_end;
            continue;
        }
        let local_start = before_size.saturating_sub(global_offset);
        let want = partition_size - taken;
        let available = len - local_start;
        let take = want.min(available);

        for &raw in &guard[local_start..local_start + take] {
            let board = Board(raw);
            if board.game_over() || board.num_tiles(shared.goal_tile) >= 2 {
                continue;
            }
            for &dir in DIRECTIONS.iter() {
                test_direction(board, dir, &shared.config, &shared.cache, &mut local2, &mut local4);
            }
        }

        taken += take;
        global_offset = seg_end;
    }
    drop(guards);

    if !local2.is_empty() {
        plus2_out.write().unwrap().extend(local2);
    }
    if !local4.is_empty() {
        plus4_out.write().unwrap().extend(local4);
    }
    Ok(())
}

fn test_direction(
    board: Board,
    dir: Direction,
    config: &StaticConfig,
    cache: &DedupCache,
    out2: &mut Vec<u64>,
    out4: &mut Vec<u64>,
) {
    let moved = board.make_move(dir);
    if moved == board {
        return;
    }
    if !config.respects(moved) {
        return;
    }

    let empty = moved.empty_squares();
    // Iterating bit-by-bit is simpler than a trailing-zero-count walk and
    // just as correct; this only ever runs over a 16-bit mask.
    for bit in 0..16u32 {
        if (empty >> bit) & 1 == 0 {
            continue;
        }
        let y = (bit / 4) as usize;
        let x = 3 - (bit % 4) as usize;

        let spawn_two = moved.set_tile(x, y, 1);
        if !cache.test(spawn_two.0) {
            out2.push(spawn_two.0);
        }
        let spawn_four = moved.set_tile(x, y, 2);
        if !cache.test(spawn_four.0) {
            out4.push(spawn_four.0);
        }
    }
}

fn spill_shuffle(shared: &Shared, state: &mut State) -> Result<()> {
    let mut shards = storage::create_spill_shards(state.tile_sum, shared.num_threads)?;
    for arc in &state.current_positions {
        let guard = arc.read().unwrap();
        for &board in guard.iter() {
            let shard = bad_hash(board, shared.num_threads);
            storage::write_board(&mut shards[shard], board)?;
        }
    }
    Ok(())
}

/// `S+2` becomes current, `S+4` becomes `S+2`, and the old current buffer
/// is cleared and reused as the new, empty `S+4` (spec.md 4.D).
fn rotate_positions(state: &mut State) {
    let old_current = mem::take(&mut state.current_positions);
    let old_plus2 = mem::take(&mut state.plus2_positions);
    let old_plus4 = mem::take(&mut state.plus4_positions);

    for arc in &old_current {
        arc.write().unwrap().clear();
    }

    state.current_positions = old_plus2;
    state.plus2_positions = old_plus4;
    state.plus4_positions = old_current;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_matches_hand_worked_example() {
        // 10 items over 3 workers: sizes 4,3,3; offsets 0,4,7
        assert_eq!(partition_bounds(0, 10, 3), (4, 0));
        assert_eq!(partition_bounds(1, 10, 3), (3, 4));
        assert_eq!(partition_bounds(2, 10, 3), (3, 7));
    }

    #[test]
    fn partition_covers_every_item_exactly_once() {
        for total in [0usize, 1, 2, 5, 16, 17, 100] {
            for n in 1..=5usize {
                let mut covered = 0usize;
                for t in 0..n {
                    let (size, offset) = partition_bounds(t, total, n);
                    assert_eq!(offset, covered);
                    covered += size;
                }
                assert_eq!(covered, total);
            }
        }
    }
}
