//! Barrier-based thread orchestration, spec.md 4.F. One mutex, one
//! condition variable, one shared `completed_threads` counter, and one
//! atomic single-shot flag coordinate N workers through the enumeration
//! and evaluation passes.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::thread;

use crate::board::StaticConfig;
use crate::dedup::DedupCache;
use crate::error::{Error, Result};
use crate::probs_map::ProbsMap;
use crate::storage;
use crate::{enumerator, evaluator};

/// Everything immutable for the lifetime of one `generate_table` run, plus
/// the mutex-guarded mutable coordination state.
pub(crate) struct Shared {
    pub(crate) config: StaticConfig,
    pub(crate) goal_tile: u8,
    pub(crate) num_threads: usize,
    pub(crate) original_sum: u64,
    pub(crate) table_dir: PathBuf,
    pub(crate) cache: DedupCache,
    /// `true` skips the enumeration pass entirely (spill files already
    /// exist on disk from a prior run).
    pub(crate) positions_generated: bool,
    pub(crate) flag_done: AtomicBool,
    pub(crate) state: Mutex<State>,
    pub(crate) cv: Condvar,
}

pub(crate) struct State {
    pub(crate) tile_sum: u64,
    pub(crate) completed_threads: usize,
    /// Set by whichever worker first hits a fatal error mid-stratum; every
    /// other worker observes it at the next barrier wake-up and also bails
    /// out, per spec.md 7's poisoned-barrier propagation policy.
    pub(crate) error: Option<String>,
    pub(crate) current_positions: Vec<Arc<RwLock<Vec<u64>>>>,
    pub(crate) plus2_positions: Vec<Arc<RwLock<Vec<u64>>>>,
    pub(crate) plus4_positions: Vec<Arc<RwLock<Vec<u64>>>>,
    pub(crate) current_probs: Vec<Arc<RwLock<ProbsMap>>>,
    pub(crate) plus2_probs: Vec<Arc<RwLock<ProbsMap>>>,
    pub(crate) plus4_probs: Vec<Arc<RwLock<ProbsMap>>>,
}

pub(crate) fn positions_empty(state: &State) -> bool {
    state
        .current_positions
        .iter()
        .all(|a| a.read().unwrap().is_empty())
}

/// Records a fatal error and wakes every waiter so the whole run shuts
/// down instead of deadlocking on a barrier nobody else will reach.
pub(crate) fn fail(shared: &Shared, message: String) -> Error {
    let mut state = shared.state.lock().unwrap();
    if state.error.is_none() {
        state.error = Some(message.clone());
    }
    shared.cv.notify_all();
    Error::WorkerPanicked(message)
}

/// The reusable per-stratum barrier: each worker arrives, increments the
/// counter, and either (last arrival) runs `on_last` while still holding
/// the mutex and wakes everyone, or waits until `wait_pred` is satisfied.
pub(crate) fn barrier<F>(shared: &Shared, on_last: F, wait_pred: impl Fn(&State, u64) -> bool) -> Result<()>
where
    F: FnOnce(&mut State) -> Result<()>,
{
    let mut state = shared.state.lock().unwrap();
    state.completed_threads += 1;
    let saved_sum = state.tile_sum;

    if state.completed_threads == shared.num_threads {
        log::debug!("last worker reached barrier at sum {saved_sum}, running on_last");
        state.completed_threads = 0;
        let outcome = on_last(&mut state);
        if let Err(e) = &outcome {
            state.error = Some(e.to_string());
        }
        shared.cv.notify_all();
        outcome
    } else {
        loop {
            state = shared.cv.wait(state).unwrap();
            if wait_pred(&state, saved_sum) {
                break;
            }
        }
        match &state.error {
            Some(msg) => Err(Error::WorkerPanicked(msg.clone())),
            None => Ok(()),
        }
    }
}

fn thread_loop(shared: &Shared, thread_id: usize) -> Result<()> {
    if !shared.positions_generated {
        enumerator::run(shared, thread_id)?;
    }
    evaluator::run(shared, thread_id)
}

pub(crate) fn run(shared: Arc<Shared>) -> Result<()> {
    let handles: Vec<_> = (0..shared.num_threads)
        .map(|thread_id| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || thread_loop(&shared, thread_id))
        })
        .collect();

    let mut first_err = None;
    for handle in handles {
        match handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                first_err.get_or_insert(e);
            }
            Err(_) => {
                first_err.get_or_insert(Error::WorkerPanicked("worker thread panicked".to_string()));
            }
        }
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Probes `positions/` for the highest stratum with shard files already on
/// disk. Used to resume a run constructed with `positions_already_spilled`
/// set, since that mode has no other way to learn where enumeration left
/// off.
pub(crate) fn discover_highest_stratum(original_sum: u64, num_threads: usize) -> u64 {
    let mut sum = original_sum;
    loop {
        let next = sum + 2;
        let exists = (0..num_threads).any(|t| storage::spill_path(next, t).exists());
        if !exists {
            return sum;
        }
        sum = next;
    }
}
