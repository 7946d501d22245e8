// Execution mode for indexer runs.
//
// Indexers split their work into independent jobs (one per column, voice
// pair, row or window) and hand them to `Execution::map_ordered`. Serial mode
// runs the jobs in order on the calling thread. Parallel mode runs them on a
// rayon pool, tags each job with its position, and reassembles results by
// position, so the output is identical to serial mode whatever order the
// workers finish in.
//
// Pools are built on first use and kept for the life of the process, one per
// worker count, so a chain of indexers sharing one `Execution` reuses the
// same threads.
//
// A pool that cannot start is a `WorkerPool` error. Jobs themselves cannot
// fail here; fallible jobs return `IndexResult` values and the caller
// collects them.

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::IndexResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Execution {
    #[default]
    Serial,
    /// `workers == 0` lets rayon pick the thread count.
    Parallel { workers: usize },
}

impl Execution {
    pub fn parallel(workers: usize) -> Self {
        Execution::Parallel { workers }
    }

    /// Run `f` over every job and return the results in job order.
    pub fn map_ordered<J, R, F>(&self, jobs: Vec<J>, f: F) -> IndexResult<Vec<R>>
    where
        J: Send,
        R: Send,
        F: Fn(J) -> R + Sync + Send,
    {
        match *self {
            Execution::Serial => Ok(jobs.into_iter().map(f).collect()),
            Execution::Parallel { workers } => {
                let pool = shared_pool(workers)?;
                let count = jobs.len();
                trace!(jobs = count, threads = pool.current_num_threads(), "dispatching jobs");
                let tagged: Vec<(usize, R)> = pool.install(|| {
                    jobs.into_par_iter()
                        .enumerate()
                        .map(|(position, job)| (position, f(job)))
                        .collect()
                });
                let mut slots: Vec<Option<R>> = (0..count).map(|_| None).collect();
                for (position, result) in tagged {
                    slots[position] = Some(result);
                }
                Ok(slots.into_iter().flatten().collect())
            }
        }
    }

    /// `map_ordered` for fallible jobs: the first error in job order wins.
    pub fn try_map_ordered<J, R, F>(&self, jobs: Vec<J>, f: F) -> IndexResult<Vec<R>>
    where
        J: Send,
        R: Send,
        F: Fn(J) -> IndexResult<R> + Sync + Send,
    {
        self.map_ordered(jobs, f)?.into_iter().collect()
    }
}

static POOLS: OnceLock<Mutex<FxHashMap<usize, Arc<ThreadPool>>>> = OnceLock::new();

/// The process-wide pool for `workers` threads, built on first request.
fn shared_pool(workers: usize) -> IndexResult<Arc<ThreadPool>> {
    let mut pools = POOLS
        .get_or_init(Default::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(pool) = pools.get(&workers) {
        return Ok(Arc::clone(pool));
    }
    let pool = Arc::new(ThreadPoolBuilder::new().num_threads(workers).build()?);
    debug!(workers, threads = pool.current_num_threads(), "worker pool started");
    pools.insert(workers, Arc::clone(&pool));
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IndexError;

    #[test]
    fn test_parallel_matches_serial_order() {
        let jobs: Vec<u64> = (0..200).collect();
        let work = |n: u64| {
            // Uneven job cost so workers finish out of order.
            (0..(n % 7) * 1000).fold(n, |acc, k| acc.wrapping_add(k % 3))
        };
        let serial = Execution::Serial.map_ordered(jobs.clone(), work).unwrap();
        let parallel = Execution::parallel(4).map_ordered(jobs, work).unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_pool_is_reused_across_calls() {
        let first = shared_pool(3).unwrap();
        Execution::parallel(3).map_ordered(vec![1, 2, 3], |n: i32| n * 2).unwrap();
        let second = shared_pool(3).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.current_num_threads(), 3);
        assert!(!Arc::ptr_eq(&first, &shared_pool(2).unwrap()));
    }

    #[test]
    fn test_try_map_reports_first_error() {
        let result = Execution::parallel(2).try_map_ordered((0..10).collect(), |n: usize| {
            if n >= 3 {
                Err(IndexError::precondition("test", format!("job {n}")))
            } else {
                Ok(n)
            }
        });
        match result {
            Err(IndexError::Precondition { detail, .. }) => assert_eq!(detail, "job 3"),
            other => panic!("expected precondition error, got {other:?}"),
        }
    }

    #[test]
    fn test_execution_from_json() {
        let exec: Execution =
            serde_json::from_str(r#"{"mode": "parallel", "workers": 3}"#).unwrap();
        assert_eq!(exec, Execution::parallel(3));
        let exec: Execution = serde_json::from_str(r#"{"mode": "serial"}"#).unwrap();
        assert_eq!(exec, Execution::Serial);
    }
}
