//! Bounded per-symbol worker pool.
//!
//! One task per symbol on a private Rayon pool, so the worker count stays
//! fixed no matter how many symbols are queued. Results come back in input
//! order, which keeps every pipeline's output identical to a sequential run.

use crate::error::RunError;
use rayon::prelude::*;

pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, RunError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|i| format!("v20lab-worker-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Apply `task` to every item on the pool; output order matches `items`.
    pub fn map<T, R, F>(&self, items: &[T], task: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(task).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[test]
    fn results_keep_input_order() {
        let pool = WorkerPool::new(3).unwrap();
        let items: Vec<u64> = (0..200).collect();
        let out = pool.map(&items, |x| x * 2);
        assert_eq!(out, items.iter().map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_worker_count() {
        let pool = WorkerPool::new(2).unwrap();
        assert_eq!(pool.workers(), 2);

        let names = Mutex::new(HashSet::new());
        let items: Vec<u32> = (0..64).collect();
        pool.map(&items, |_| {
            let name = std::thread::current().name().unwrap_or_default().to_string();
            names.lock().unwrap().insert(name);
        });
        let names = names.into_inner().unwrap();
        assert!(names.len() <= 2);
        assert!(names.iter().all(|n| n.starts_with("v20lab-worker-")));
    }

    #[test]
    fn zero_workers_clamps_to_one() {
        assert_eq!(WorkerPool::new(0).unwrap().workers(), 1);
    }
}
