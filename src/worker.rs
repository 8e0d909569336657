use std::{num::NonZeroUsize, sync::Arc};

use log::debug;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Failed to start worker pool: {0}")]
    Runtime(std::io::Error),
    #[error("Worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs `task` over `items` on at most `jobs` threads and returns the results
/// in input order.
///
/// The first failing item fails the whole batch. Items that have not started
/// yet are dropped, items already running are left to finish.
pub fn run_bounded<I, T, E, F>(items: Vec<I>, jobs: NonZeroUsize, task: F) -> Result<Vec<T>, E>
where
    I: Send + 'static,
    T: Send + 'static,
    E: From<PoolError> + Send + 'static,
    F: Fn(I) -> Result<T, E> + Send + Sync + 'static,
{
    if jobs.get() == 1 || items.len() <= 1 {
        return items.into_iter().map(task).collect();
    }

    debug!("Running {} tasks on {} workers", items.len(), jobs);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .max_blocking_threads(jobs.get())
        .thread_name("vendor-verify-worker")
        .build()
        .map_err(PoolError::Runtime)?;

    let len = items.len();
    runtime.block_on(async move {
        let task = Arc::new(task);
        let mut tasks = JoinSet::new();
        for (position, item) in items.into_iter().enumerate() {
            let task = Arc::clone(&task);
            tasks.spawn_blocking(move || (position, task(item)));
        }

        let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            let (position, result) = joined.map_err(PoolError::from)?;
            slots[position] = Some(result?);
        }
        Ok::<Vec<T>, E>(slots.into_iter().flatten().collect())
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
        time::Duration,
    };

    use super::*;

    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Item(usize),
        Pool,
    }

    impl From<PoolError> for TestError {
        fn from(_: PoolError) -> Self {
            TestError::Pool
        }
    }

    #[test]
    fn results_keep_input_order() {
        let items: Vec<usize> = (0..16).collect();
        let results = run_bounded(items, NonZeroUsize::new(4).unwrap(), |n| {
            thread::sleep(Duration::from_millis((16 - n as u64) * 2));
            Ok::<_, TestError>(n * 10)
        })
        .unwrap();
        assert_eq!(results, (0..16).map(|n| n * 10).collect::<Vec<_>>());
    }

    #[test]
    fn concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let items: Vec<usize> = (0..12).collect();
        {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            run_bounded(items, NonZeroUsize::new(3).unwrap(), move |_| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(10));
                running.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, TestError>(())
            })
            .unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn first_failure_fails_the_batch() {
        let items: Vec<usize> = (0..8).collect();
        let result = run_bounded(items, NonZeroUsize::new(2).unwrap(), |n| {
            if n == 5 {
                Err(TestError::Item(n))
            } else {
                Ok(n)
            }
        });
        assert_eq!(result, Err(TestError::Item(5)));
    }

    #[test]
    fn single_job_runs_inline() {
        let result = run_bounded(vec![1, 2, 3], NonZeroUsize::MIN, |n| Ok::<_, TestError>(n + 1));
        assert_eq!(result, Ok(vec![2, 3, 4]));
    }
}
