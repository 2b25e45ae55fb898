//! Scoped worker pool for independent per-lease jobs.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

/// Number of workers for `jobs` items given an optional cap.
pub(crate) fn worker_count(jobs: usize, max_workers: Option<usize>) -> usize {
    let available = thread::available_parallelism().map_or(1, |n| n.get());
    let cap = max_workers.unwrap_or(available).min(available);
    cap.min(jobs).max(1)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run `job` over every item on up to `workers` threads.
///
/// Workers claim indices from a shared cursor. Results come back in input
/// order; a job that panics yields `Err` with the panic message and does not
/// disturb its siblings.
pub(crate) fn run_indexed<T, R, F>(items: &[T], workers: usize, job: F) -> Vec<Result<R, String>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let run_one = |item: &T| {
        panic::catch_unwind(AssertUnwindSafe(|| job(item))).map_err(|p| panic_message(&*p))
    };

    if workers <= 1 || items.len() <= 1 {
        return items.iter().map(run_one).collect();
    }

    let cursor = AtomicUsize::new(0);
    let slots: Mutex<Vec<Option<Result<R, String>>>> =
        Mutex::new((0..items.len()).map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let index = cursor.fetch_add(1, Ordering::Relaxed);
                let Some(item) = items.get(index) else {
                    break;
                };
                let outcome = run_one(item);
                if let Ok(mut slots) = slots.lock() {
                    slots[index] = Some(outcome);
                }
            });
        }
    });

    slots
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err("worker did not report a result".to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_keep_input_order() {
        let items: Vec<u64> = (0..50).collect();
        let results = run_indexed(&items, 4, |n| n * n);
        let squares: Vec<u64> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(squares, items.iter().map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn test_panic_is_isolated_to_its_job() {
        let items = vec![1, 2, 3, 4];
        let results = run_indexed(&items, 2, |&n| {
            if n == 3 {
                panic!("bad lease {n}");
            }
            n
        });
        assert_eq!(results[0], Ok(1));
        assert_eq!(results[1], Ok(2));
        assert_eq!(results[2], Err("bad lease 3".to_string()));
        assert_eq!(results[3], Ok(4));
    }

    #[test]
    fn test_worker_count_bounds() {
        assert_eq!(worker_count(0, None), 1);
        assert_eq!(worker_count(10, Some(1)), 1);
        assert!(worker_count(3, Some(64)) <= 3);
    }
}
