//! Fan-out of per-agent work over a fixed number of workers.
//!
//! Items are split into contiguous chunks of `ceil(len / workers)`, one
//! scoped thread per chunk. Each chunk folds into its own accumulator and
//! the accumulators come back in chunk order, so merging them yields the
//! same sequence as a single sequential pass.

use std::panic;
use std::thread;

use crate::config::ConfigError;
use crate::error::EngineError;

/// Run `work` over every item, folding into one accumulator per chunk.
///
/// `work` receives the item's index in `items`, the item, and the chunk's
/// accumulator. With one worker (or at most one item) everything runs on
/// the calling thread. The first error in chunk order is returned; a
/// panicking worker is resumed on the caller.
pub(crate) fn fan_out<T, R, I, F>(
    workers: usize,
    items: &mut [T],
    init: I,
    work: F,
) -> Result<Vec<R>, EngineError>
where
    T: Send,
    R: Send,
    I: Fn() -> R + Sync,
    F: Fn(usize, &mut T, &mut R) -> Result<(), EngineError> + Sync,
{
    if workers <= 1 || items.len() <= 1 {
        let mut acc = init();
        for (index, item) in items.iter_mut().enumerate() {
            work(index, item, &mut acc)?;
        }
        return Ok(vec![acc]);
    }

    let chunk_len = items.len().div_ceil(workers);
    thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for (chunk, slice) in items.chunks_mut(chunk_len).enumerate() {
            let init = &init;
            let work = &work;
            let handle = thread::Builder::new()
                .name(format!("strata-worker-{chunk}"))
                .spawn_scoped(scope, move || {
                    let mut acc = init();
                    for (offset, item) in slice.iter_mut().enumerate() {
                        work(chunk * chunk_len + offset, item, &mut acc)?;
                    }
                    Ok(acc)
                })
                .map_err(|e| ConfigError::ThreadSpawnFailed {
                    reason: format!("worker {chunk}: {e}"),
                });
            handles.push(handle);
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for handle in handles {
            let outcome = match handle {
                Ok(handle) => match handle.join() {
                    Ok(outcome) => outcome,
                    Err(payload) => panic::resume_unwind(payload),
                },
                Err(e) => Err(EngineError::from(e)),
            };
            match outcome {
                Ok(acc) => results.push(acc),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::SimError;

    fn collect(workers: usize, len: usize) -> Vec<usize> {
        let mut items: Vec<usize> = (0..len).collect();
        let chunks = fan_out(workers, &mut items, Vec::new, |index, item, acc: &mut Vec<usize>| {
            *item *= 10;
            acc.push(index);
            Ok(())
        })
        .unwrap();
        assert_eq!(items, (0..len).map(|i| i * 10).collect::<Vec<_>>());
        chunks.into_iter().flatten().collect()
    }

    #[test]
    fn order_is_independent_of_worker_count() {
        let expected: Vec<usize> = (0..23).collect();
        for workers in [1, 2, 3, 8, 64] {
            assert_eq!(collect(workers, 23), expected, "workers = {workers}");
        }
    }

    #[test]
    fn empty_input_yields_one_empty_chunk() {
        assert!(collect(4, 0).is_empty());
    }

    #[test]
    fn first_error_in_chunk_order_wins() {
        let mut items: Vec<usize> = (0..8).collect();
        let err = fan_out(4, &mut items, || (), |index, _, _| {
            if index == 3 || index == 6 {
                Err(SimError::invalid(format!("item {index}")).into())
            } else {
                Ok(())
            }
        })
        .unwrap_err();
        assert!(err.to_string().contains("item 3"));
    }
}
