//! Parallel iteration helpers.
//!
//! Everything here preserves input order in its output so callers can reduce
//! results in a fixed sequence regardless of how rayon schedules the work.

use rayon::prelude::*;

/// Maps `f` over `items` in parallel, with at most `max_concurrent` items in flight.
///
/// Semantically equivalent to `items.par_iter().map(f).collect()`, but processes
/// items in chunks of `max_concurrent` to bound peak memory.
///
/// # Panics
///
/// Panics if `max_concurrent` is 0.
pub fn par_map_limited<T, R, F>(items: &[T], max_concurrent: usize, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(usize, &T) -> R + Sync,
{
    assert!(max_concurrent > 0, "max_concurrent must be > 0");

    let mut results = Vec::with_capacity(items.len());
    for (chunk_idx, chunk) in items.chunks(max_concurrent).enumerate() {
        let base = chunk_idx * max_concurrent;
        let chunk_results: Vec<R> = chunk
            .par_iter()
            .enumerate()
            .map(|(i, item)| f(base + i, item))
            .collect();
        results.extend(chunk_results);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn par_map_limited_preserves_order() {
        let items: Vec<i32> = (0..100).collect();
        let result = par_map_limited(&items, 4, |_, &x| x * 2);
        let expected: Vec<i32> = (0..100).map(|x| x * 2).collect();
        assert_eq!(result, expected);
    }

    #[test]
    fn par_map_limited_passes_global_index() {
        let items = vec!['a'; 10];
        let result = par_map_limited(&items, 3, |i, _| i);
        assert_eq!(result, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn par_map_limited_empty() {
        let items: Vec<i32> = vec![];
        assert!(par_map_limited(&items, 3, |_, &x| x).is_empty());
    }

    #[test]
    #[should_panic(expected = "max_concurrent must be > 0")]
    fn par_map_limited_zero_concurrency_panics() {
        par_map_limited(&[1, 2, 3], 0, |_, &x| x);
    }
}
