use std::ops::Range;

/// Half-open index range of shard `shard` when `len` items are split across
/// `worker_count` workers in contiguous blocks of `ceil(len / worker_count)`.
pub fn shard_bounds(len: usize, worker_count: usize, shard: usize) -> Range<usize> {
    if worker_count == 0 {
        return 0..0;
    }
    let size = len.div_ceil(worker_count);
    let start = shard.saturating_mul(size).min(len);
    let end = shard.saturating_add(1).saturating_mul(size).min(len);
    start..end
}

/// Splits `items` into exactly `worker_count` contiguous shards.
///
/// Shard `i` holds `items[shard_bounds(len, worker_count, i)]`. Trailing shards
/// may be empty when there are fewer items than workers. The split only looks
/// at counts, so the same input and worker count always yield the same shards.
///
/// # Example
/// ```
/// use grid_sentiment::partition;
/// let shards = partition(vec![1, 2, 3], 5);
/// assert_eq!(shards, vec![vec![1], vec![2], vec![3], vec![], vec![]]);
/// ```
pub fn partition<T>(items: Vec<T>, worker_count: usize) -> Vec<Vec<T>> {
    let len = items.len();
    let mut items = items.into_iter();
    (0..worker_count)
        .map(|shard| {
            let take = shard_bounds(len, worker_count, shard).len();
            items.by_ref().take(take).collect()
        })
        .collect()
}
