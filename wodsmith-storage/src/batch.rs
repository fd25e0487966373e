//! Chunked batch lookups for parameter-bounded stores.
//!
//! Relational backends cap the number of bound parameters per statement
//! (100 on the edge SQLite deployment). Lookups over an arbitrary id list are
//! split into chunks that fit under the cap, run one after another, and
//! concatenated.

use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use wodsmith_core::{ConfigError, WodsmithResult, DEFAULT_MAX_QUERY_PARAMS};

/// Default parameter bound per statement.
pub const SQL_BATCH_SIZE: usize = DEFAULT_MAX_QUERY_PARAMS;

/// Split `items` into consecutive chunks of at most `size` elements.
///
/// A `size` of zero is treated as one.
pub fn chunk<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(|c| c.to_vec()).collect()
}

/// Remove duplicate ids, keeping the first occurrence of each.
pub fn dedup_ids<T: Copy + Eq + Hash>(ids: &[T]) -> Vec<T> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Run `query` over `items` in chunks sized so that each call binds at most
/// `limit` parameters, `other_params` of which are taken by the rest of the
/// statement. Results are concatenated in chunk order.
///
/// Empty input never calls `query`.
pub async fn autochunk<T, R, F, Fut>(
    items: &[T],
    other_params: usize,
    limit: usize,
    mut query: F,
) -> WodsmithResult<Vec<R>>
where
    T: Clone,
    F: FnMut(Vec<T>) -> Fut,
    Fut: Future<Output = WodsmithResult<Vec<R>>>,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }
    if other_params >= limit {
        return Err(ConfigError::IncompatibleOptions {
            option_a: format!("other_params={}", other_params),
            option_b: format!("limit={}", limit),
        }
        .into());
    }

    let size = limit - other_params;
    let mut results = Vec::new();
    for batch in chunk(items, size) {
        results.extend(query(batch).await?);
    }
    Ok(results)
}
