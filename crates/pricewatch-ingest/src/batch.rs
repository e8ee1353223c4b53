//! Dedupe and chunking of discovered URLs.

use std::collections::HashSet;

/// URLs in `found` that the catalog does not know yet.
///
/// First-occurrence order is kept and repeats within `found` are dropped, so
/// a search that lists the same ad on two pages scrapes it once.
#[must_use]
pub fn new_urls(found: Vec<String>, known: &HashSet<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(found.len());
    found
        .into_iter()
        .filter(|url| !known.contains(url) && seen.insert(url.clone()))
        .collect()
}

/// Splits `items` into consecutive chunks of at most `size` (min 1), keeping
/// order. An empty input gives no chunks.
#[must_use]
pub fn chunk_urls<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(items.len().div_ceil(size));
    let mut current = Vec::with_capacity(size.min(items.len()));
    for item in items {
        current.push(item);
        if current.len() == size {
            chunks.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
