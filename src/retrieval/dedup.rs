//! Cross-source merge and fingerprint deduplication

use crate::retrieval::Passage;
use ahash::AHashSet;

/// Merge local and external passages: local first, then external, duplicates
/// collapsed by content fingerprint, truncated to `k`.
///
/// Local entries win ties because they are inserted first and the first
/// occurrence of a fingerprint is kept.
pub fn merge_deduplicated(
    local: Vec<Passage>,
    external: Vec<Passage>,
    k: usize,
) -> Vec<Passage> {
    let mut seen: AHashSet<[u8; 32]> = AHashSet::new();
    let mut merged = Vec::with_capacity(k);

    for passage in local.into_iter().chain(external) {
        if merged.len() == k {
            break;
        }
        if seen.insert(passage.fingerprint()) {
            merged.push(passage);
        }
    }

    merged
}
