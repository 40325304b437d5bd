//! Vector similarity utilities.
//!
//! Pure-Rust implementations of:
//! - Cosine similarity
//! - Nearest-neighbour ranking over stored records

use std::cmp::Ordering;
use threadkeeper_core::memory::{MemoryRecord, ScoredRecord};

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1] where 1 = identical, 0 = orthogonal, -1 = opposite.
/// Returns 0.0 if either vector is zero-length, empty, or all zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// Rank records by cosine similarity to a query vector.
///
/// Sorted by descending score; equal scores put the newest record
/// (highest sequence) first. A zero query vector scores everything 0.0, so
/// the result degrades to recency order. Matches at or below `min_score`
/// are dropped when a threshold is given.
pub fn rank_records(
    records: &[MemoryRecord],
    query: &[f32],
    top_k: usize,
    min_score: Option<f32>,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .iter()
        .map(|record| ScoredRecord {
            id: record.id.clone(),
            score: cosine_similarity(&record.embedding, query),
            metadata: record.metadata.clone(),
        })
        .filter(|s| min_score.is_none_or(|min| s.score > min))
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.metadata.sequence.cmp(&a.metadata.sequence))
    });
    scored.truncate(top_k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use threadkeeper_core::memory::NewMemory;
    use threadkeeper_core::message::Role;

    fn record(id: &str, embedding: Vec<f32>, sequence: u64) -> MemoryRecord {
        NewMemory::new(Role::User, format!("Content for {id}")).into_record(id.into(), embedding, sequence)
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim - (-1.0)).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_known_value() {
        // [1,1] · [1,0] = 1, |[1,1]| = sqrt(2), |[1,0]| = 1
        let sim = cosine_similarity(&[1.0, 1.0], &[1.0, 0.0]);
        assert!((sim - 0.7071).abs() < 0.001);
    }

    #[test]
    fn rank_orders_by_similarity() {
        let records = vec![
            record("a", vec![0.0, 1.0, 0.0], 1), // orthogonal = 0
            record("b", vec![1.0, 0.0, 0.0], 2), // identical = 1
            record("c", vec![0.5, 0.5, 0.0], 3), // partial = ~0.707
        ];

        let results = rank_records(&records, &[1.0, 0.0, 0.0], 10, None);
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn rank_threshold_is_strict() {
        let records = vec![
            record("partial", vec![1.0, 1.0], 1), // sim ~0.707
            record("same", vec![1.0, 0.0], 2),    // sim = 1.0
            record("none", vec![0.0, 1.0], 3),    // sim = 0.0
        ];

        let results = rank_records(&records, &[1.0, 0.0], 10, Some(0.0));
        assert!(results.iter().all(|r| r.score > 0.0));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn zero_query_returns_newest_first() {
        let records = vec![
            record("old", vec![1.0, 0.0], 1),
            record("newest", vec![0.0, 1.0], 3),
            record("mid", vec![1.0, 1.0], 2),
        ];

        let results = rank_records(&records, &[0.0, 0.0], 2, None);
        let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "mid"]);
    }

    #[test]
    fn rank_respects_top_k() {
        let records: Vec<_> = (0..10)
            .map(|i| record(&format!("e{i}"), vec![1.0, i as f32 * 0.1], i))
            .collect();
        assert_eq!(rank_records(&records, &[1.0, 0.0], 3, None).len(), 3);
    }
}
