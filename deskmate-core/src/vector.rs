//! Cosine similarity ranking over precomputed record embeddings.

use crate::models::{KnowledgeRecord, QueryResult};

/// `dot(a, b) / (|a| * |b|)`. Returns 0 for mismatched lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// True when the corpus is non-empty and every active record has an embedding.
pub fn fully_embedded(records: &[KnowledgeRecord]) -> bool {
    let mut active = records.iter().filter(|r| r.is_active).peekable();
    active.peek().is_some() && active.all(|r| r.embedding.is_some())
}

/// Rank active, embedded records by cosine similarity to `query_embedding`.
pub fn rank_by_embedding(
    query_embedding: &[f32],
    records: &[KnowledgeRecord],
    limit: usize,
) -> Vec<QueryResult> {
    let mut scored: Vec<QueryResult> = records
        .iter()
        .filter(|r| r.is_active)
        .filter_map(|r| {
            let embedding = r.embedding.as_deref()?;
            Some(QueryResult::from_record(
                r,
                cosine_similarity(query_embedding, embedding),
            ))
        })
        .collect();

    scored.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn embedded(title: &str, v: Vec<f32>) -> KnowledgeRecord {
        let mut r = KnowledgeRecord::new(Uuid::nil(), title, "body");
        r.embedding = Some(v);
        r
    }

    #[test]
    fn test_cosine_of_vector_with_itself_is_one() {
        let vectors: Vec<Vec<f32>> = vec![
            vec![1.0, 0.0, 0.0],
            vec![0.3, -2.5, 7.1, 0.001],
            (0..768).map(|i| (i as f32) / 768.0 + 0.01).collect(),
            vec![-1.0; 16],
        ];
        for v in vectors {
            assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_rank_by_embedding_orders_and_limits() {
        let records = vec![
            embedded("far", vec![0.0, 1.0]),
            embedded("near", vec![1.0, 0.1]),
            embedded("middle", vec![1.0, 1.0]),
        ];
        let ranked = rank_by_embedding(&[1.0, 0.0], &records, 2);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].title, "near");
        assert_eq!(ranked[1].title, "middle");
        assert!(ranked.iter().all(|r| !r.is_pattern_match));
    }

    #[test]
    fn test_fully_embedded() {
        assert!(!fully_embedded(&[]));
        let mut plain = KnowledgeRecord::new(Uuid::nil(), "t", "b");
        assert!(!fully_embedded(&[embedded("a", vec![1.0]), plain.clone()]));
        plain.is_active = false;
        assert!(fully_embedded(&[embedded("a", vec![1.0]), plain]));
    }
}
