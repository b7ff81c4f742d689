//! Keyword ranking over automation patterns and knowledge records.
//!
//! Candidates carry raw scores until [`rank`] has sorted and truncated them,
//! so the title weight and pattern boost still order results when the
//! reported score is clamped. Patterns are appended first, and with a stable
//! sort they win ties against records with the same raw score.

use crate::config::RetrievalConfig;
use crate::models::{AutomationPattern, KnowledgeRecord, QueryResult};
use crate::text::keyword_score;

/// Best keyword score of `query` against a pattern's example questions and answer.
pub fn pattern_score(query: &str, pattern: &AutomationPattern) -> f64 {
    pattern
        .example_questions
        .iter()
        .map(|q| keyword_score(query, q))
        .chain(std::iter::once(keyword_score(query, &pattern.raw_answer)))
        .fold(0.0, f64::max)
}

/// Pattern candidates whose best score exceeds `pattern_min_score`, boosted. Scores are raw.
pub fn score_patterns(
    query: &str,
    patterns: &[AutomationPattern],
    config: &RetrievalConfig,
) -> Vec<QueryResult> {
    patterns
        .iter()
        .filter_map(|pattern| {
            let best = pattern_score(query, pattern);
            (best > config.pattern_min_score)
                .then(|| QueryResult::from_pattern(pattern, best + config.pattern_boost))
        })
        .collect()
}

/// Score of a record: `max(title × title_weight, body)`.
pub fn record_score(query: &str, record: &KnowledgeRecord, config: &RetrievalConfig) -> f64 {
    let title = keyword_score(query, &record.title) * config.title_weight;
    let body = keyword_score(query, &record.body);
    title.max(body)
}

/// Active records scoring above `record_min_score`. Scores are raw.
pub fn score_records(
    query: &str,
    records: &[KnowledgeRecord],
    config: &RetrievalConfig,
) -> Vec<QueryResult> {
    records
        .iter()
        .filter(|r| r.is_active)
        .filter_map(|record| {
            let score = record_score(query, record, config);
            (score > config.record_min_score).then(|| QueryResult::from_record(record, score))
        })
        .collect()
}

/// Stable sort by raw score descending, truncate, then clamp the reported
/// scores into [0, 1] when `clamp_scores` is set.
pub fn rank(
    mut candidates: Vec<QueryResult>,
    limit: usize,
    config: &RetrievalConfig,
) -> Vec<QueryResult> {
    candidates.sort_by(|a, b| b.similarity_score.total_cmp(&a.similarity_score));
    candidates.truncate(limit);
    if config.clamp_scores {
        for c in &mut candidates {
            c.similarity_score = c.similarity_score.clamp(0.0, 1.0);
        }
    }
    candidates
}

/// Score patterns and records against `query` and return the top `limit`.
pub fn search_knowledge(
    query: &str,
    records: &[KnowledgeRecord],
    patterns: &[AutomationPattern],
    limit: usize,
    config: &RetrievalConfig,
) -> Vec<QueryResult> {
    let mut candidates = score_patterns(query, patterns, config);
    candidates.extend(score_records(query, records, config));
    rank(candidates, limit, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn record(title: &str, body: &str) -> KnowledgeRecord {
        KnowledgeRecord::new(Uuid::nil(), title, body)
    }

    fn pattern(questions: &[&str], answer: &str) -> AutomationPattern {
        AutomationPattern::new(
            Uuid::nil(),
            "Dana",
            questions.iter().map(|q| q.to_string()).collect(),
            answer,
        )
    }

    #[test]
    fn test_title_weight_applies() {
        let config = RetrievalConfig::default();
        let r = record("Store opening hours", "Sunday to Thursday");
        // "opening", "hours" both in title -> 1.0 * 1.5
        let score = record_score("opening hours", &r, &config);
        assert!((score - 1.5).abs() < 1e-9);
        let results = search_knowledge("opening hours", &[r], &[], 5, &config);
        assert_eq!(results[0].similarity_score, 1.0, "clamped into [0, 1]");
    }

    #[test]
    fn test_record_threshold_excludes_weak_matches() {
        let config = RetrievalConfig::default();
        // one of five words in body only: 0.2, not above 0.2
        let r = record("Uniforms", "Wear the blue apron");
        let results = score_records("when should staff wear aprons", &[r], &config);
        assert!(results.is_empty());
    }

    #[test]
    fn test_inactive_records_are_skipped() {
        let config = RetrievalConfig::default();
        let mut r = record("Returns policy", "30 days");
        r.is_active = false;
        assert!(score_records("returns policy", &[r], &config).is_empty());
    }

    #[test]
    fn test_pattern_threshold_and_boost() {
        let config = RetrievalConfig::default();
        let p = pattern(&["can I swap a shift with a colleague"], "Yes, tell your manager a day ahead.");
        let hits = score_patterns("swap shift", &[p.clone()], &config);
        assert_eq!(hits.len(), 1);
        assert!(hits[0].is_pattern_match);
        assert!((hits[0].similarity_score - 1.2).abs() < 1e-9);

        // 1 of 4 words = 0.25, below 0.3
        assert!(score_patterns("swap parking lot badge", &[p], &config).is_empty());
    }

    #[test]
    fn test_pattern_scores_against_answer_text() {
        let config = RetrievalConfig::default();
        let p = pattern(&["unrelated"], "Deliveries arrive on Tuesdays");
        let hits = score_patterns("deliveries tuesdays", &[p], &config);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_unclamped_boost_can_exceed_one() {
        let config = RetrievalConfig {
            clamp_scores: false,
            ..RetrievalConfig::default()
        };
        let p = pattern(&["swap shift"], "ok");
        let results = search_knowledge("swap shift", &[], &[p], 5, &config);
        assert!((results[0].similarity_score - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_rank_sorted_and_truncated() {
        let config = RetrievalConfig::default();
        let records: Vec<KnowledgeRecord> = vec![
            record("Parking", "Staff parking behind the store"),
            record("Staff parking permits", "Ask HR for a permit"),
            record("Lockers", "Staff lockers are in the back room"),
            record("Breaks", "Staff breaks are 30 minutes"),
        ];
        let results = search_knowledge("staff parking permit", &records, &[], 2, &config);
        assert!(results.len() <= 2);
        for pair in results.windows(2) {
            assert!(pair[0].similarity_score >= pair[1].similarity_score);
        }
        assert_eq!(results[0].title, "Staff parking permits");
    }

    #[test]
    fn test_pattern_wins_tie_with_record() {
        let mut a = QueryResult::from_record(&record("r", "r"), 0.5);
        a.title = "record".into();
        let p = QueryResult::from_pattern(&pattern(&["q"], "a"), 0.5);
        let ranked = rank(vec![p, a], 5, &RetrievalConfig::default());
        assert!(ranked[0].is_pattern_match);
        assert!(!ranked[1].is_pattern_match);
    }

    #[test]
    fn test_title_match_outranks_body_match_after_clamping() {
        let config = RetrievalConfig::default();
        // body-only hit scores 1.0, title hit scores 1.5; both report 1.0
        let records = vec![
            record("Misc", "Staff parking permit requests go to HR"),
            record("Staff parking permit", "Ask HR"),
        ];
        let results = search_knowledge("staff parking permit", &records, &[], 5, &config);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Staff parking permit");
        assert_eq!(results[1].title, "Misc");
        assert_eq!(results[0].similarity_score, 1.0);
        assert_eq!(results[1].similarity_score, 1.0);
    }

    #[test]
    fn test_truncation_keeps_strongest_raw_scores() {
        let config = RetrievalConfig::default();
        let records = vec![
            record("Misc", "Staff parking permit requests go to HR"),
            record("Staff parking permit", "Ask HR"),
        ];
        let results = search_knowledge("staff parking permit", &records, &[], 1, &config);
        assert_eq!(results[0].title, "Staff parking permit");
    }

    #[test]
    fn test_search_knowledge_patterns_precede_equal_records() {
        let config = RetrievalConfig {
            pattern_boost: 0.0,
            title_weight: 1.0,
            ..RetrievalConfig::default()
        };
        let records = vec![record("swap shift", "swap shift")];
        let patterns = vec![pattern(&["swap shift"], "Ask your manager")];
        let results = search_knowledge("swap shift", &records, &patterns, 5, &config);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].similarity_score, results[1].similarity_score);
        assert!(results[0].is_pattern_match);
    }

    #[test]
    fn test_empty_inputs_rank_empty() {
        let config = RetrievalConfig::default();
        assert!(search_knowledge("anything at all", &[], &[], 5, &config).is_empty());
    }
}
