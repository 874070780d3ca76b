//! Fuzzy scoring of a query against a bounded candidate set

use super::normalize::Normalization;
use crate::models::CandidateRecord;
use std::collections::HashSet;

#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("Candidate set of {got} exceeds the bound of {max}")]
    CandidateSetTooLarge { got: usize, max: usize },
}

/// Anything exposing the texts a query is compared against.
pub trait SimilarityTarget {
    fn similarity_texts(&self) -> Vec<&str>;
}

impl SimilarityTarget for CandidateRecord {
    fn similarity_texts(&self) -> Vec<&str> {
        match self {
            CandidateRecord::Field { field } => {
                let mut texts = vec![field.display_name.as_str(), field.column_name.as_str()];
                texts.extend(field.aliases.iter().map(String::as_str));
                texts.push(field.description.as_str());
                texts
            }
            CandidateRecord::Metric { metric } => {
                let mut texts = vec![metric.name.as_str()];
                texts.extend(metric.aliases.iter().map(String::as_str));
                texts.push(metric.business_definition.as_str());
                texts
            }
            CandidateRecord::DimensionValue {
                dimension_value, ..
            } => vec![dimension_value.as_str()],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatch {
    /// Position in the candidate slice
    pub index: usize,
    pub score: f64,
    /// Attribute text that produced the score
    pub matched_text: String,
}

pub struct SimilarityMatcher {
    normalization: Normalization,
    max_candidates: usize,
}

impl SimilarityMatcher {
    pub fn new(normalization: Normalization, max_candidates: usize) -> Self {
        Self {
            normalization,
            max_candidates,
        }
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Score every candidate and keep those at or above `threshold`, best
    /// first. Callers must pre-filter to at most `max_candidates`.
    pub fn rank<T: SimilarityTarget>(
        &self,
        query: &str,
        candidates: &[T],
        threshold: f64,
        tokenize: bool,
    ) -> Result<Vec<SimilarityMatch>, SimilarityError> {
        if candidates.len() > self.max_candidates {
            return Err(SimilarityError::CandidateSetTooLarge {
                got: candidates.len(),
                max: self.max_candidates,
            });
        }

        let query = self.normalization.apply(query.trim());
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let query_tokens = if tokenize { tokens(&query) } else { HashSet::new() };

        let mut ranked = Vec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            let mut best: Option<(f64, &str)> = None;
            for text in candidate.similarity_texts() {
                let normalized = self.normalization.apply(text.trim());
                if normalized.is_empty() {
                    continue;
                }
                let mut score = text_similarity(&query, &normalized);
                if tokenize {
                    score = score.max(jaccard(&query_tokens, &tokens(&normalized)));
                }
                if best.map_or(true, |(s, _)| score > s) {
                    best = Some((score, text));
                }
            }

            if let Some((score, text)) = best {
                if score >= threshold {
                    ranked.push(SimilarityMatch {
                        index,
                        score,
                        matched_text: text.to_string(),
                    });
                }
            }
        }

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.index.cmp(&b.index)));
        Ok(ranked)
    }
}

/// Similarity of two already-normalized strings in [0, 1].
pub fn text_similarity(query: &str, text: &str) -> f64 {
    if query.is_empty() || text.is_empty() {
        return 0.0;
    }
    let q_len = query.chars().count() as f64;
    let t_len = text.chars().count() as f64;
    let length_ratio = q_len.min(t_len) / q_len.max(t_len);

    let base = if query == text {
        1.0
    } else if text.contains(query) || query.contains(text) {
        0.9
    } else {
        strsim::normalized_levenshtein(query, text)
    };

    base * (0.7 + 0.3 * length_ratio)
}

/// CJK ideographs are single-char tokens; other alphanumeric runs longer
/// than one char are word tokens.
pub fn tokens(text: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    let mut word = String::new();
    let flush = |word: &mut String, out: &mut HashSet<String>| {
        if word.chars().count() > 1 {
            out.insert(std::mem::take(word));
        } else {
            word.clear();
        }
    };

    for c in text.chars() {
        if is_cjk(c) {
            flush(&mut word, &mut out);
            out.insert(c.to_string());
        } else if c.is_alphanumeric() {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
        }
    }
    flush(&mut word, &mut out);
    out
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}')
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl SimilarityTarget for Named {
        fn similarity_texts(&self) -> Vec<&str> {
            vec![self.0]
        }
    }

    #[test]
    fn test_edit_distance_counts_chars_not_bytes() {
        // One substituted ideograph out of four, equal lengths
        assert!((text_similarity("订单状态", "订单状况") - 0.75).abs() < 1e-9);
        assert_eq!(text_similarity("abc", "xyz"), 0.0);
        assert_eq!(text_similarity("", ""), 0.0);
    }

    #[test]
    fn test_exact_and_containment() {
        assert_eq!(text_similarity("gmv", "gmv"), 1.0);
        let contained = text_similarity("订单", "订单状态");
        assert!((contained - 0.9 * (0.7 + 0.3 * 0.5)).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_drops_weak_candidates() {
        let matcher = SimilarityMatcher::new(Normalization::default(), 10);
        let candidates = vec![Named("order_status"), Named("zzzz"), Named("order_state")];
        let ranked = matcher.rank("order status", &candidates, 0.5, false).unwrap();

        let indices: Vec<usize> = ranked.iter().map(|m| m.index).collect();
        assert!(!indices.contains(&1));
        assert_eq!(ranked[0].index, 0);
        assert!(ranked.iter().all(|m| m.score >= 0.5 && m.score <= 1.0));
    }

    #[test]
    fn test_candidate_bound_is_enforced() {
        let matcher = SimilarityMatcher::new(Normalization::default(), 1);
        let result = matcher.rank("x", &[Named("a"), Named("b")], 0.0, false);
        assert!(matches!(
            result,
            Err(SimilarityError::CandidateSetTooLarge { got: 2, max: 1 })
        ));
    }

    #[test]
    fn test_tokens_split_cjk_per_char() {
        let t = tokens("订单 status a");
        assert!(t.contains("订") && t.contains("单") && t.contains("status"));
        assert!(!t.contains("a"));
    }

    #[test]
    fn test_tokenized_jaccard_can_win() {
        let matcher = SimilarityMatcher::new(Normalization::default(), 10);
        let candidates = vec![Named("status of the order")];
        let plain = matcher.rank("order status", &candidates, 0.0, false).unwrap();
        let tokenized = matcher.rank("order status", &candidates, 0.0, true).unwrap();
        assert!(tokenized[0].score >= plain[0].score);
    }
}
