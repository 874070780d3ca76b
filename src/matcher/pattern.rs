//! Multi-pattern substring matching over catalog names, aliases and values

use super::normalize::Normalization;
use aho_corasick::{AhoCorasick, MatchKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;
use strum::Display;
use tracing::debug;

/// Errors raised while compiling a pattern set
#[derive(Debug, thiserror::Error)]
pub enum MatcherError {
    #[error("Failed to build automaton: {0}")]
    Build(String),
}

impl From<aho_corasick::BuildError> for MatcherError {
    fn from(err: aho_corasick::BuildError) -> Self {
        MatcherError::Build(err.to_string())
    }
}

/// Where a pattern's text came from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PatternKind {
    DisplayName,
    Alias,
    ColumnName,
    DimensionValue,
    Description,
}

impl PatternKind {
    pub fn weight(self) -> f64 {
        match self {
            PatternKind::DisplayName => 2.0,
            PatternKind::Alias => 1.8,
            PatternKind::ColumnName => 1.5,
            PatternKind::DimensionValue => 1.3,
            PatternKind::Description => 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern<R> {
    pub text: String,
    pub reference: R,
    pub kind: PatternKind,
}

impl<R> Pattern<R> {
    pub fn new(text: impl Into<String>, reference: R, kind: PatternKind) -> Self {
        Self {
            text: text.into(),
            reference,
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternMatch<R> {
    pub reference: R,
    /// Char offsets into the query
    pub span: Range<usize>,
    /// Pattern text as registered
    pub pattern: String,
    pub kind: PatternKind,
    pub score: f64,
}

/// Highest possible [`match_score`].
pub const MAX_MATCH_SCORE: f64 = 2.0 * 2.0 * 1.25;

/// kind weight x exactness bonus x length bonus
pub fn match_score(kind: PatternKind, normalized_pattern: &str, normalized_query: &str) -> f64 {
    let exactness = if normalized_pattern == normalized_query {
        2.0
    } else if normalized_query.starts_with(normalized_pattern)
        || normalized_query.ends_with(normalized_pattern)
    {
        1.5
    } else if normalized_query.contains(normalized_pattern) {
        1.2
    } else {
        1.0
    };

    let p = normalized_pattern.chars().count() as f64;
    let q = normalized_query.chars().count() as f64;
    let ratio = if p.max(q) > 0.0 { p.min(q) / p.max(q) } else { 0.0 };
    let length_bonus = 1.0 + (ratio - 0.5) * 0.5;

    kind.weight() * exactness * length_bonus
}

struct Entry<R> {
    reference: R,
    text: String,
    kind: PatternKind,
}

struct Compiled<R> {
    automaton: AhoCorasick,
    /// Indexed by automaton pattern id; one normalized text may carry many refs
    entries: Vec<Vec<Entry<R>>>,
    normalized: Vec<String>,
    pattern_count: usize,
}

/// Compiled Aho-Corasick pattern set.
///
/// Immutable once built. A rebuild compiles a complete replacement, which the
/// owner publishes together with the records the patterns point at.
pub struct PatternMatcher<R> {
    normalization: Normalization,
    compiled: Option<Compiled<R>>,
}

impl<R> PatternMatcher<R> {
    pub fn empty(normalization: Normalization) -> Self {
        Self {
            normalization,
            compiled: None,
        }
    }

    pub fn pattern_count(&self) -> usize {
        self.compiled.as_ref().map(|c| c.pattern_count).unwrap_or(0)
    }
}

impl<R> Default for PatternMatcher<R> {
    fn default() -> Self {
        Self::empty(Normalization::default())
    }
}

impl<R> fmt::Debug for PatternMatcher<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternMatcher")
            .field("normalization", &self.normalization)
            .field("pattern_count", &self.pattern_count())
            .finish()
    }
}

impl<R> PatternMatcher<R>
where
    R: Clone + Ord,
{
    /// Compile `patterns`. Empty texts are ignored since they would match at
    /// every offset.
    pub fn build<I>(normalization: Normalization, patterns: I) -> Result<Self, MatcherError>
    where
        I: IntoIterator<Item = Pattern<R>>,
    {
        let mut slots: HashMap<String, usize> = HashMap::new();
        let mut normalized: Vec<String> = Vec::new();
        let mut entries: Vec<Vec<Entry<R>>> = Vec::new();
        let mut seen: BTreeSet<(R, String, PatternKind)> = BTreeSet::new();

        for pattern in patterns {
            let text = pattern.text.trim();
            if text.is_empty() {
                continue;
            }
            if !seen.insert((pattern.reference.clone(), text.to_string(), pattern.kind)) {
                continue;
            }
            let key = normalization.apply(text);
            let slot = *slots.entry(key.clone()).or_insert_with(|| {
                normalized.push(key);
                entries.push(Vec::new());
                entries.len() - 1
            });
            entries[slot].push(Entry {
                reference: pattern.reference,
                text: text.to_string(),
                kind: pattern.kind,
            });
        }

        let pattern_count = seen.len();
        if normalized.is_empty() {
            debug!("Pattern set is empty");
            return Ok(Self::empty(normalization));
        }

        let automaton = AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&normalized)?;
        debug!(pattern_count, "Pattern automaton compiled");

        Ok(Self {
            normalization,
            compiled: Some(Compiled {
                automaton,
                entries,
                normalized,
                pattern_count,
            }),
        })
    }

    /// Every registered pattern occurring in the normalized query, ordered by
    /// span, then reference, then pattern text.
    pub fn find(&self, query: &str) -> Vec<PatternMatch<R>> {
        let Some(compiled) = &self.compiled else {
            return Vec::new();
        };

        let haystack = self.normalization.apply(query);
        let mut char_at = vec![0usize; haystack.len() + 1];
        let mut chars = 0;
        for (byte, c) in haystack.char_indices() {
            for slot in char_at.iter_mut().skip(byte).take(c.len_utf8()) {
                *slot = chars;
            }
            chars += 1;
        }
        char_at[haystack.len()] = chars;

        let mut matches = Vec::new();
        for m in compiled.automaton.find_overlapping_iter(&haystack) {
            let id = m.pattern().as_usize();
            let span = char_at[m.start()]..char_at[m.end()];
            let normalized_pattern = &compiled.normalized[id];
            for entry in &compiled.entries[id] {
                matches.push(PatternMatch {
                    reference: entry.reference.clone(),
                    span: span.clone(),
                    pattern: entry.text.clone(),
                    kind: entry.kind,
                    score: match_score(entry.kind, normalized_pattern, &haystack),
                });
            }
        }

        matches.sort_by(|a, b| {
            (a.span.start, a.span.end)
                .cmp(&(b.span.start, b.span.end))
                .then_with(|| a.reference.cmp(&b.reference))
                .then_with(|| a.pattern.cmp(&b.pattern))
                .then_with(|| a.kind.cmp(&b.kind))
        });
        matches
    }

    /// Best-scoring match per reference, highest score first.
    pub fn best_per_reference(&self, query: &str) -> Vec<PatternMatch<R>> {
        let mut best: BTreeMap<R, PatternMatch<R>> = BTreeMap::new();
        for m in self.find(query) {
            match best.get(&m.reference) {
                Some(current) if current.score >= m.score => {}
                _ => {
                    best.insert(m.reference.clone(), m);
                }
            }
        }

        let mut best: Vec<PatternMatch<R>> = best.into_values().collect();
        best.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        best
    }
}
