//! In-memory matching engines: exact multi-pattern and fuzzy similarity

mod normalize;
mod pattern;
mod similarity;

pub use normalize::Normalization;
pub use pattern::{
    match_score, MatcherError, Pattern, PatternKind, PatternMatch, PatternMatcher,
    MAX_MATCH_SCORE,
};
pub use similarity::{
    text_similarity, tokens, SimilarityError, SimilarityMatch,
    SimilarityMatcher, SimilarityTarget,
};
