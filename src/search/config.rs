//! Search and index configuration

use crate::models::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Physical index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding one sub-directory per index and generation
    #[serde(default = "default_root_path")]
    pub root_path: PathBuf,

    /// Namespace for index names (`{prefix}_fields`, ...)
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Keep every generation in RAM instead of on disk
    #[serde(default)]
    pub in_memory: bool,

    /// Index writer heap size in bytes (default: 50MB)
    #[serde(default = "default_writer_heap_size")]
    pub writer_heap_size: usize,

    /// Number of threads for indexing
    #[serde(default = "default_indexing_threads")]
    pub indexing_threads: usize,

    /// Rebuild an ABSENT index from the catalog on the next search
    #[serde(default = "default_true")]
    pub auto_initialize: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            root_path: default_root_path(),
            prefix: default_prefix(),
            in_memory: false,
            writer_heap_size: default_writer_heap_size(),
            indexing_threads: default_indexing_threads(),
            auto_initialize: true,
        }
    }
}

impl IndexConfig {
    pub fn in_memory(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            in_memory: true,
            ..Default::default()
        }
    }
}

/// Text analysis applied to `tokenize = true` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Analyzer {
    /// Word tokens, lower-cased. CJK runs stay whole.
    #[default]
    Standard,
    /// Overlapping 1-2 char grams, suited to unsegmented CJK text
    Ngram,
}

/// Maps one engine's raw scores onto [0, 1] before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ScoreNormalization {
    /// raw / max(raw) over the engine's result list
    MaxScale,
    /// (raw - min) / (max - min); a single-valued list maps to 1.0
    MinMax,
    /// min(raw / scale, 1.0) for engines with a known upper bound
    Fixed(f64),
}

impl FromStr for ScoreNormalization {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "max_scale" => Ok(Self::MaxScale),
            "min_max" => Ok(Self::MinMax),
            other => {
                let scale = other
                    .strip_prefix("fixed:")
                    .ok_or_else(|| format!("unknown normalization '{}'", other))?;
                let scale: f64 = scale
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid fixed scale '{}'", scale))?;
                if scale <= 0.0 || !scale.is_finite() {
                    return Err(format!("fixed scale must be positive, got {}", scale));
                }
                Ok(Self::Fixed(scale))
            }
        }
    }
}

impl TryFrom<String> for ScoreNormalization {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScoreNormalization> for String {
    fn from(value: ScoreNormalization) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ScoreNormalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxScale => write!(f, "max_scale"),
            Self::MinMax => write!(f, "min_max"),
            Self::Fixed(scale) => write!(f, "fixed:{}", scale),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineWeights {
    pub fulltext: f64,
    pub pattern: f64,
    pub similarity: f64,
}

impl Default for EngineWeights {
    fn default() -> Self {
        Self {
            fulltext: 1.0,
            pattern: 0.9,
            similarity: 0.8,
        }
    }
}

impl EngineWeights {
    pub fn get(&self, engine: Engine) -> f64 {
        match engine.scoring() {
            Engine::Pattern => self.pattern,
            Engine::Similarity => self.similarity,
            _ => self.fulltext,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineNormalization {
    pub fulltext: ScoreNormalization,
    pub pattern: ScoreNormalization,
    pub similarity: ScoreNormalization,
}

impl Default for EngineNormalization {
    fn default() -> Self {
        Self {
            fulltext: ScoreNormalization::MaxScale,
            pattern: ScoreNormalization::Fixed(crate::matcher::MAX_MATCH_SCORE),
            similarity: ScoreNormalization::Fixed(1.0),
        }
    }
}

impl EngineNormalization {
    pub fn get(&self, engine: Engine) -> ScoreNormalization {
        match engine.scoring() {
            Engine::Pattern => self.pattern,
            Engine::Similarity => self.similarity,
            _ => self.fulltext,
        }
    }
}

/// Query-time behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub weights: EngineWeights,

    #[serde(default)]
    pub normalization: EngineNormalization,

    /// Similarity scores below this are dropped
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Upper bound on the catalog slice scored by the similarity engine
    #[serde(default = "default_similarity_max_candidates")]
    pub similarity_max_candidates: usize,

    /// Per-engine deadline; a timed-out engine contributes nothing
    #[serde(default = "default_engine_timeout_ms")]
    pub engine_timeout_ms: u64,

    #[serde(default = "default_size")]
    pub default_size: usize,

    #[serde(default = "default_max_size")]
    pub max_size: usize,

    /// Each engine fetches `size * fetch_multiplier` before fusion
    #[serde(default = "default_fetch_multiplier")]
    pub fetch_multiplier: usize,

    #[serde(default = "default_snippet_max_chars")]
    pub snippet_max_chars: usize,

    #[serde(default)]
    pub default_analyzer: Analyzer,

    #[serde(default = "default_true")]
    pub default_tokenize: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            weights: EngineWeights::default(),
            normalization: EngineNormalization::default(),
            similarity_threshold: default_similarity_threshold(),
            similarity_max_candidates: default_similarity_max_candidates(),
            engine_timeout_ms: default_engine_timeout_ms(),
            default_size: default_size(),
            max_size: default_max_size(),
            fetch_multiplier: default_fetch_multiplier(),
            snippet_max_chars: default_snippet_max_chars(),
            default_analyzer: Analyzer::Standard,
            default_tokenize: true,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), String> {
        let w = &self.weights;
        for (name, weight) in [
            ("fulltext", w.fulltext),
            ("pattern", w.pattern),
            ("similarity", w.similarity),
        ] {
            if !(weight >= 0.0 && weight.is_finite()) {
                return Err(format!("weight '{}' must be non-negative, got {}", name, weight));
            }
        }
        if self.max_size == 0 || self.default_size == 0 || self.default_size > self.max_size {
            return Err("default_size must be within 1..=max_size".to_string());
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err("similarity_threshold must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn weights(mut self, fulltext: f64, pattern: f64, similarity: f64) -> Self {
        self.config.weights = EngineWeights {
            fulltext,
            pattern,
            similarity,
        };
        self
    }

    pub fn normalization(mut self, normalization: EngineNormalization) -> Self {
        self.config.normalization = normalization;
        self
    }

    pub fn similarity_threshold(mut self, threshold: f64) -> Self {
        self.config.similarity_threshold = threshold;
        self
    }

    pub fn similarity_max_candidates(mut self, max: usize) -> Self {
        self.config.similarity_max_candidates = max;
        self
    }

    pub fn engine_timeout_ms(mut self, millis: u64) -> Self {
        self.config.engine_timeout_ms = millis;
        self
    }

    pub fn max_size(mut self, max: usize) -> Self {
        self.config.max_size = max;
        self
    }

    pub fn default_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.config.default_analyzer = analyzer;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_root_path() -> PathBuf {
    PathBuf::from("./data/indices")
}

fn default_prefix() -> String {
    "kman".to_string()
}

fn default_writer_heap_size() -> usize {
    50_000_000
}

fn default_indexing_threads() -> usize {
    2
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    0.3
}

fn default_similarity_max_candidates() -> usize {
    2_000
}

fn default_engine_timeout_ms() -> u64 {
    30_000
}

fn default_size() -> usize {
    10
}

fn default_max_size() -> usize {
    100
}

fn default_fetch_multiplier() -> usize {
    2
}

fn default_snippet_max_chars() -> usize {
    120
}
