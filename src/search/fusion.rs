//! Hybrid result fusion
//!
//! Every engine's raw scores are mapped onto [0, 1] with that engine's
//! normalization, scaled by its weight and summed per candidate identity.
//! A candidate's fused score is therefore
//! `Σ weight(e) × normalize_e(raw_e)` over the engines that returned it.

use crate::models::{CandidateId, CandidateRecord, Engine, SearchCandidate};
use crate::search::config::{EngineNormalization, EngineWeights, ScoreNormalization};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// A ranked, engine-merged result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedResult {
    pub record: CandidateRecord,
    pub score: f64,
    /// Contributing engines in priority order
    pub engines: Vec<Engine>,
    /// Weighted, normalized contribution per engine
    pub engine_scores: BTreeMap<Engine, f64>,
    pub snippet: Option<String>,
}

impl FusedResult {
    fn best_priority(&self) -> u8 {
        self.engines.iter().map(|e| e.priority()).min().unwrap_or(u8::MAX)
    }
}

/// Normalize one engine's raw scores, in input order.
pub fn normalize_scores(method: ScoreNormalization, raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);

    raw.iter()
        .map(|&score| {
            let normalized = match method {
                ScoreNormalization::MaxScale => {
                    if max > 0.0 {
                        score / max
                    } else {
                        0.0
                    }
                }
                ScoreNormalization::MinMax => {
                    if (max - min).abs() < f64::EPSILON {
                        1.0
                    } else {
                        (score - min) / (max - min)
                    }
                }
                ScoreNormalization::Fixed(scale) => score / scale,
            };
            normalized.clamp(0.0, 1.0)
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct HybridFuser {
    weights: EngineWeights,
    normalization: EngineNormalization,
}

impl HybridFuser {
    pub fn new(weights: EngineWeights, normalization: EngineNormalization) -> Self {
        Self {
            weights,
            normalization,
        }
    }

    /// Merge per-engine candidate lists and keep the top `size`.
    pub fn fuse(&self, candidates: Vec<SearchCandidate>, size: usize) -> Vec<FusedResult> {
        let mut results = self.merge(candidates);
        results.sort_by(compare_fused);
        results.truncate(size);
        results
    }

    /// Like [`fuse`](Self::fuse), but most frequent first; the fused order
    /// only breaks frequency ties. Records without a frequency sort last.
    pub fn fuse_by_frequency(&self, candidates: Vec<SearchCandidate>, size: usize) -> Vec<FusedResult> {
        let mut results = self.merge(candidates);
        results.sort_by(|a, b| {
            b.record
                .frequency()
                .cmp(&a.record.frequency())
                .then_with(|| compare_fused(a, b))
        });
        results.truncate(size);
        results
    }

    fn merge(&self, candidates: Vec<SearchCandidate>) -> Vec<FusedResult> {
        // Best raw hit per (engine, candidate)
        let mut per_engine: BTreeMap<Engine, HashMap<CandidateId, SearchCandidate>> = BTreeMap::new();
        for candidate in candidates {
            let slot = per_engine.entry(candidate.engine).or_default();
            match slot.get(&candidate.id()) {
                Some(existing) if existing.raw_score >= candidate.raw_score => {}
                _ => {
                    slot.insert(candidate.id(), candidate);
                }
            }
        }

        let mut fused: HashMap<CandidateId, FusedResult> = HashMap::new();
        let mut snippet_weight: HashMap<CandidateId, f64> = HashMap::new();

        for (engine, hits) in per_engine {
            let weight = self.weights.get(engine);
            let hits: Vec<SearchCandidate> = hits.into_values().collect();
            let raw: Vec<f64> = hits.iter().map(|c| c.raw_score).collect();
            let normalized = normalize_scores(self.normalization.get(engine), &raw);

            for (candidate, norm) in hits.into_iter().zip(normalized) {
                let id = candidate.id();
                let contribution = weight * norm;

                let entry = fused.entry(id.clone()).or_insert_with(|| FusedResult {
                    record: candidate.record.clone(),
                    score: 0.0,
                    engines: Vec::new(),
                    engine_scores: BTreeMap::new(),
                    snippet: None,
                });
                entry.score += contribution;
                entry.engines.push(engine);
                entry.engine_scores.insert(engine, contribution);

                if let Some(snippet) = candidate.snippet {
                    let best = snippet_weight.entry(id).or_insert(f64::NEG_INFINITY);
                    if contribution > *best {
                        *best = contribution;
                        entry.snippet = Some(snippet);
                    }
                }
            }
        }

        fused
            .into_values()
            .map(|mut result| {
                result.engines.sort_by_key(|e| e.priority());
                result
            })
            .collect()
    }
}

/// Score desc, then best engine priority, then identity string.
fn compare_fused(a: &FusedResult, b: &FusedResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.best_priority().cmp(&b.best_priority()))
        .then_with(|| a.record.id().to_string().cmp(&b.record.id().to_string()))
}
