//! In-memory catalog of the current record set
//!
//! Holds the latest fields, metrics and dimension values, together with the
//! pattern automaton compiled from them, as one immutable snapshot behind an
//! `ArcSwap`. Writers build and compile a complete new snapshot and publish
//! it with a single store; readers never lock and never see records from one
//! generation paired with patterns from another.

use crate::matcher::{MatcherError, Normalization, Pattern, PatternKind, PatternMatch, PatternMatcher};
use crate::models::{
    CandidateId, CandidateRecord, DimensionValueRecord, FieldKey, FieldRecord, IndexKind,
    MetricRecord,
};
use crate::search::IndexDocument;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::info;

/// What becomes a pattern
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    #[serde(default = "default_true")]
    pub fold_width: bool,

    /// Column names shorter than this are too generic to match on
    #[serde(default = "default_min_pattern_chars")]
    pub min_pattern_chars: usize,

    /// Register description words (2+ chars) as low-weight patterns
    #[serde(default)]
    pub include_descriptions: bool,
}

fn default_true() -> bool {
    true
}

fn default_min_pattern_chars() -> usize {
    3
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            case_insensitive: true,
            fold_width: true,
            min_pattern_chars: default_min_pattern_chars(),
            include_descriptions: false,
        }
    }
}

impl PatternConfig {
    pub fn normalization(&self) -> Normalization {
        Normalization {
            case_insensitive: self.case_insensitive,
            fold_width: self.fold_width,
        }
    }
}

/// Immutable view of the catalog at one point in time
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    pub fields: BTreeMap<FieldKey, FieldRecord>,
    pub metrics: BTreeMap<i64, MetricRecord>,
    /// Keyed by value hash
    pub dimension_values: BTreeMap<String, DimensionValueRecord>,
    /// Compiled from the records above
    patterns: Arc<PatternMatcher<CandidateId>>,
}

impl CatalogSnapshot {
    /// Best pattern hit per candidate, strongest first.
    pub fn pattern_matches(&self, query: &str) -> Vec<PatternMatch<CandidateId>> {
        self.patterns.best_per_reference(query)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.pattern_count()
    }

    pub fn get(&self, id: &CandidateId) -> Option<CandidateRecord> {
        match id {
            CandidateId::Field(key) => self.fields.get(key).cloned().map(Into::into),
            CandidateId::Metric(metric_id) => self.metrics.get(metric_id).cloned().map(Into::into),
            CandidateId::DimensionValue(hash) => self.dimension_values.get(hash).cloned().map(Into::into),
        }
    }

    pub fn records(&self, kind: IndexKind) -> Vec<CandidateRecord> {
        match kind {
            IndexKind::Fields => self.fields.values().cloned().map(Into::into).collect(),
            IndexKind::Metrics => self.metrics.values().cloned().map(Into::into).collect(),
            IndexKind::DimensionValues => self
                .dimension_values
                .values()
                .cloned()
                .map(Into::into)
                .collect(),
        }
    }

    pub fn documents(&self, kind: IndexKind) -> Vec<IndexDocument> {
        match kind {
            IndexKind::Fields => self.fields.values().map(IndexDocument::from).collect(),
            IndexKind::Metrics => self.metrics.values().map(IndexDocument::from).collect(),
            IndexKind::DimensionValues => self
                .dimension_values
                .values()
                .map(IndexDocument::from)
                .collect(),
        }
    }

    pub fn ids(&self, kind: IndexKind) -> BTreeSet<CandidateId> {
        match kind {
            IndexKind::Fields => self.fields.keys().cloned().map(CandidateId::Field).collect(),
            IndexKind::Metrics => self.metrics.keys().copied().map(CandidateId::Metric).collect(),
            IndexKind::DimensionValues => self
                .dimension_values
                .keys()
                .cloned()
                .map(CandidateId::DimensionValue)
                .collect(),
        }
    }
}

/// Field count per table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub table_name: String,
    pub field_count: usize,
    pub dimension_count: usize,
    /// Columns surfaced as measure candidates
    pub measure_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub fields: usize,
    pub tables: usize,
    pub metrics: usize,
    pub dimension_values: usize,
    pub patterns: usize,
}

pub struct Catalog {
    config: PatternConfig,
    snapshot: ArcSwap<CatalogSnapshot>,
    write_lock: parking_lot::Mutex<()>,
}

impl Catalog {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            snapshot: ArcSwap::from_pointee(CatalogSnapshot::default()),
            write_lock: parking_lot::Mutex::new(()),
        }
    }

    /// Text folding shared with the similarity engine
    pub fn normalization(&self) -> Normalization {
        self.config.normalization()
    }

    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshot.load_full()
    }

    /// Merge freshly loaded fields.
    ///
    /// With `scoped` set, only the tables present in `fields` are replaced;
    /// otherwise the batch becomes the whole field set. Returns the ids that
    /// disappeared.
    pub fn merge_fields(&self, fields: Vec<FieldRecord>, scoped: bool) -> Result<Vec<CandidateId>, MatcherError> {
        self.update(IndexKind::Fields, |snapshot| {
            if scoped {
                let tables: BTreeSet<String> = fields.iter().map(|f| f.table_name.clone()).collect();
                snapshot.fields.retain(|key, _| !tables.contains(&key.table_name));
            } else {
                snapshot.fields.clear();
            }
            for field in fields {
                snapshot.fields.insert(field.key(), field);
            }
        })
    }

    /// Replace metrics. With `scoped` set, only the given ids are upserted.
    pub fn replace_metrics(&self, metrics: Vec<MetricRecord>, scoped: bool) -> Result<Vec<CandidateId>, MatcherError> {
        self.update(IndexKind::Metrics, |snapshot| {
            if !scoped {
                snapshot.metrics.clear();
            }
            for metric in metrics {
                snapshot.metrics.insert(metric.metric_id, metric);
            }
        })
    }

    /// Replace the complete dimension value set.
    pub fn replace_dimension_values(
        &self,
        values: Vec<DimensionValueRecord>,
    ) -> Result<Vec<CandidateId>, MatcherError> {
        self.update(IndexKind::DimensionValues, |snapshot| {
            snapshot.dimension_values = values
                .into_iter()
                .map(|record| (record.value_hash.clone(), record))
                .collect();
        })
    }

    /// Load records read back from the indices after a restart.
    pub fn restore(&self, records: Vec<CandidateRecord>) -> Result<usize, MatcherError> {
        let _guard = self.write_lock.lock();
        let mut next = CatalogSnapshot::clone(&self.snapshot.load());
        let count = records.len();
        for record in records {
            match record {
                CandidateRecord::Field { field } => {
                    next.fields.insert(field.key(), field);
                }
                CandidateRecord::Metric { metric } => {
                    next.metrics.insert(metric.metric_id, metric);
                }
                CandidateRecord::DimensionValue {
                    field,
                    dimension_value,
                    frequency,
                    value_hash,
                } => {
                    next.dimension_values.insert(
                        value_hash.clone(),
                        DimensionValueRecord {
                            value_hash,
                            value: dimension_value,
                            frequency,
                            field,
                        },
                    );
                }
            }
        }
        self.publish(next)?;
        Ok(count)
    }

    fn update<F>(&self, kind: IndexKind, apply: F) -> Result<Vec<CandidateId>, MatcherError>
    where
        F: FnOnce(&mut CatalogSnapshot),
    {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load_full();
        let before = current.ids(kind);

        let mut next = CatalogSnapshot::clone(&current);
        apply(&mut next);
        let after = next.ids(kind);

        self.publish(next)?;
        Ok(before.difference(&after).cloned().collect())
    }

    fn publish(&self, mut next: CatalogSnapshot) -> Result<(), MatcherError> {
        let patterns = PatternMatcher::build(self.config.normalization(), self.patterns(&next))?;
        let count = patterns.pattern_count();
        next.patterns = Arc::new(patterns);
        info!(
            fields = next.fields.len(),
            metrics = next.metrics.len(),
            dimension_values = next.dimension_values.len(),
            patterns = count,
            "Catalog updated"
        );
        self.snapshot.store(Arc::new(next));
        Ok(())
    }

    fn patterns(&self, snapshot: &CatalogSnapshot) -> Vec<Pattern<CandidateId>> {
        let mut patterns = Vec::new();

        for field in snapshot.fields.values() {
            let id = CandidateId::Field(field.key());
            patterns.push(Pattern::new(&field.display_name, id.clone(), PatternKind::DisplayName));
            for alias in &field.aliases {
                patterns.push(Pattern::new(alias, id.clone(), PatternKind::Alias));
            }
            if field.column_name.chars().count() >= self.config.min_pattern_chars {
                patterns.push(Pattern::new(&field.column_name, id.clone(), PatternKind::ColumnName));
            }
            if self.config.include_descriptions {
                for word in field
                    .description
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| w.chars().count() >= 2)
                {
                    patterns.push(Pattern::new(word, id.clone(), PatternKind::Description));
                }
            }
        }

        for metric in snapshot.metrics.values() {
            let id = CandidateId::Metric(metric.metric_id);
            patterns.push(Pattern::new(&metric.name, id.clone(), PatternKind::DisplayName));
            for alias in &metric.aliases {
                patterns.push(Pattern::new(alias, id.clone(), PatternKind::Alias));
            }
        }

        for record in snapshot.dimension_values.values() {
            patterns.push(Pattern::new(
                &record.value,
                CandidateId::DimensionValue(record.value_hash.clone()),
                PatternKind::DimensionValue,
            ));
        }

        patterns
    }

    /// Best pattern hit per candidate in the current snapshot.
    pub fn pattern_matches(&self, query: &str) -> Vec<PatternMatch<CandidateId>> {
        self.snapshot.load().pattern_matches(query)
    }

    /// Enabled dimension fields the extractor should visit.
    pub fn dimension_fields(&self) -> Vec<FieldRecord> {
        self.snapshot
            .load()
            .fields
            .values()
            .filter(|f| f.is_extractable())
            .cloned()
            .collect()
    }

    pub fn tables(&self) -> Vec<TableSummary> {
        let snapshot = self.snapshot.load();
        let mut tables: BTreeMap<&str, TableSummary> = BTreeMap::new();
        for field in snapshot.fields.values() {
            let entry = tables.entry(&field.table_name).or_insert_with(|| TableSummary {
                table_name: field.table_name.clone(),
                field_count: 0,
                dimension_count: 0,
                measure_count: 0,
            });
            let indexing = field.field_type.indexing();
            entry.field_count += 1;
            if indexing.as_dimension {
                entry.dimension_count += 1;
            }
            if indexing.as_metric {
                entry.measure_count += 1;
            }
        }
        tables.into_values().collect()
    }

    pub fn stats(&self) -> CatalogStats {
        let snapshot = self.snapshot.load();
        let tables: BTreeSet<&str> = snapshot.fields.keys().map(|k| k.table_name.as_str()).collect();
        CatalogStats {
            fields: snapshot.fields.len(),
            tables: tables.len(),
            metrics: snapshot.metrics.len(),
            dimension_values: snapshot.dimension_values.len(),
            patterns: snapshot.pattern_count(),
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;

    fn field(table: &str, column: &str, name: &str) -> FieldRecord {
        FieldRecord::new(table, column, name, FieldType::Dimension)
    }

    #[test]
    fn test_scoped_merge_only_replaces_present_tables() {
        let catalog = Catalog::default();
        catalog
            .merge_fields(vec![field("a", "c1", "甲"), field("a", "c2", "乙"), field("b", "c3", "丙")], false)
            .unwrap();

        let removed = catalog.merge_fields(vec![field("a", "c1", "甲一")], true).unwrap();
        assert_eq!(removed, vec![CandidateId::Field(FieldKey::new("a", "c2"))]);

        let snapshot = catalog.snapshot();
        assert_eq!(snapshot.fields.len(), 2);
        assert_eq!(snapshot.fields[&FieldKey::new("a", "c1")].display_name, "甲一");
        assert!(snapshot.fields.contains_key(&FieldKey::new("b", "c3")));
    }

    #[test]
    fn test_patterns_follow_catalog() {
        let catalog = Catalog::default();
        catalog
            .merge_fields(vec![field("dwd_order", "order_status", "订单状态").with_aliases(vec!["状态"])], false)
            .unwrap();
        catalog
            .replace_dimension_values(vec![DimensionValueRecord::new(
                &field("dwd_order", "order_status", "订单状态"),
                "已完成",
                15420,
            )])
            .unwrap();

        let hits = catalog.pattern_matches("订单状态是已完成的");
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().any(|m| matches!(m.reference, CandidateId::DimensionValue(_))));

        catalog.replace_dimension_values(Vec::new()).unwrap();
        assert_eq!(catalog.pattern_matches("已完成").len(), 0);
    }

    #[test]
    fn test_snapshot_patterns_resolve_in_same_snapshot() {
        let catalog = Catalog::default();
        let status = field("dwd_order", "order_status", "订单状态");
        catalog
            .replace_dimension_values(vec![DimensionValueRecord::new(&status, "已完成", 15420)])
            .unwrap();

        let before = catalog.snapshot();
        catalog
            .replace_dimension_values(vec![DimensionValueRecord::new(&status, "已取消", 310)])
            .unwrap();
        let after = catalog.snapshot();

        let old_hits = before.pattern_matches("已完成");
        assert_eq!(old_hits.len(), 1);
        assert!(before.get(&old_hits[0].reference).is_some());
        assert!(after.pattern_matches("已完成").is_empty());

        let new_hits = after.pattern_matches("已取消");
        assert!(after.get(&new_hits[0].reference).is_some());
        assert!(before.get(&new_hits[0].reference).is_none());
    }

    #[test]
    fn test_concurrent_readers_never_see_dangling_patterns() {
        let catalog = Arc::new(Catalog::default());
        let status = field("dwd_order", "order_status", "订单状态");

        let writer = {
            let catalog = catalog.clone();
            let status = status.clone();
            std::thread::spawn(move || {
                for round in 0..200u64 {
                    let value = if round % 2 == 0 { "已完成" } else { "已完成退款" };
                    catalog
                        .replace_dimension_values(vec![DimensionValueRecord::new(&status, value, round)])
                        .unwrap();
                }
            })
        };

        for _ in 0..500 {
            let snapshot = catalog.snapshot();
            for hit in snapshot.pattern_matches("已完成退款") {
                assert!(snapshot.get(&hit.reference).is_some(), "{:?} has no record", hit.reference);
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_short_column_names_are_not_patterns() {
        let catalog = Catalog::default();
        catalog.merge_fields(vec![field("t", "id", "编号")], false).unwrap();
        assert!(catalog.pattern_matches("user id").is_empty());
        assert_eq!(catalog.stats().patterns, 1);
    }

    #[test]
    fn test_restore_and_stats() {
        let catalog = Catalog::default();
        let records: Vec<CandidateRecord> = vec![
            field("t1", "c1", "一").into(),
            field("t2", "c2", "二").into(),
            MetricRecord::new(9, "GMV").into(),
        ];
        assert_eq!(catalog.restore(records).unwrap(), 3);

        let stats = catalog.stats();
        assert_eq!(stats.fields, 2);
        assert_eq!(stats.tables, 2);
        assert_eq!(stats.metrics, 1);
        assert_eq!(catalog.tables()[0].dimension_count, 1);
        assert_eq!(catalog.dimension_fields().len(), 2);
    }

    #[test]
    fn test_table_summary_counts_by_role() {
        let catalog = Catalog::default();
        let records: Vec<CandidateRecord> = vec![
            field("dwd_order", "order_status", "订单状态").into(),
            FieldRecord::new("dwd_order", "pay_amount", "支付金额", FieldType::Metric).into(),
            FieldRecord::new("dwd_order", "order_id", "订单编号", FieldType::Attribute).into(),
        ];
        catalog.restore(records).unwrap();

        let tables = catalog.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].field_count, 3);
        assert_eq!(tables[0].dimension_count, 1);
        assert_eq!(tables[0].measure_count, 1);
    }
}
