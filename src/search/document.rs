//! Search document structures and schema

use crate::models::{CandidateRecord, DimensionValueRecord, FieldRecord, MetricRecord};
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};
use tantivy::schema::*;
use tantivy::tokenizer::{LowerCaser, NgramTokenizer, RawTokenizer, TextAnalyzer};
use tantivy::{Index, TantivyDocument};

/// Tokenizer producing 1-2 char grams, lower-cased
pub const NGRAM_TOKENIZER: &str = "md_ngram";

/// Whole-value tokenizer, lower-cased
pub const EXACT_TOKENIZER: &str = "md_exact";

pub const DOC_ID: &str = "doc_id";
pub const TABLE_NAME: &str = "table_name";
pub const COLUMN_NAME: &str = "column_name";
pub const ENABLED: &str = "enabled";
pub const FREQUENCY: &str = "frequency";
pub const PAYLOAD: &str = "payload";

/// Searchable text attributes. Each one is indexed three ways: `{attr}`
/// (word tokens), `{attr}_ngram` and `{attr}_exact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum TextAttr {
    Name,
    Alias,
    Column,
    Value,
    Description,
}

impl TextAttr {
    pub fn field_name(self) -> String {
        self.to_string()
    }

    pub fn ngram_field_name(self) -> String {
        format!("{}_ngram", self)
    }

    pub fn exact_field_name(self) -> String {
        format!("{}_exact", self)
    }

    /// Relevance boost applied when the attribute matches.
    pub fn boost(self) -> f32 {
        match self {
            TextAttr::Name => 10.0,
            TextAttr::Alias => 8.0,
            TextAttr::Value => 8.0,
            TextAttr::Column => 6.0,
            TextAttr::Description => 1.0,
        }
    }
}

fn text_options(tokenizer: &str, stored: bool) -> TextOptions {
    let indexing = TextFieldIndexing::default()
        .set_tokenizer(tokenizer)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let options = TextOptions::default().set_indexing_options(indexing);
    if stored {
        options.set_stored()
    } else {
        options
    }
}

/// One schema shared by the three indices
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    schema_builder.add_text_field(DOC_ID, STRING | STORED);
    schema_builder.add_text_field(TABLE_NAME, STRING | STORED);
    schema_builder.add_text_field(COLUMN_NAME, STRING | STORED);
    schema_builder.add_bool_field(ENABLED, INDEXED | STORED);
    schema_builder.add_u64_field(FREQUENCY, INDEXED | STORED | FAST);

    for attr in TextAttr::iter() {
        schema_builder.add_text_field(&attr.field_name(), text_options("default", true));
        schema_builder.add_text_field(&attr.ngram_field_name(), text_options(NGRAM_TOKENIZER, false));
        schema_builder.add_text_field(&attr.exact_field_name(), text_options(EXACT_TOKENIZER, false));
    }

    // Serialized CandidateRecord, returned with every hit
    schema_builder.add_text_field(PAYLOAD, STORED);

    schema_builder.build()
}

/// Tokenizers are per `Index` handle and must be registered on every open.
pub fn register_tokenizers(index: &Index) -> SearchResult<()> {
    let ngram = NgramTokenizer::new(1, 2, false)
        .map_err(|e| SearchError::IndexInitFailed(format!("ngram tokenizer: {}", e)))?;
    index.tokenizers().register(
        NGRAM_TOKENIZER,
        TextAnalyzer::builder(ngram).filter(LowerCaser).build(),
    );
    index.tokenizers().register(
        EXACT_TOKENIZER,
        TextAnalyzer::builder(RawTokenizer::default())
            .filter(LowerCaser)
            .build(),
    );
    Ok(())
}

/// Backend-neutral document handed to the full-text adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub doc_id: String,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub enabled: bool,
    pub frequency: u64,
    pub texts: Vec<(TextAttr, String)>,
    pub record: CandidateRecord,
}

impl IndexDocument {
    fn new(record: CandidateRecord) -> Self {
        Self {
            doc_id: record.id().to_string(),
            table_name: None,
            column_name: None,
            enabled: true,
            frequency: 0,
            texts: Vec::new(),
            record,
        }
    }

    fn text(mut self, attr: TextAttr, value: &str) -> Self {
        let value = value.trim();
        if !value.is_empty() {
            self.texts.push((attr, value.to_string()));
        }
        self
    }

    fn texts<'a>(mut self, attr: TextAttr, values: impl IntoIterator<Item = &'a String>) -> Self {
        for value in values {
            self = self.text(attr, value);
        }
        self
    }

    /// Convert to Tantivy document. Fails when the record cannot be
    /// serialized, rather than storing a hit that cannot be read back.
    pub fn to_tantivy_doc(&self, schema: &Schema) -> SearchResult<TantivyDocument> {
        let payload = serde_json::to_string(&self.record).map_err(|e| {
            SearchError::IndexingFailed(format!("Failed to serialize {}: {}", self.doc_id, e))
        })?;
        let mut doc = TantivyDocument::new();

        if let Ok(field) = schema.get_field(DOC_ID) {
            doc.add_text(field, &self.doc_id);
        }
        if let (Some(table), Ok(field)) = (&self.table_name, schema.get_field(TABLE_NAME)) {
            doc.add_text(field, table);
        }
        if let (Some(column), Ok(field)) = (&self.column_name, schema.get_field(COLUMN_NAME)) {
            doc.add_text(field, column);
        }
        if let Ok(field) = schema.get_field(ENABLED) {
            doc.add_bool(field, self.enabled);
        }
        if let Ok(field) = schema.get_field(FREQUENCY) {
            doc.add_u64(field, self.frequency);
        }

        for (attr, value) in &self.texts {
            for name in [attr.field_name(), attr.ngram_field_name(), attr.exact_field_name()] {
                if let Ok(field) = schema.get_field(&name) {
                    doc.add_text(field, value);
                }
            }
        }

        let field = schema
            .get_field(PAYLOAD)
            .map_err(|e| SearchError::IndexingFailed(format!("missing payload field: {}", e)))?;
        doc.add_text(field, payload);

        Ok(doc)
    }
}

impl From<&FieldRecord> for IndexDocument {
    fn from(field: &FieldRecord) -> Self {
        let mut doc = IndexDocument::new(CandidateRecord::from(field.clone()))
            .text(TextAttr::Name, &field.display_name)
            .texts(TextAttr::Alias, &field.aliases)
            .text(TextAttr::Column, &field.column_name)
            .text(TextAttr::Description, &field.description);
        doc.table_name = Some(field.table_name.clone());
        doc.column_name = Some(field.column_name.clone());
        doc.enabled = field.enabled;
        doc
    }
}

impl From<&MetricRecord> for IndexDocument {
    fn from(metric: &MetricRecord) -> Self {
        IndexDocument::new(CandidateRecord::from(metric.clone()))
            .text(TextAttr::Name, &metric.name)
            .texts(TextAttr::Alias, &metric.aliases)
            .text(TextAttr::Description, &metric.business_definition)
            .texts(TextAttr::Description, &metric.related_entities)
    }
}

impl From<&DimensionValueRecord> for IndexDocument {
    fn from(record: &DimensionValueRecord) -> Self {
        let mut doc = IndexDocument::new(CandidateRecord::from(record.clone()))
            .text(TextAttr::Value, &record.value);
        doc.table_name = Some(record.field.table_name.clone());
        doc.column_name = Some(record.field.column_name.clone());
        doc.enabled = record.field.enabled;
        doc.frequency = record.frequency;
        doc
    }
}
