//! Search query building

use crate::search::config::Analyzer;
use crate::search::document::{TextAttr, COLUMN_NAME, ENABLED, NGRAM_TOKENIZER, TABLE_NAME};
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tantivy::query::{BooleanQuery, BoostQuery, ConstScoreQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{IndexRecordOption, Schema};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, Term};

/// Search filter options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFilter {
    /// Restrict to these tables
    #[serde(default)]
    pub table_names: Option<Vec<String>>,

    /// Restrict to one column name
    #[serde(default)]
    pub column_name: Option<String>,

    /// Skip disabled fields
    #[serde(default = "default_enabled_only")]
    pub enabled_only: bool,
}

fn default_enabled_only() -> bool {
    true
}

impl Default for SearchFilter {
    fn default() -> Self {
        Self {
            table_names: None,
            column_name: None,
            enabled_only: true,
        }
    }
}

impl SearchFilter {
    pub fn any() -> Self {
        Self {
            enabled_only: false,
            ..Default::default()
        }
    }

    pub fn with_tables(mut self, tables: Vec<impl Into<String>>) -> Self {
        self.table_names = Some(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Same predicate as the index-side filter, for in-memory engines.
    pub fn accepts(&self, table: Option<&str>, column: Option<&str>, enabled: bool) -> bool {
        if self.enabled_only && !enabled {
            return false;
        }
        if let Some(tables) = &self.table_names {
            match table {
                Some(t) if tables.iter().any(|x| x == t) => {}
                _ => return false,
            }
        }
        if let Some(wanted) = &self.column_name {
            if column != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }
}

/// A single full-text lookup against one index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullTextQuery {
    pub text: String,
    pub filters: SearchFilter,
    /// `false` requests whole-value keyword matching
    pub tokenize: bool,
    pub analyzer: Analyzer,
    pub limit: usize,
    /// Collect the most frequent matches first, relevance breaking ties
    #[serde(default)]
    pub by_frequency: bool,
}

impl FullTextQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filters: SearchFilter::default(),
            tokenize: true,
            analyzer: Analyzer::Standard,
            limit: 10,
            by_frequency: false,
        }
    }

    pub fn with_filters(mut self, filters: SearchFilter) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_tokenize(mut self, tokenize: bool) -> Self {
        self.tokenize = tokenize;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_frequency_order(mut self) -> Self {
        self.by_frequency = true;
        self
    }
}

/// Query builder for constructing Tantivy queries
pub struct QueryBuilder<'a> {
    schema: &'a Schema,
    index: &'a Index,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a Schema, index: &'a Index) -> Self {
        Self { schema, index }
    }

    pub fn build(&self, query: &FullTextQuery) -> SearchResult<Box<dyn Query>> {
        let text = query.text.trim();
        if text.is_empty() {
            return Err(SearchError::InvalidRequest("query text is empty".to_string()));
        }

        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();

        // Whole-value matches always count; tokenized matching adds recall
        let exact = self.exact_query(text)?;
        if query.tokenize {
            let relevance = match query.analyzer {
                Analyzer::Standard => self.standard_query(text)?,
                Analyzer::Ngram => self.ngram_query(text)?,
            };
            let mut either: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Should, relevance)];
            either.push((Occur::Should, Box::new(BoostQuery::new(exact, 2.0))));
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(either))));
        } else {
            clauses.push((Occur::Must, exact));
        }

        for filter in self.filter_queries(&query.filters)? {
            clauses.push((Occur::Must, Box::new(ConstScoreQuery::new(filter, 0.0))));
        }

        if clauses.len() == 1 {
            let (_, only) = clauses.remove(0);
            Ok(only)
        } else {
            Ok(Box::new(BooleanQuery::new(clauses)))
        }
    }

    fn field(&self, name: &str) -> SearchResult<tantivy::schema::Field> {
        self.schema
            .get_field(name)
            .map_err(|e| SearchError::IndexInitFailed(format!("missing field {}: {}", name, e)))
    }

    fn exact_query(&self, text: &str) -> SearchResult<Box<dyn Query>> {
        let term_text = text.to_lowercase();
        let mut should: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for attr in TextAttr::iter() {
            let field = self.field(&attr.exact_field_name())?;
            let term = TermQuery::new(
                Term::from_field_text(field, &term_text),
                IndexRecordOption::WithFreqs,
            );
            should.push((Occur::Should, Box::new(BoostQuery::new(Box::new(term), attr.boost()))));
        }
        Ok(Box::new(BooleanQuery::new(should)))
    }

    fn standard_query(&self, text: &str) -> SearchResult<Box<dyn Query>> {
        let mut fields = Vec::new();
        for attr in TextAttr::iter() {
            fields.push((self.field(&attr.field_name())?, attr.boost()));
        }

        let mut parser = QueryParser::for_index(self.index, fields.iter().map(|(f, _)| *f).collect());
        for (field, boost) in &fields {
            parser.set_field_boost(*field, *boost);
        }
        let (parsed, errors) = parser.parse_query_lenient(text);
        if !errors.is_empty() {
            tracing::debug!(query = text, errors = errors.len(), "Lenient query parse");
        }
        Ok(parsed)
    }

    fn ngram_query(&self, text: &str) -> SearchResult<Box<dyn Query>> {
        let mut analyzer = self
            .index
            .tokenizers()
            .get(NGRAM_TOKENIZER)
            .ok_or_else(|| SearchError::IndexInitFailed("ngram tokenizer not registered".into()))?;

        let mut grams: Vec<String> = Vec::new();
        let mut stream = analyzer.token_stream(text);
        while stream.advance() {
            let gram = stream.token().text.clone();
            if !grams.contains(&gram) {
                grams.push(gram);
            }
        }

        let mut should: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for attr in TextAttr::iter() {
            let field = self.field(&attr.ngram_field_name())?;
            for gram in &grams {
                let term = TermQuery::new(
                    Term::from_field_text(field, gram),
                    IndexRecordOption::WithFreqs,
                );
                should.push((Occur::Should, Box::new(BoostQuery::new(Box::new(term), attr.boost()))));
            }
        }
        Ok(Box::new(BooleanQuery::new(should)))
    }

    fn filter_queries(&self, filters: &SearchFilter) -> SearchResult<Vec<Box<dyn Query>>> {
        let mut out: Vec<Box<dyn Query>> = Vec::new();

        if let Some(tables) = &filters.table_names {
            let field = self.field(TABLE_NAME)?;
            let any_table: Vec<(Occur, Box<dyn Query>)> = tables
                .iter()
                .map(|t| {
                    let q: Box<dyn Query> = Box::new(TermQuery::new(
                        Term::from_field_text(field, t),
                        IndexRecordOption::Basic,
                    ));
                    (Occur::Should, q)
                })
                .collect();
            out.push(Box::new(BooleanQuery::new(any_table)));
        }

        if let Some(column) = &filters.column_name {
            let field = self.field(COLUMN_NAME)?;
            out.push(Box::new(TermQuery::new(
                Term::from_field_text(field, column),
                IndexRecordOption::Basic,
            )));
        }

        if filters.enabled_only {
            let field = self.field(ENABLED)?;
            out.push(Box::new(TermQuery::new(
                Term::from_field_bool(field, true),
                IndexRecordOption::Basic,
            )));
        }

        Ok(out)
    }
}
