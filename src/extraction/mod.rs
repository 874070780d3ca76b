//! Dimension value extraction from source databases

mod config;
mod extractor;

pub use config::ExtractionConfig;
pub use extractor::{
    normalize_values, DimensionExtractor, Extraction, FieldCheck, FieldValidation, SourceHealth,
};
