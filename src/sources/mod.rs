//! Upstream boundaries: metadata definitions and relational sources

mod api;
mod error;
mod metadata;
mod relational;

pub use api::{ApiMetadataSource, MetadataApiConfig};
pub use error::{SourceError, SourceResult};
pub use metadata::{
    decode_fields, decode_metrics, FieldTypeRules, Loaded, MetadataSource, RawField, RawMetric,
    RejectedRecord, StaticMetadataSource, UnknownFieldType,
};
pub use relational::{Dialect, RelationalSource, SqlSource};
