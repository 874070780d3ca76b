use super::field::{FieldKey, FieldRecord};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic identity of a (table, column, value) triple.
///
/// Components are joined with the ASCII unit separator so that
/// `("a_b", "c")` and `("a", "b_c")` never collide.
pub fn value_hash(table_name: &str, column_name: &str, value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(table_name.as_bytes());
    hasher.update([0x1f]);
    hasher.update(column_name.as_bytes());
    hasher.update([0x1f]);
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// One distinct value of a dimension column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionValueRecord {
    pub value_hash: String,
    pub value: String,
    /// Occurrences in the source table at extraction time
    pub frequency: u64,
    /// Owning field, snapshotted at extraction time
    pub field: FieldRecord,
}

impl DimensionValueRecord {
    pub fn new(field: &FieldRecord, value: impl Into<String>, frequency: u64) -> Self {
        let value = value.into();
        Self {
            value_hash: value_hash(&field.table_name, &field.column_name, &value),
            value,
            frequency,
            field: field.clone(),
        }
    }

    pub fn field_key(&self) -> FieldKey {
        self.field.key()
    }
}
