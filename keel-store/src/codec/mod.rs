//! Entity Codec
//!
//! Conversion between domain values and storage rows. Each persisted type
//! implements [`Entity`]; the generic engine only ever talks to rows through
//! that trait, so per-entity validation and payload compression stay with
//! the entity.

pub mod zlib;

use crate::backend::{Column, Row, Value};
use crate::error::{Result, StoreError};
use crate::repository::Sort;

/// Surrogate key column shared by every table
pub const ID: Column = Column::int("id");

/// A domain type the generic engine can persist
pub trait Entity: Clone + Send + Sync + Sized + 'static {
    /// Singular name used in errors and logs
    const KIND: &'static str;

    const TABLE: &'static str;

    /// Every stored column except [`ID`], in insert order
    const COLUMNS: &'static [Column];

    /// Natural ordering of list queries
    const ORDER: &'static [Sort];

    fn id(&self) -> i64;

    fn set_id(&mut self, id: i64);

    /// Check required fields, failing on the first one that is missing
    fn validate(&self) -> Result<()>;

    /// Storage representation; must contain a value for every column
    fn to_row(&self, codec: &Codec) -> Result<Row>;

    fn from_row(row: RowReader, codec: &Codec) -> Result<Self>;
}

/// Columns fetched for `E`, surrogate key first
pub fn select_columns<E: Entity>() -> Vec<Column> {
    std::iter::once(ID).chain(E::COLUMNS.iter().copied()).collect()
}

// =============================================================================
// Codec
// =============================================================================

/// Payload encoding settings shared by all entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codec {
    compression_level: u32,
}

impl Codec {
    pub fn new(compression_level: u32) -> Self {
        Self {
            compression_level: compression_level.min(9),
        }
    }

    pub fn compression_level(&self) -> u32 {
        self.compression_level
    }

    /// Compress a payload column; empty payloads are stored empty
    pub fn compress(
        &self,
        entity: &'static str,
        column: &'static str,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        zlib::compress(data, self.compression_level)
            .map_err(|e| StoreError::corrupt(entity, column, e))
    }

    /// Inverse of [`Codec::compress`]
    pub fn decompress(
        &self,
        entity: &'static str,
        column: &'static str,
        data: &[u8],
    ) -> Result<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        zlib::decompress(data).map_err(|e| StoreError::corrupt(entity, column, e))
    }
}

impl Default for Codec {
    fn default() -> Self {
        Self::new(zlib::DEFAULT_LEVEL)
    }
}

// =============================================================================
// Row Reader
// =============================================================================

/// Typed access to the columns of a fetched row
///
/// Each accessor consumes its column. A missing column or a value of the
/// wrong type is reported as corrupt data for the entity being decoded.
#[derive(Debug)]
pub struct RowReader {
    entity: &'static str,
    row: Row,
}

impl RowReader {
    pub fn new(entity: &'static str, row: Row) -> Self {
        Self { entity, row }
    }

    fn take(&mut self, column: &'static str) -> Result<Value> {
        self.row
            .take(column)
            .ok_or_else(|| StoreError::corrupt(self.entity, column, "column missing from row"))
    }

    fn mismatch(&self, column: &'static str, expected: &str, got: &Value) -> StoreError {
        StoreError::corrupt(self.entity, column, format!("expected {expected}, got {got:?}"))
    }

    pub fn int(&mut self, column: &'static str) -> Result<i64> {
        match self.take(column)? {
            Value::Int(v) => Ok(v),
            other => Err(self.mismatch(column, "integer", &other)),
        }
    }

    pub fn text(&mut self, column: &'static str) -> Result<String> {
        match self.take(column)? {
            Value::Text(v) => Ok(v),
            other => Err(self.mismatch(column, "text", &other)),
        }
    }

    pub fn bool(&mut self, column: &'static str) -> Result<bool> {
        match self.take(column)? {
            Value::Bool(v) => Ok(v),
            Value::Int(v) => Ok(v != 0),
            other => Err(self.mismatch(column, "boolean", &other)),
        }
    }

    pub fn bytes(&mut self, column: &'static str) -> Result<Vec<u8>> {
        match self.take(column)? {
            Value::Bytes(v) => Ok(v),
            other => Err(self.mismatch(column, "bytes", &other)),
        }
    }

    pub fn list(&mut self, column: &'static str) -> Result<Vec<String>> {
        match self.take(column)? {
            Value::List(v) => Ok(v),
            other => Err(self.mismatch(column, "string list", &other)),
        }
    }

    /// Deserialize a JSON column into `T`
    pub fn json<T: serde::de::DeserializeOwned>(&mut self, column: &'static str) -> Result<T> {
        match self.take(column)? {
            Value::Json(v) => {
                serde_json::from_value(v).map_err(|e| StoreError::corrupt(self.entity, column, e))
            }
            other => Err(self.mismatch(column, "json", &other)),
        }
    }

    /// Parse a text column through `FromStr`
    pub fn parse<T>(&mut self, column: &'static str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        let text = self.text(column)?;
        text.parse()
            .map_err(|e: T::Err| StoreError::corrupt(self.entity, column, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload_is_stored_empty() {
        let codec = Codec::default();
        assert!(codec.compress("pipeline", "data", b"").unwrap().is_empty());
        assert!(codec.decompress("pipeline", "data", b"").unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_payload_is_distinct_from_not_found() {
        let codec = Codec::default();
        let err = codec.decompress("pipeline", "data", b"garbage").unwrap_err();

        assert!(matches!(
            err,
            StoreError::CorruptData {
                entity: "pipeline",
                column: "data",
                ..
            }
        ));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_level_is_clamped() {
        assert_eq!(Codec::new(42).compression_level(), 9);
    }

    #[test]
    fn test_reader_reports_type_mismatch() {
        let row = Row::new().with("number", "seven");
        let mut reader = RowReader::new("build", row);

        let err = reader.int("number").unwrap_err();
        assert!(matches!(err, StoreError::CorruptData { column: "number", .. }));
    }

    #[test]
    fn test_reader_reports_missing_column() {
        let mut reader = RowReader::new("build", Row::new());
        assert!(reader.text("branch").is_err());
    }

    #[test]
    fn test_reader_accepts_integer_booleans() {
        let row = Row::new().with("steps", 1i64).with("stages", false);
        let mut reader = RowReader::new("pipeline", row);

        assert!(reader.bool("steps").unwrap());
        assert!(!reader.bool("stages").unwrap());
    }
}
