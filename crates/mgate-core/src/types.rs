//! Open type system for managed values
//!
//! A managed value is a raw value paired with its semantic type. Values are
//! constructed on each read and handed to a protocol mapper immediately;
//! they are never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic type of a managed value, independent of any wire encoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedType {
    /// Boolean flag
    Bool,
    /// Signed 8-bit integer
    Int8,
    /// Signed 16-bit integer
    Int16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 32-bit IEEE 754 float
    Float32,
    /// 64-bit IEEE 754 float
    Float64,
    /// Arbitrary-precision decimal, carried as text
    Decimal,
    /// UTF-8 string
    String,
    /// Point in time (UTC)
    Timestamp,
    /// Homogeneous 1D array
    Array { element: Box<ManagedType> },
    /// Row-oriented table with named, typed columns
    Table { columns: Vec<ColumnType> },
}

/// A single declared table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnType {
    /// Column name
    pub name: String,
    /// Cell type; tables do not nest
    #[serde(rename = "type")]
    pub ty: ManagedType,
}

impl ColumnType {
    pub fn new(name: impl Into<String>, ty: ManagedType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

impl ManagedType {
    /// Whether values of this type are served row-wise (table or array)
    pub fn is_tabular(&self) -> bool {
        matches!(self, ManagedType::Array { .. } | ManagedType::Table { .. })
    }

    /// Whether this is a single-valued type
    pub fn is_scalar(&self) -> bool {
        !self.is_tabular()
    }
}

impl std::fmt::Display for ManagedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedType::Bool => f.write_str("bool"),
            ManagedType::Int8 => f.write_str("int8"),
            ManagedType::Int16 => f.write_str("int16"),
            ManagedType::Int32 => f.write_str("int32"),
            ManagedType::Int64 => f.write_str("int64"),
            ManagedType::Float32 => f.write_str("float32"),
            ManagedType::Float64 => f.write_str("float64"),
            ManagedType::Decimal => f.write_str("decimal"),
            ManagedType::String => f.write_str("string"),
            ManagedType::Timestamp => f.write_str("timestamp"),
            ManagedType::Array { element } => write!(f, "array<{}>", element),
            ManagedType::Table { columns } => write!(f, "table[{} columns]", columns.len()),
        }
    }
}

/// A raw value drawn from the open type system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagedValue {
    Bool(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Decimal(String),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<ManagedValue>),
    Table(ManagedTable),
}

/// Row-oriented table value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ManagedTable {
    /// Column names, in declaration order
    pub columns: Vec<String>,
    /// Rows of cells; every row has one cell per column
    pub rows: Vec<Vec<ManagedValue>>,
}

impl ManagedValue {
    /// Check a value against a declared semantic type.
    ///
    /// Used to reject type-mismatched writes before they reach the resource.
    /// Array elements and table cells are checked recursively.
    pub fn matches(&self, ty: &ManagedType) -> bool {
        match (self, ty) {
            (ManagedValue::Bool(_), ManagedType::Bool) => true,
            (ManagedValue::Int8(_), ManagedType::Int8) => true,
            (ManagedValue::Int16(_), ManagedType::Int16) => true,
            (ManagedValue::Int32(_), ManagedType::Int32) => true,
            (ManagedValue::Int64(_), ManagedType::Int64) => true,
            (ManagedValue::Float32(_), ManagedType::Float32) => true,
            (ManagedValue::Float64(_), ManagedType::Float64) => true,
            (ManagedValue::Decimal(_), ManagedType::Decimal) => true,
            (ManagedValue::String(_), ManagedType::String) => true,
            (ManagedValue::Timestamp(_), ManagedType::Timestamp) => true,
            (ManagedValue::Array(items), ManagedType::Array { element }) => {
                items.iter().all(|item| item.matches(element))
            }
            (ManagedValue::Table(table), ManagedType::Table { columns }) => {
                table.rows.iter().all(|row| {
                    row.len() == columns.len()
                        && row.iter().zip(columns).all(|(cell, col)| cell.matches(&col.ty))
                })
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for ManagedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedValue::Bool(v) => write!(f, "{}", v),
            ManagedValue::Int8(v) => write!(f, "{}", v),
            ManagedValue::Int16(v) => write!(f, "{}", v),
            ManagedValue::Int32(v) => write!(f, "{}", v),
            ManagedValue::Int64(v) => write!(f, "{}", v),
            ManagedValue::Float32(v) => write!(f, "{}", v),
            ManagedValue::Float64(v) => write!(f, "{}", v),
            ManagedValue::Decimal(v) => f.write_str(v),
            ManagedValue::String(v) => f.write_str(v),
            ManagedValue::Timestamp(v) => f.write_str(&v.to_rfc3339()),
            // Composites render as JSON; debug form if the value is not
            // representable (non-finite floats)
            other => match serde_json::to_string(other) {
                Ok(json) => f.write_str(&json),
                Err(_) => write!(f, "{:?}", other),
            },
        }
    }
}
