//! Managed-value to wire-value conversion
//!
//! Dispatch is by semantic-type category over a closed table of unit
//! mappers, one per category, resolved at compile time. The forward
//! direction is total: a category the wire cannot carry natively falls back
//! to its JSON text as an octet string instead of failing. The mapper holds
//! no state and is safe for concurrent use without locking.

use mgate_core::types::{ManagedType, ManagedValue};

use crate::error::{ConvError, ConvResult};
use crate::timestamp::TimestampFormat;
use crate::types::SmiValue;

/// Convert a managed value to its wire form under a declared semantic type.
///
/// Values that do not match the declared category fall back to their text
/// rendering rather than failing.
pub fn to_wire(value: &ManagedValue, ty: &ManagedType, format: &TimestampFormat) -> SmiValue {
    mapper_for(ty).to_wire(value, format)
}

/// Convert a wire value back into a managed value of the declared type
pub fn from_wire(
    wire: &SmiValue,
    ty: &ManagedType,
    format: &TimestampFormat,
) -> ConvResult<ManagedValue> {
    mapper_for(ty).from_wire(wire, ty, format)
}

/// Per-category converter. Implementations are stateless unit structs.
trait CategoryMapper: Sync {
    fn to_wire(&self, value: &ManagedValue, format: &TimestampFormat) -> SmiValue;

    fn from_wire(
        &self,
        wire: &SmiValue,
        ty: &ManagedType,
        format: &TimestampFormat,
    ) -> ConvResult<ManagedValue>;
}

/// Resolve the converter for a semantic-type category
fn mapper_for(ty: &ManagedType) -> &'static dyn CategoryMapper {
    match ty {
        ManagedType::Bool => &BoolMapper,
        ManagedType::Int8 | ManagedType::Int16 | ManagedType::Int32 => &IntMapper,
        ManagedType::Int64 => &Int64Mapper,
        ManagedType::Float32 | ManagedType::Float64 => &FloatMapper,
        ManagedType::Decimal => &DecimalMapper,
        ManagedType::String => &StringMapper,
        ManagedType::Timestamp => &TimestampMapper,
        ManagedType::Array { .. } | ManagedType::Table { .. } => &JsonMapper,
    }
}

/// Fallback used by every mapper when the value does not belong to its
/// category: render as text, never fail
fn text_fallback(value: &ManagedValue) -> SmiValue {
    SmiValue::text(value.to_string())
}

/// Booleans as TruthValue: 1 = true, 2 = false
struct BoolMapper;

impl CategoryMapper for BoolMapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::Bool(true) => SmiValue::Integer(1),
            ManagedValue::Bool(false) => SmiValue::Integer(2),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        _ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        match wire {
            SmiValue::Integer(1) => Ok(ManagedValue::Bool(true)),
            SmiValue::Integer(0) | SmiValue::Integer(2) => Ok(ManagedValue::Bool(false)),
            SmiValue::Integer(v) => Err(ConvError::InvalidData(format!(
                "TruthValue must be 1 or 2, got {}",
                v
            ))),
            other => Err(ConvError::unrepresentable(other.smi_type(), "bool")),
        }
    }
}

/// Fixed-width integers up to 32 bits ride on INTEGER, with the narrower
/// widths bounds-checked on the way back
struct IntMapper;

impl CategoryMapper for IntMapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::Int8(v) => SmiValue::Integer(*v as i32),
            ManagedValue::Int16(v) => SmiValue::Integer(*v as i32),
            ManagedValue::Int32(v) => SmiValue::Integer(*v),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        let raw: i64 = match wire {
            SmiValue::Integer(v) => *v as i64,
            SmiValue::Gauge32(v) => *v as i64,
            other => return Err(ConvError::unrepresentable(other.smi_type(), ty)),
        };
        match ty {
            ManagedType::Int8 => i8::try_from(raw).map(ManagedValue::Int8).map_err(|_| {
                ConvError::OutOfRange {
                    value: raw,
                    ty: ty.to_string(),
                }
            }),
            ManagedType::Int16 => i16::try_from(raw).map(ManagedValue::Int16).map_err(|_| {
                ConvError::OutOfRange {
                    value: raw,
                    ty: ty.to_string(),
                }
            }),
            _ => i32::try_from(raw).map(ManagedValue::Int32).map_err(|_| {
                ConvError::OutOfRange {
                    value: raw,
                    ty: ty.to_string(),
                }
            }),
        }
    }
}

/// 64-bit integers ride on Counter64 through a lossless cast
struct Int64Mapper;

impl CategoryMapper for Int64Mapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::Int64(v) => SmiValue::Counter64(*v as u64),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        _ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        match wire {
            SmiValue::Counter64(v) => Ok(ManagedValue::Int64(*v as i64)),
            SmiValue::Integer(v) => Ok(ManagedValue::Int64(*v as i64)),
            SmiValue::Gauge32(v) => Ok(ManagedValue::Int64(*v as i64)),
            other => Err(ConvError::unrepresentable(other.smi_type(), "int64")),
        }
    }
}

/// Floats have no native wire form and travel as decimal text
struct FloatMapper;

impl CategoryMapper for FloatMapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::Float32(v) => SmiValue::text(v.to_string()),
            ManagedValue::Float64(v) => SmiValue::text(v.to_string()),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        let text = wire
            .as_text()
            .ok_or_else(|| ConvError::unrepresentable(wire.smi_type(), ty))?;
        match ty {
            ManagedType::Float32 => text
                .parse::<f32>()
                .map(ManagedValue::Float32)
                .map_err(|_| ConvError::InvalidData(format!("not a float32: '{}'", text))),
            _ => text
                .parse::<f64>()
                .map(ManagedValue::Float64)
                .map_err(|_| ConvError::InvalidData(format!("not a float64: '{}'", text))),
        }
    }
}

/// Arbitrary-precision decimals pass through as text, preserving every digit
struct DecimalMapper;

impl CategoryMapper for DecimalMapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::Decimal(v) => SmiValue::text(v.clone()),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        _ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        let text = wire
            .as_text()
            .ok_or_else(|| ConvError::unrepresentable(wire.smi_type(), "decimal"))?;
        if text.is_empty() {
            return Err(ConvError::InvalidData("empty decimal".into()));
        }
        Ok(ManagedValue::Decimal(text.to_string()))
    }
}

struct StringMapper;

impl CategoryMapper for StringMapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::String(v) => SmiValue::text(v.clone()),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        _ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        match wire {
            SmiValue::OctetString(bytes) => std::str::from_utf8(bytes)
                .map(|s| ManagedValue::String(s.to_string()))
                .map_err(|_| ConvError::InvalidData("octet string is not UTF-8".into())),
            other => Err(ConvError::unrepresentable(other.smi_type(), "string")),
        }
    }
}

/// Timestamps are rendered per the feature's display-format option
struct TimestampMapper;

impl CategoryMapper for TimestampMapper {
    fn to_wire(&self, value: &ManagedValue, format: &TimestampFormat) -> SmiValue {
        match value {
            ManagedValue::Timestamp(ts) => SmiValue::OctetString(format.encode(ts)),
            other => text_fallback(other),
        }
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        _ty: &ManagedType,
        format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        match wire {
            SmiValue::OctetString(bytes) => {
                format.decode(bytes).map(ManagedValue::Timestamp)
            }
            other => Err(ConvError::unrepresentable(other.smi_type(), "timestamp")),
        }
    }
}

/// Tables and arrays have no scalar wire form; whole-value conversion rides
/// on their JSON rendering. Cell-wise conversion is the table cache's job.
struct JsonMapper;

impl CategoryMapper for JsonMapper {
    fn to_wire(&self, value: &ManagedValue, _format: &TimestampFormat) -> SmiValue {
        text_fallback(value)
    }

    fn from_wire(
        &self,
        wire: &SmiValue,
        ty: &ManagedType,
        _format: &TimestampFormat,
    ) -> ConvResult<ManagedValue> {
        let text = wire
            .as_text()
            .ok_or_else(|| ConvError::unrepresentable(wire.smi_type(), ty))?;
        let value: ManagedValue = serde_json::from_str(text)
            .map_err(|e| ConvError::InvalidData(format!("not a JSON value: {}", e)))?;
        if !value.matches(ty) {
            return Err(ConvError::unrepresentable("json value", ty));
        }
        Ok(value)
    }
}
