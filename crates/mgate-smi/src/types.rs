//! SMI wire values
//!
//! The fixed-width, protocol-native value forms a scalar or table cell can
//! take on the wire.

use serde::{Deserialize, Serialize};

/// A wire-level SMI value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmiValue {
    /// Signed 32-bit INTEGER
    Integer(i32),
    /// Unsigned 32-bit gauge
    Gauge32(u32),
    /// Unsigned 64-bit counter
    Counter64(u64),
    /// Opaque byte string (also carries text)
    OctetString(Vec<u8>),
    /// Absent value
    Null,
}

/// Tag of an [`SmiValue`], used for type checks on writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmiType {
    Integer,
    Gauge32,
    Counter64,
    OctetString,
    Null,
}

impl SmiValue {
    /// Build an octet string from text
    pub fn text(s: impl Into<String>) -> Self {
        SmiValue::OctetString(s.into().into_bytes())
    }

    pub fn smi_type(&self) -> SmiType {
        match self {
            SmiValue::Integer(_) => SmiType::Integer,
            SmiValue::Gauge32(_) => SmiType::Gauge32,
            SmiValue::Counter64(_) => SmiType::Counter64,
            SmiValue::OctetString(_) => SmiType::OctetString,
            SmiValue::Null => SmiType::Null,
        }
    }

    /// Octet-string payload interpreted as UTF-8, if that is what it is
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SmiValue::OctetString(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for SmiType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SmiType::Integer => "integer",
            SmiType::Gauge32 => "gauge32",
            SmiType::Counter64 => "counter64",
            SmiType::OctetString => "octet_string",
            SmiType::Null => "null",
        };
        f.write_str(s)
    }
}

impl std::fmt::Display for SmiValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SmiValue::Integer(v) => write!(f, "{}", v),
            SmiValue::Gauge32(v) => write!(f, "{}", v),
            SmiValue::Counter64(v) => write!(f, "{}", v),
            SmiValue::OctetString(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => f.write_str(s),
                Err(_) => f.write_str(&hex::encode(bytes)),
            },
            SmiValue::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_helpers() {
        let v = SmiValue::text("hello");
        assert_eq!(v.as_text(), Some("hello"));
        assert_eq!(v.smi_type(), SmiType::OctetString);
        assert_eq!(v.to_string(), "hello");
    }

    #[test]
    fn test_binary_octets_display_as_hex() {
        let v = SmiValue::OctetString(vec![0xde, 0xad, 0xff]);
        assert_eq!(v.to_string(), "deadff");
    }
}
