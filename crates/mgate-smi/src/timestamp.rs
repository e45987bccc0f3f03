//! Timestamp display formats
//!
//! A timestamp feature chooses its wire rendering through the
//! `display-format` option: the fixed 8-byte DateAndTime encoding
//! (option value `rfc1903`), a free-form strftime pattern, or RFC 3339
//! text when the option is absent.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

use crate::error::{ConvError, ConvResult};

/// Option key selecting the timestamp rendering
pub const DISPLAY_FORMAT_OPTION: &str = "display-format";

/// Option value selecting the fixed DateAndTime encoding
pub const RFC1903_FORMAT: &str = "rfc1903";

/// How a timestamp value is carried in an octet string
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// RFC 3339 text
    #[default]
    Rfc3339,
    /// Fixed 8-byte DateAndTime encoding
    DateAndTime,
    /// Free-form strftime pattern
    Pattern(String),
}

impl TimestampFormat {
    /// Resolve the format from a feature's options map
    pub fn from_options(options: &BTreeMap<String, String>) -> Self {
        match options.get(DISPLAY_FORMAT_OPTION).map(String::as_str) {
            None => TimestampFormat::Rfc3339,
            Some(RFC1903_FORMAT) => TimestampFormat::DateAndTime,
            Some(pattern) => TimestampFormat::Pattern(pattern.to_string()),
        }
    }

    /// Render a timestamp to its octet-string payload
    pub fn encode(&self, ts: &DateTime<Utc>) -> Vec<u8> {
        match self {
            TimestampFormat::Rfc3339 => ts.to_rfc3339().into_bytes(),
            TimestampFormat::Pattern(pattern) => ts.format(pattern).to_string().into_bytes(),
            TimestampFormat::DateAndTime => {
                let year = ts.year().clamp(0, u16::MAX as i32) as u16;
                let mut bytes = Vec::with_capacity(8);
                bytes.extend_from_slice(&year.to_be_bytes());
                bytes.push(ts.month() as u8);
                bytes.push(ts.day() as u8);
                bytes.push(ts.hour() as u8);
                bytes.push(ts.minute() as u8);
                bytes.push(ts.second() as u8);
                // Deci-seconds
                bytes.push((ts.nanosecond() / 100_000_000) as u8);
                bytes
            }
        }
    }

    /// Parse an octet-string payload back into a timestamp
    pub fn decode(&self, bytes: &[u8]) -> ConvResult<DateTime<Utc>> {
        match self {
            TimestampFormat::Rfc3339 => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| ConvError::InvalidTimestamp("not valid UTF-8".into()))?;
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| ConvError::InvalidTimestamp(format!("{}: '{}'", e, text)))
            }
            TimestampFormat::Pattern(pattern) => {
                let text = std::str::from_utf8(bytes)
                    .map_err(|_| ConvError::InvalidTimestamp("not valid UTF-8".into()))?;
                chrono::NaiveDateTime::parse_from_str(text, pattern)
                    .map(|dt| Utc.from_utc_datetime(&dt))
                    .map_err(|e| ConvError::InvalidTimestamp(format!("{}: '{}'", e, text)))
            }
            TimestampFormat::DateAndTime => {
                // 8 bytes local form; the 11-byte form with a timezone
                // offset is accepted and the offset ignored (values are UTC)
                if bytes.len() != 8 && bytes.len() != 11 {
                    return Err(ConvError::InvalidTimestamp(format!(
                        "DateAndTime payload must be 8 or 11 bytes, got {}",
                        bytes.len()
                    )));
                }
                let year = u16::from_be_bytes([bytes[0], bytes[1]]) as i32;
                let deci = bytes[7] as u32;
                Utc.with_ymd_and_hms(
                    year,
                    bytes[2] as u32,
                    bytes[3] as u32,
                    bytes[4] as u32,
                    bytes[5] as u32,
                    bytes[6] as u32,
                )
                .single()
                .map(|dt| dt + chrono::Duration::milliseconds(deci as i64 * 100))
                .ok_or_else(|| {
                    ConvError::InvalidTimestamp("DateAndTime fields out of range".into())
                })
            }
        }
    }
}
