//! Timestamps as emitted by the simulation process.
//!
//! The protocol only promises a string. Known date-time layouts are parsed;
//! anything else is kept verbatim so the event carrying it still counts.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
];
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Error, PartialEq)]
#[error("unrecognized timestamp '{0}'")]
pub struct TimestampError(pub String);

/// A bar timestamp. Offsets are normalized to UTC and dropped; text in no
/// known layout is carried as `Raw`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Timestamp {
    Parsed(NaiveDateTime),
    Raw(String),
}

impl Timestamp {
    /// Parse `s`, falling back to the raw text.
    pub fn lenient(s: &str) -> Self {
        s.parse().unwrap_or_else(|_| Self::Raw(s.trim().to_string()))
    }
}

impl FromStr for Timestamp {
    type Err = TimestampError;

    /// Strict parse: fails on text in no known layout.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(Self::Parsed(dt.naive_utc()));
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
                return Ok(Self::Parsed(dt.naive_utc()));
            }
        }
        for fmt in NAIVE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Ok(Self::Parsed(dt));
            }
        }
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Self::Parsed)
            .ok_or_else(|| TimestampError(s.to_string()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parsed(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
            Self::Raw(raw) => f.write_str(raw),
        }
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Parsed(dt) => serializer.collect_str(&dt.format("%Y-%m-%dT%H:%M:%S%.f")),
            Self::Raw(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::lenient(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_space_separated() {
        let ts: Timestamp = "2024-01-02 15:30:00".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 15:30:00");
    }

    #[test]
    fn parses_iso_with_fraction() {
        let ts: Timestamp = "2024-01-02T15:30:00.250".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 15:30:00");
    }

    #[test]
    fn parses_rfc3339_to_utc() {
        let ts: Timestamp = "2024-01-02T10:00:00+02:00".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 08:00:00");
    }

    #[test]
    fn parses_offset_without_colon() {
        let ts: Timestamp = "2024-01-02T00:00:00+0000".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 00:00:00");
    }

    #[test]
    fn parses_bare_and_slashed_dates() {
        let ts: Timestamp = "2024-01-02".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 00:00:00");
        let ts: Timestamp = "2024/01/02".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-01-02 00:00:00");
    }

    #[test]
    fn strict_parse_rejects_garbage() {
        assert!("yesterday".parse::<Timestamp>().is_err());
    }

    #[test]
    fn unknown_layout_is_kept_verbatim() {
        let ts: Timestamp = serde_json::from_str("\"1704153600\"").unwrap();
        assert_eq!(ts, Timestamp::Raw("1704153600".into()));
        assert_eq!(ts.to_string(), "1704153600");
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"1704153600\"");
    }

    #[test]
    fn non_string_is_rejected() {
        assert!(serde_json::from_str::<Timestamp>("1704153600").is_err());
    }

    #[test]
    fn serde_roundtrip_keeps_value() {
        let ts: Timestamp = "2024-03-04 05:06:07".parse().unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(ts, back);
    }
}
