use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque identifier correlating one entry event with its exit events.
///
/// The protocol may send a ref as a JSON string or an integer; both normalize
/// to the same textual form, so `7` and `"7"` name the same trade.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TradeRef(pub String);

impl TradeRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which a retired record of this ref is archived when the ref is
    /// reused after full closure. Generations start at 1.
    pub fn generation(&self, n: usize) -> Self {
        Self(format!("{}#{n}", self.0))
    }
}

impl fmt::Display for TradeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TradeRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for TradeRef {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl<'de> Deserialize<'de> for TradeRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;
        use serde_json::Value;

        match Value::deserialize(deserializer)? {
            Value::String(s) if !s.is_empty() => Ok(Self(s)),
            Value::Number(n) => Ok(Self(n.to_string())),
            other => Err(D::Error::custom(format!(
                "trade ref must be a non-empty string or a number, got {other}"
            ))),
        }
    }
}
