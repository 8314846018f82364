//! TradeRecord: one opening fill plus the ordered exits that scale it out.

use super::ids::TradeRef;
use super::timestamp::Timestamp;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tolerance used when deciding whether exits cover the entry size.
const SIZE_EPSILON: f64 = 1e-9;

/// Direction of the opening fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "long" | "buy" => Ok(Self::Long),
            "short" | "sell" => Ok(Self::Short),
            other => Err(format!("unknown trade side '{other}'")),
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => write!(f, "long"),
            TradeSide::Short => write!(f, "short"),
        }
    }
}

impl<'de> Deserialize<'de> for TradeSide {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The opening fill of a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    #[serde(rename = "ref")]
    pub trade_ref: TradeRef,
    #[serde(rename = "datetime")]
    pub timestamp: Timestamp,
    pub price: f64,
    pub size: f64,
    pub value: f64,
    pub commission: f64,
    pub side: TradeSide,
}

/// A full or partial close of a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    #[serde(rename = "ref")]
    pub trade_ref: TradeRef,
    #[serde(rename = "datetime")]
    pub timestamp: Timestamp,
    pub price: f64,
    pub pnl: f64,
    #[serde(rename = "pnlcomm")]
    pub pnl_after_commission: f64,
    pub commission: f64,
    pub size: f64,
    #[serde(
        default,
        deserialize_with = "lenient_bars",
        skip_serializing_if = "Option::is_none"
    )]
    pub hold_bars: Option<i64>,
}

/// `hold_bars` is informational: integral floats are accepted and any other
/// value reads as absent rather than rejecting the exit.
fn lenient_bars<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        _ => None,
    })
}

/// One entry and its exits in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub entry: TradeEntry,
    pub exits: Vec<TradeExit>,
}

impl TradeRecord {
    pub fn open(entry: TradeEntry) -> Self {
        Self {
            entry,
            exits: Vec::new(),
        }
    }

    pub fn trade_ref(&self) -> &TradeRef {
        &self.entry.trade_ref
    }

    /// Commission-adjusted result of the trade: the last exit's `pnlcomm`.
    ///
    /// The simulator reports cumulative P&L on each exit, so the last exit
    /// carries the position's final result. `None` until an exit arrives.
    pub fn realized_pnl(&self) -> Option<f64> {
        self.exits.last().map(|e| e.pnl_after_commission)
    }

    pub fn exited_size(&self) -> f64 {
        self.exits.iter().map(|e| e.size.abs()).sum()
    }

    /// True once the exits cover the whole entry size.
    pub fn is_closed(&self) -> bool {
        !self.exits.is_empty() && self.exited_size() + SIZE_EPSILON >= self.entry.size.abs()
    }

    pub fn total_commission(&self) -> f64 {
        self.entry.commission + self.exits.iter().map(|e| e.commission).sum::<f64>()
    }
}
