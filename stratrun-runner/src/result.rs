//! Run result: the finalized, immutable record of one successful run.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stratrun_core::domain::{EquitySample, TradeRecord, TradeRef};
use stratrun_core::StreamStats;
use uuid::Uuid;

use crate::metrics::PerformanceSnapshot;

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a successful run.
///
/// Built by the orchestrator once the child exits with code 0 and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub strategy_id: String,
    /// Engine profile name
    pub engine: String,
    /// blake3 of the run config's canonical JSON
    pub config_hash: String,
    pub exit_code: i32,
    pub performance: PerformanceSnapshot,
    pub equity: Vec<EquitySample>,
    /// Trade records keyed by ref; retired generations appear as `<ref>#<n>`.
    pub trades: BTreeMap<TradeRef, TradeRecord>,
    #[serde(default)]
    pub stats: StreamStats,
    /// Artifact path if the file still exists after the run (kept or caller-owned).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunResult {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity.iter().map(|s| s.value).collect()
    }

    /// Wall-clock duration of the run.
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    /// Records that still had open size when the stream ended.
    pub fn open_trades(&self) -> impl Iterator<Item = &TradeRecord> {
        self.trades.values().filter(|t| !t.is_closed())
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_result;
    use super::*;

    #[test]
    fn helpers() {
        let r = sample_result();
        assert_eq!(r.equity_values(), vec![100_000.0, 100_500.0, 99_800.0, 100_900.0]);
        assert_eq!(r.duration().num_milliseconds(), 1500);
        let open: Vec<_> = r.open_trades().map(|t| t.trade_ref().as_str()).collect();
        assert_eq!(open, vec!["2"]);
    }

    #[test]
    fn json_roundtrip_with_infinite_profit_factor() {
        let r = sample_result();
        assert_eq!(r.performance.profit_factor, f64::INFINITY);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"profit_factor\":\"Infinity\""));
        let back: RunResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, r.id);
        assert_eq!(back.started_at, r.started_at);
        assert_eq!(back.trades, r.trades);
        assert_eq!(back.equity, r.equity);
        assert_eq!(back.performance.profit_factor, f64::INFINITY);
        assert_eq!(back.performance.trade_count, 2);
    }

    #[test]
    fn missing_schema_version_defaults() {
        let mut value = serde_json::to_value(sample_result()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back: RunResult = serde_json::from_value(value).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }
}
