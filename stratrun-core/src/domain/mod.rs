//! Domain types for StratRun

pub mod equity;
pub mod ids;
pub mod timestamp;
pub mod trade;

pub use equity::EquitySample;
pub use ids::TradeRef;
pub use timestamp::{Timestamp, TimestampError};
pub use trade::{TradeEntry, TradeExit, TradeRecord, TradeSide};
