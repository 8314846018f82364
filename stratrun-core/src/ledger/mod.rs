//! In-flight aggregation of trade and equity events.

pub mod equity;
pub mod trades;

pub use equity::EquityCurve;
pub use trades::{LedgerError, LedgerUpdate, TradeLedger};
