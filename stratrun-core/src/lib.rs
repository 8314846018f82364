//! StratRun Core: domain types, stream protocol, trade ledger, equity curve.
//!
//! This crate turns the raw stdout of a strategy-backtest process into
//! structured state:
//! - Domain types (trade entries/exits/records, equity samples, timestamps)
//! - Line framing that tolerates chunks split mid-line
//! - Prefix-tagged JSON event parsing that never aborts on bad input
//! - Trade ledger and deduplicated equity curve aggregators
//! - Injected diagnostic sinks for passthrough output and protocol problems

pub mod diagnostics;
pub mod domain;
pub mod ledger;
pub mod protocol;
pub mod session;

pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, SinkRegistry, StreamKind, TracingSink};
pub use session::{SessionOutput, StreamSession, StreamStats};
