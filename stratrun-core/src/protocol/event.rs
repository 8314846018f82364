//! Typed events decoded from protocol lines.

use crate::domain::{EquitySample, TradeEntry, TradeExit, TradeRef};
use std::fmt;

/// A decoded trade-tagged payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeEvent {
    Entry(TradeEntry),
    Exit(TradeExit),
}

impl TradeEvent {
    pub fn trade_ref(&self) -> &TradeRef {
        match self {
            TradeEvent::Entry(e) => &e.trade_ref,
            TradeEvent::Exit(e) => &e.trade_ref,
        }
    }
}

/// Why a tagged line produced no event.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    /// Tag present but no `{` follows it.
    NoPayload,
    /// Payload is not a JSON object.
    InvalidJson(String),
    /// Object decoded but a mandatory field is missing or mistyped.
    MissingFields(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoPayload => write!(f, "no JSON payload after tag"),
            DropReason::InvalidJson(e) => write!(f, "invalid JSON payload: {e}"),
            DropReason::MissingFields(e) => write!(f, "incomplete payload: {e}"),
        }
    }
}

/// Classification of one line of process output.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Trade(TradeEvent),
    Equity(EquitySample),
    /// No recognized tag; surfaced to the diagnostic sink unchanged.
    Passthrough,
    Dropped(DropReason),
}
