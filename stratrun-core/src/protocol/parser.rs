//! Event line parser: tag dispatch and payload decoding.
//!
//! A tagged line looks like `TRADE: <optional log text> {json}`. Everything
//! between the tag and the first `{` is ignored. Malformed payloads produce
//! `ParsedLine::Dropped`; nothing here can abort a run.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::event::{DropReason, ParsedLine, TradeEvent};
use crate::domain::{EquitySample, TradeEntry, TradeExit};

/// Key whose presence marks a trade payload as an exit.
const EXIT_MARKER: &str = "pnl";

/// Literal prefixes that select the payload kind of a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTags {
    pub trade_tag: String,
    pub equity_tag: String,
}

impl ProtocolTags {
    pub fn new(trade_tag: impl Into<String>, equity_tag: impl Into<String>) -> Self {
        Self {
            trade_tag: trade_tag.into(),
            equity_tag: equity_tag.into(),
        }
    }

    /// Tags must be non-empty and distinct.
    pub fn is_valid(&self) -> bool {
        !self.trade_tag.is_empty() && !self.equity_tag.is_empty() && self.trade_tag != self.equity_tag
    }
}

impl Default for ProtocolTags {
    fn default() -> Self {
        Self::new("TRADE:", "EQUITY:")
    }
}

#[derive(Debug, Clone, Copy)]
enum TagKind {
    Trade,
    Equity,
}

/// Stateless line classifier for one protocol dialect.
#[derive(Debug, Clone)]
pub struct EventParser {
    tags: ProtocolTags,
}

impl EventParser {
    pub fn new(tags: ProtocolTags) -> Self {
        Self { tags }
    }

    pub fn tags(&self) -> &ProtocolTags {
        &self.tags
    }

    pub fn parse(&self, line: &str) -> ParsedLine {
        let Some((kind, rest)) = self.match_tag(line) else {
            return ParsedLine::Passthrough;
        };
        let object = match decode_object(rest) {
            Ok(obj) => obj,
            Err(reason) => return ParsedLine::Dropped(reason),
        };

        match kind {
            TagKind::Trade => {
                let decoded = if object.contains_key(EXIT_MARKER) {
                    from_object::<TradeExit>(object).map(TradeEvent::Exit)
                } else {
                    from_object::<TradeEntry>(object).map(TradeEvent::Entry)
                };
                match decoded {
                    Ok(event) => ParsedLine::Trade(event),
                    Err(reason) => ParsedLine::Dropped(reason),
                }
            }
            TagKind::Equity => match from_object::<EquitySample>(object) {
                Ok(sample) => ParsedLine::Equity(sample),
                Err(reason) => ParsedLine::Dropped(reason),
            },
        }
    }

    /// Longest tag wins so that one tag may be a prefix of the other.
    fn match_tag<'a>(&self, line: &'a str) -> Option<(TagKind, &'a str)> {
        let line = line.trim_start();
        let mut candidates = [
            (TagKind::Trade, self.tags.trade_tag.as_str()),
            (TagKind::Equity, self.tags.equity_tag.as_str()),
        ];
        candidates.sort_by_key(|(_, tag)| std::cmp::Reverse(tag.len()));
        candidates
            .into_iter()
            .filter(|(_, tag)| !tag.is_empty())
            .find_map(|(kind, tag)| line.strip_prefix(tag).map(|rest| (kind, rest)))
    }
}

impl Default for EventParser {
    fn default() -> Self {
        Self::new(ProtocolTags::default())
    }
}

fn decode_object(rest: &str) -> Result<Map<String, Value>, DropReason> {
    let start = rest.find('{').ok_or(DropReason::NoPayload)?;
    serde_json::from_str::<Map<String, Value>>(rest[start..].trim_end())
        .map_err(|e| DropReason::InvalidJson(e.to_string()))
}

fn from_object<T: DeserializeOwned>(object: Map<String, Value>) -> Result<T, DropReason> {
    serde_json::from_value(Value::Object(object)).map_err(|e| DropReason::MissingFields(e.to_string()))
}
