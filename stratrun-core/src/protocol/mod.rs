//! Streaming protocol: line framing and event decoding.

pub mod event;
pub mod parser;
pub mod stream;

pub use event::{DropReason, ParsedLine, TradeEvent};
pub use parser::{EventParser, ProtocolTags};
pub use stream::StreamReader;
