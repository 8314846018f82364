//! Stream session: the reader, parser and aggregators of one run, fed in
//! arrival order.
//!
//! The session owns no process and does no I/O: the orchestrator hands it
//! stdout chunks, and everything that is not a usable event goes to the sink.

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, DiagnosticSink, StreamKind};
use crate::ledger::{EquityCurve, LedgerError, LedgerUpdate, TradeLedger};
use crate::protocol::{EventParser, ParsedLine, StreamReader};

/// Per-run protocol counters. Diagnostic only; never feeds the metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub lines: u64,
    pub trade_events: u64,
    pub equity_events: u64,
    pub passthrough_lines: u64,
    pub dropped_lines: u64,
    pub duplicate_equity_skipped: u64,
    pub orphan_exits: u64,
    pub rejected_entries: u64,
    pub reopened_refs: u64,
    pub discarded_tail_bytes: u64,
}

/// Final state of a session after the stream ended.
#[derive(Debug, Clone)]
pub struct SessionOutput {
    pub ledger: TradeLedger,
    pub equity: EquityCurve,
    pub stats: StreamStats,
}

#[derive(Debug)]
pub struct StreamSession {
    reader: StreamReader,
    parser: EventParser,
    ledger: TradeLedger,
    equity: EquityCurve,
    stats: StreamStats,
}

impl StreamSession {
    pub fn new(parser: EventParser) -> Self {
        Self {
            reader: StreamReader::new(),
            parser,
            ledger: TradeLedger::new(),
            equity: EquityCurve::new(),
            stats: StreamStats::default(),
        }
    }

    /// Feed one stdout chunk; every line it completes is processed before return.
    pub fn feed(&mut self, chunk: &[u8], sink: &dyn DiagnosticSink) {
        for line in self.reader.feed(chunk) {
            self.process_line(line, sink);
        }
    }

    /// Process one complete line, bypassing the framing buffer.
    pub fn process_line(&mut self, line: String, sink: &dyn DiagnosticSink) {
        self.stats.lines += 1;
        match self.parser.parse(&line) {
            ParsedLine::Trade(event) => {
                self.stats.trade_events += 1;
                match self.ledger.apply(event) {
                    Ok(LedgerUpdate::Reopened { archived_as }) => {
                        self.stats.reopened_refs += 1;
                        sink.info(format!("trade ref reused after close; previous record kept as '{archived_as}'"));
                    }
                    Ok(_) => {}
                    Err(err) => {
                        match err {
                            LedgerError::UnknownRef(_) => self.stats.orphan_exits += 1,
                            LedgerError::RefStillOpen(_) => self.stats.rejected_entries += 1,
                        }
                        sink.warn(err.to_string());
                    }
                }
            }
            ParsedLine::Equity(sample) => {
                self.stats.equity_events += 1;
                if !self.equity.push(sample) {
                    self.stats.duplicate_equity_skipped += 1;
                }
            }
            ParsedLine::Passthrough => {
                self.stats.passthrough_lines += 1;
                sink.emit(Diagnostic::Output {
                    stream: StreamKind::Stdout,
                    line,
                });
            }
            ParsedLine::Dropped(reason) => {
                self.stats.dropped_lines += 1;
                sink.emit(Diagnostic::Dropped {
                    line,
                    reason: reason.to_string(),
                });
            }
        }
    }

    pub fn ledger(&self) -> &TradeLedger {
        &self.ledger
    }

    pub fn equity(&self) -> &EquityCurve {
        &self.equity
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// End of stream: discard any unterminated tail and hand back the aggregates.
    pub fn finish(self, sink: &dyn DiagnosticSink) -> SessionOutput {
        let Self {
            reader,
            ledger,
            equity,
            mut stats,
            ..
        } = self;
        let tail = reader.finish();
        if tail > 0 {
            sink.warn(format!("discarded {tail} bytes of unterminated output at end of stream"));
        }
        stats.discarded_tail_bytes = tail as u64;
        SessionOutput { ledger, equity, stats }
    }
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new(EventParser::default())
    }
}
