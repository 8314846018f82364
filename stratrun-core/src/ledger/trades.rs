//! Trade ledger: folds entry/exit events into trade records.
//!
//! Invariants:
//! - a record exists only once its entry has been seen
//! - exits are stored in arrival order
//! - a ref may be reused only after its record is fully closed; the closed
//!   record is then archived under `<ref>#<n>`

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::{TradeEntry, TradeExit, TradeRecord, TradeRef};
use crate::protocol::TradeEvent;

/// Rejected trade events. The ledger is unchanged when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("entry for ref '{0}' ignored: trade is still open")]
    RefStillOpen(TradeRef),
    #[error("exit for unknown ref '{0}' dropped")]
    UnknownRef(TradeRef),
}

/// What an accepted event did to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerUpdate {
    Opened,
    /// The ref was reused after full closure; the prior record moved to `archived_as`.
    Reopened { archived_as: TradeRef },
    ExitAppended { exit_count: usize, closed: bool },
}

#[derive(Debug, Clone, Default)]
pub struct TradeLedger {
    records: BTreeMap<TradeRef, TradeRecord>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: TradeEvent) -> Result<LedgerUpdate, LedgerError> {
        match event {
            TradeEvent::Entry(entry) => self.apply_entry(entry),
            TradeEvent::Exit(exit) => self.apply_exit(exit),
        }
    }

    fn apply_entry(&mut self, entry: TradeEntry) -> Result<LedgerUpdate, LedgerError> {
        let key = entry.trade_ref.clone();
        let Some(existing) = self.records.get(&key) else {
            self.records.insert(key, TradeRecord::open(entry));
            return Ok(LedgerUpdate::Opened);
        };
        if !existing.is_closed() {
            return Err(LedgerError::RefStillOpen(key));
        }

        let archived_as = self.next_generation_key(&key);
        if let Some(closed) = self.records.remove(&key) {
            self.records.insert(archived_as.clone(), closed);
        }
        self.records.insert(key, TradeRecord::open(entry));
        Ok(LedgerUpdate::Reopened { archived_as })
    }

    fn apply_exit(&mut self, exit: TradeExit) -> Result<LedgerUpdate, LedgerError> {
        let Some(record) = self.records.get_mut(&exit.trade_ref) else {
            return Err(LedgerError::UnknownRef(exit.trade_ref));
        };
        record.exits.push(exit);
        Ok(LedgerUpdate::ExitAppended {
            exit_count: record.exits.len(),
            closed: record.is_closed(),
        })
    }

    fn next_generation_key(&self, key: &TradeRef) -> TradeRef {
        (1..)
            .map(|n| key.generation(n))
            .find(|candidate| !self.records.contains_key(candidate))
            .unwrap_or_else(|| key.generation(usize::MAX))
    }

    pub fn get(&self, trade_ref: &TradeRef) -> Option<&TradeRecord> {
        self.records.get(trade_ref)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TradeRef, &TradeRecord)> {
        self.records.iter()
    }

    /// Refs whose exits do not yet cover the entry size.
    pub fn open_refs(&self) -> Vec<&TradeRef> {
        self.records
            .iter()
            .filter(|(_, r)| !r.is_closed())
            .map(|(k, _)| k)
            .collect()
    }

    pub fn closed_count(&self) -> usize {
        self.records.values().filter(|r| r.is_closed()).count()
    }

    pub fn into_records(self) -> BTreeMap<TradeRef, TradeRecord> {
        self.records
    }
}
