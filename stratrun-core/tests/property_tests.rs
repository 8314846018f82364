//! Property tests for stream and ledger invariants.
//!
//! Uses proptest to verify:
//! 1. Chunking invariance: any split of a byte stream yields the same lines
//! 2. Exit ordering: ledger exits match arrival order per ref
//! 3. Orphan safety: exits for unseen refs never create records
//! 4. Equity dedup: adjacent equal values collapse, unequal values survive

use proptest::prelude::*;
use stratrun_core::domain::{EquitySample, TradeEntry, TradeExit, TradeRef, TradeSide};
use stratrun_core::ledger::{EquityCurve, TradeLedger};
use stratrun_core::protocol::{StreamReader, TradeEvent};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_stream() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            8 => any::<u8>().prop_filter("printable", |b| b.is_ascii_graphic() || *b == b' '),
            2 => Just(b'\n'),
            1 => Just(b'\r'),
        ],
        0..400,
    )
}

fn arb_cuts(len: usize) -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(0..=len, 0..20).prop_map(|mut cuts| {
        cuts.sort_unstable();
        cuts
    })
}

fn entry(r: u8) -> TradeEvent {
    TradeEvent::Entry(TradeEntry {
        trade_ref: TradeRef::from(r as u64),
        timestamp: "2024-01-02".parse().unwrap(),
        price: 100.0,
        size: 1_000.0,
        value: 100_000.0,
        commission: 0.0,
        side: TradeSide::Long,
    })
}

fn exit(r: u8, seq: usize) -> TradeEvent {
    TradeEvent::Exit(TradeExit {
        trade_ref: TradeRef::from(r as u64),
        timestamp: "2024-01-03".parse().unwrap(),
        price: 101.0,
        pnl: seq as f64,
        pnl_after_commission: seq as f64,
        commission: 0.0,
        size: 1.0,
        hold_bars: None,
    })
}

fn sample(v: f64) -> EquitySample {
    EquitySample::new("2024-01-02".parse().unwrap(), v)
}

fn read_all(chunks: &[&[u8]]) -> (Vec<String>, usize) {
    let mut reader = StreamReader::new();
    let mut lines = Vec::new();
    for chunk in chunks {
        lines.extend(reader.feed(chunk));
    }
    (lines, reader.finish())
}

// ── 1. Chunking invariance ───────────────────────────────────────────

proptest! {
    #[test]
    fn split_stream_matches_whole_stream(
        (bytes, cuts) in arb_stream().prop_flat_map(|b| {
            let len = b.len();
            (Just(b), arb_cuts(len))
        })
    ) {
        let whole = read_all(&[&bytes]);

        let mut chunks = Vec::new();
        let mut start = 0;
        for cut in cuts {
            chunks.push(&bytes[start..cut]);
            start = cut;
        }
        chunks.push(&bytes[start..]);
        let split = read_all(&chunks);

        prop_assert_eq!(whole, split);
    }

    #[test]
    fn emitted_lines_never_contain_newline(bytes in arb_stream()) {
        let (lines, _) = read_all(&[&bytes]);
        for line in lines {
            prop_assert!(!line.contains('\n'));
        }
    }
}

// ── 2/3. Ledger ordering and orphan safety ───────────────────────────

proptest! {
    /// Events: (ref, is_entry). Refs are drawn from a small set so exits
    /// frequently precede or miss their entry.
    #[test]
    fn exits_preserve_arrival_order(events in prop::collection::vec((0u8..5, any::<bool>()), 0..60)) {
        let mut ledger = TradeLedger::new();
        let mut seen_entry = [false; 5];
        let mut expected: Vec<Vec<usize>> = vec![Vec::new(); 5];

        for (seq, (r, is_entry)) in events.into_iter().enumerate() {
            if is_entry {
                let result = ledger.apply(entry(r));
                if !seen_entry[r as usize] {
                    prop_assert!(result.is_ok());
                    seen_entry[r as usize] = true;
                }
            } else {
                let result = ledger.apply(exit(r, seq));
                prop_assert_eq!(result.is_ok(), seen_entry[r as usize]);
                if seen_entry[r as usize] {
                    expected[r as usize].push(seq);
                }
            }
        }

        for r in 0u8..5 {
            let key = TradeRef::from(r as u64);
            match ledger.get(&key) {
                Some(rec) => {
                    prop_assert!(seen_entry[r as usize]);
                    let order: Vec<usize> = rec.exits.iter().map(|e| e.pnl as usize).collect();
                    prop_assert_eq!(&order, &expected[r as usize]);
                }
                None => prop_assert!(!seen_entry[r as usize]),
            }
        }
    }
}

// ── 4. Equity dedup ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn no_adjacent_duplicates_survive(values in prop::collection::vec(prop_oneof![Just(100.0), Just(101.0), 90.0..110.0_f64], 0..80)) {
        let mut curve = EquityCurve::new();
        for v in &values {
            curve.push(sample(*v));
        }
        let kept = curve.samples();
        for pair in kept.windows(2) {
            prop_assert!(!pair[0].same_value(&pair[1]));
        }
        prop_assert_eq!(kept.len() as u64 + curve.duplicates_skipped(), values.len() as u64);
        if let (Some(first), Some(kept_first)) = (values.first(), kept.first()) {
            prop_assert_eq!(*first, kept_first.value);
        }
    }
}
