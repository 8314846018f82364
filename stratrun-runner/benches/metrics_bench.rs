//! Criterion benchmarks for the performance analytics.
//!
//! Run with: `cargo bench -p stratrun-runner`
//!
//! Measures the snapshot over growing equity curves and trade tapes, plus
//! the return-series ratios on their own.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stratrun_core::domain::{Timestamp, TradeEntry, TradeExit, TradeRecord, TradeRef, TradeSide};
use stratrun_runner::metrics::{period_returns, sharpe_ratio, sortino_ratio};
use stratrun_runner::{Capabilities, PerformanceSnapshot};

/// Synthetic equity curve with a slow drift and a repeating wobble.
fn generate_equity(count: usize) -> Vec<f64> {
    (0..count)
        .map(|i| 100_000.0 + i as f64 * 3.0 + ((i % 17) as f64 - 8.0) * 40.0)
        .collect()
}

fn generate_trades(count: usize) -> Vec<TradeRecord> {
    let ts: Timestamp = "2024-01-02 00:00:00".parse().unwrap();
    (0..count)
        .map(|i| {
            let trade_ref = TradeRef::new(i.to_string());
            let pnl = if i % 3 == 0 { -50.0 } else { 80.0 };
            let mut record = TradeRecord::open(TradeEntry {
                trade_ref: trade_ref.clone(),
                timestamp: ts.clone(),
                price: 100.0,
                size: 10.0,
                value: 1000.0,
                commission: 1.0,
                side: TradeSide::Long,
            });
            record.exits.push(TradeExit {
                trade_ref,
                timestamp: ts.clone(),
                price: 100.0 + pnl / 10.0,
                pnl,
                pnl_after_commission: pnl - 2.0,
                commission: 1.0,
                size: 10.0,
                hold_bars: Some(5),
            });
            record
        })
        .collect()
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot");

    for size in [252usize, 2_520, 25_200] {
        let equity = generate_equity(size);
        let trades = generate_trades(size / 10);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                PerformanceSnapshot::compute(
                    black_box(trades.iter()),
                    black_box(&equity),
                    Capabilities::ALL,
                )
            });
        });
    }

    group.finish();
}

fn bench_return_ratios(c: &mut Criterion) {
    let returns = period_returns(&generate_equity(25_200));

    c.bench_function("sharpe_25200", |b| {
        b.iter(|| sharpe_ratio(black_box(&returns)));
    });
    c.bench_function("sortino_25200", |b| {
        b.iter(|| sortino_ratio(black_box(&returns)));
    });
}

criterion_group!(benches, bench_snapshot, bench_return_ratios);
criterion_main!(benches);
