//! Property tests for the analytics engine.
//!
//! Uses proptest to verify:
//! 1. Finiteness: equity-derived ratios are finite for any curve, including
//!    empty, single-sample, flat and zero-crossing ones
//! 2. Drawdown bounds: max drawdown of a positive curve lies in [0, 1)
//! 3. Trade ratio fallbacks: +∞ exactly when wins exist and losses do not

use proptest::prelude::*;
use stratrun_runner::metrics::{
    avg_win_loss_ratio, kurtosis, max_drawdown, period_returns, profit_factor, sharpe_ratio,
    skewness, sortino_ratio, win_rate,
};
use stratrun_runner::{Capabilities, PerformanceSnapshot};

fn arb_curve() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(
        prop_oneof![
            6 => 1.0..200_000.0_f64,
            1 => Just(100_000.0),
            1 => Just(0.0),
            1 => -1_000.0..1_000.0_f64,
        ],
        0..60,
    )
}

fn arb_results() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), -500.0..500.0_f64], 0..40)
}

proptest! {
    #[test]
    fn snapshot_ratios_are_finite(curve in arb_curve()) {
        let s = PerformanceSnapshot::compute(std::iter::empty(), &curve, Capabilities::ALL);
        prop_assert!(s.total_return.is_finite());
        prop_assert!(s.annualized_return.is_finite());
        prop_assert!(s.max_drawdown.is_finite());
        prop_assert!(s.sharpe_ratio.is_finite());
        prop_assert!(s.sortino_ratio.is_finite());
        prop_assert!(s.calmar_ratio.is_finite());
        prop_assert!(s.skewness.is_finite());
        prop_assert!(s.kurtosis.is_finite());
    }

    #[test]
    fn return_ratios_are_finite(curve in arb_curve()) {
        let returns = period_returns(&curve);
        prop_assert!(sharpe_ratio(&returns).is_finite());
        prop_assert!(sortino_ratio(&returns).is_finite());
        prop_assert!(skewness(&returns).is_finite());
        prop_assert!(kurtosis(&returns).is_finite());
    }

    #[test]
    fn drawdown_of_positive_curve_is_a_fraction(
        curve in prop::collection::vec(1.0..1_000_000.0_f64, 0..80)
    ) {
        let dd = max_drawdown(&curve);
        prop_assert!((0.0..1.0).contains(&dd), "drawdown {dd} out of range");
    }

    #[test]
    fn trade_ratio_fallbacks(results in arb_results()) {
        let has_win = results.iter().any(|r| *r > 0.0);
        let has_loss = results.iter().any(|r| *r < 0.0);

        let pf = profit_factor(&results);
        let wl = avg_win_loss_ratio(&results);
        match (has_win, has_loss) {
            (true, false) => {
                prop_assert_eq!(pf, f64::INFINITY);
                prop_assert_eq!(wl, f64::INFINITY);
            }
            (false, false) | (false, true) => {
                prop_assert_eq!(pf, 0.0);
                prop_assert_eq!(wl, 0.0);
            }
            (true, true) => {
                prop_assert!(pf.is_finite() && pf > 0.0);
                prop_assert!(wl.is_finite() && wl > 0.0);
            }
        }

        let rate = win_rate(&results, results.len());
        prop_assert!((0.0..=1.0).contains(&rate));
    }
}
