//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or realized trade
//! results in, scalar out. Equity-derived ratios are coerced to 0.0 when the
//! arithmetic yields NaN or ±∞; only the trade ratios may be +∞.

use serde::{Deserialize, Serialize};
use stratrun_core::domain::TradeRecord;

use crate::profile::Capabilities;

/// Periods per year used for annualization.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Annual risk-free rate subtracted in Sharpe and Sortino.
pub const RISK_FREE_RATE: f64 = 0.02;

/// Deviations below this are float noise from averaging identical values.
const MIN_DEVIATION: f64 = 1e-15;

/// Risk/performance summary of one successful run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub win_rate: f64,
    #[serde(with = "float_or_infinity")]
    pub profit_factor: f64,
    #[serde(with = "float_or_infinity")]
    pub avg_win_loss_ratio: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub trade_count: usize,
}

impl PerformanceSnapshot {
    /// Compute the snapshot from final trade records and equity values.
    ///
    /// Groups disabled in `capabilities` stay at 0.0.
    pub fn compute<'a, I>(trades: I, equity: &[f64], capabilities: Capabilities) -> Self
    where
        I: IntoIterator<Item = &'a TradeRecord>,
    {
        let mut snapshot = Self {
            total_return: total_return(equity),
            annualized_return: annualized_return(equity),
            max_drawdown: max_drawdown(equity),
            ..Self::default()
        };

        if capabilities.trade_metrics {
            let mut trade_count = 0;
            let mut results = Vec::new();
            for record in trades {
                trade_count += 1;
                if let Some(pnl) = record.realized_pnl() {
                    results.push(pnl);
                }
            }
            snapshot.trade_count = trade_count;
            snapshot.win_rate = win_rate(&results, trade_count);
            snapshot.profit_factor = profit_factor(&results);
            snapshot.avg_win_loss_ratio = avg_win_loss_ratio(&results);
        }

        let returns = period_returns(equity);
        if capabilities.risk_ratios {
            snapshot.sharpe_ratio = sharpe_ratio(&returns);
            snapshot.sortino_ratio = sortino_ratio(&returns);
            snapshot.calmar_ratio = calmar_ratio(equity);
        }
        if capabilities.distribution_moments {
            snapshot.skewness = skewness(&returns);
            snapshot.kurtosis = kurtosis(&returns);
        }
        snapshot
    }
}

// ─── Equity metrics ─────────────────────────────────────────────────

/// Total return as a fraction: (last - first) / first.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(first), Some(last)) => finite_or_zero((last - first) / first),
        _ => 0.0,
    }
}

/// Annualized return: (1 + total_return)^(252 / N) - 1, N = sample count.
pub fn annualized_return(equity: &[f64]) -> f64 {
    if equity.is_empty() {
        return 0.0;
    }
    let growth = 1.0 + total_return(equity);
    finite_or_zero(growth.powf(PERIODS_PER_YEAR / equity.len() as f64) - 1.0)
}

/// Maximum drawdown as a positive fraction (e.g. 0.15 = 15% below peak).
///
/// The running peak starts at the first sample. Returns 0.0 for constant or
/// monotonically increasing equity.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized Sharpe ratio: (mean·252 − rf) / (std·√252), population std.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    let excess = mean_f64(returns) * PERIODS_PER_YEAR - RISK_FREE_RATE;
    annualized_over(excess, std_dev(returns))
}

/// Annualized Sortino ratio: Sharpe numerator over the population std of
/// the negative returns only. No negative returns means a zero denominator.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    let excess = mean_f64(returns) * PERIODS_PER_YEAR - RISK_FREE_RATE;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    annualized_over(excess, std_dev(&downside))
}

/// `excess / (std·√252)`; a std below rounding noise counts as zero.
fn annualized_over(excess: f64, std: f64) -> f64 {
    if std < MIN_DEVIATION {
        return 0.0;
    }
    finite_or_zero(excess / (std * PERIODS_PER_YEAR.sqrt()))
}

/// Calmar ratio: annualized return / max drawdown, 0.0 without a drawdown.
pub fn calmar_ratio(equity: &[f64]) -> f64 {
    let dd = max_drawdown(equity);
    if dd <= 0.0 {
        return 0.0;
    }
    finite_or_zero(annualized_return(equity) / dd)
}

/// Skewness (third standardized moment, population formula).
pub fn skewness(returns: &[f64]) -> f64 {
    let (m2, m3, _) = central_moments(returns);
    if m2.sqrt() < MIN_DEVIATION {
        return 0.0;
    }
    finite_or_zero(m3 / m2.powf(1.5))
}

/// Excess kurtosis (fourth standardized moment minus 3).
pub fn kurtosis(returns: &[f64]) -> f64 {
    let (m2, _, m4) = central_moments(returns);
    if m2.sqrt() < MIN_DEVIATION {
        return 0.0;
    }
    finite_or_zero(m4 / (m2 * m2) - 3.0)
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Realized results are wins when > 0 and losses when < 0; zero is neither.
#[derive(Debug, Clone, Copy, Default)]
struct WinLoss {
    wins: usize,
    losses: usize,
    gross_win: f64,
    gross_loss: f64,
}

fn tally(results: &[f64]) -> WinLoss {
    let mut t = WinLoss::default();
    for &r in results {
        if r > 0.0 {
            t.wins += 1;
            t.gross_win += r;
        } else if r < 0.0 {
            t.losses += 1;
            t.gross_loss += r.abs();
        }
    }
    t
}

/// Wins over all trades, including trades that never exited.
pub fn win_rate(results: &[f64], trade_count: usize) -> f64 {
    if trade_count == 0 {
        return 0.0;
    }
    tally(results).wins as f64 / trade_count as f64
}

/// Gross wins / gross losses; +∞ with wins and no losses, 0.0 with neither.
pub fn profit_factor(results: &[f64]) -> f64 {
    let t = tally(results);
    ratio_or_infinity(t.gross_win, t.gross_loss)
}

/// Average win / average loss, with the same fallbacks as `profit_factor`.
pub fn avg_win_loss_ratio(results: &[f64]) -> f64 {
    let t = tally(results);
    let avg_win = if t.wins > 0 { t.gross_win / t.wins as f64 } else { 0.0 };
    let avg_loss = if t.losses > 0 { t.gross_loss / t.losses as f64 } else { 0.0 };
    ratio_or_infinity(avg_win, avg_loss)
}

fn ratio_or_infinity(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        if num > 0.0 {
            f64::INFINITY
        } else {
            0.0
        }
    } else {
        num / den
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Pairwise relative changes of consecutive equity values.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Second, third and fourth central moments (population).
fn central_moments(values: &[f64]) -> (f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = mean_f64(values);
    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    (m2 / n, m3 / n, m4 / n)
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// JSON has no non-finite numbers: they travel as `"Infinity"`,
/// `"-Infinity"` or `"NaN"`. Plain numbers are accepted on input too.
mod float_or_infinity {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("NaN")
        } else if *value > 0.0 {
            serializer.serialize_str("Infinity")
        } else {
            serializer.serialize_str("-Infinity")
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => match text.as_str() {
                "Infinity" | "inf" => Ok(f64::INFINITY),
                "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
                "NaN" => Ok(f64::NAN),
                other => Err(D::Error::custom(format!("expected a number or \"Infinity\", got \"{other}\""))),
            },
        }
    }
}
