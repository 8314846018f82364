//! Reporting and export: JSON, CSV, and Markdown output for run results.
//!
//! Provides three export formats:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape (one row per exit) and equity curve
//! - **Markdown**: human-readable single-run report
//!
//! Persisted results carry a `schema_version` field. Newer versions are
//! rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use stratrun_core::domain::{EquitySample, TradeRecord};

use crate::result::{RunResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunResult` to pretty JSON.
pub fn export_json(result: &RunResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize RunResult to JSON")
}

/// Deserialize a `RunResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<RunResult> {
    let result: RunResult = serde_json::from_str(json).context("failed to deserialize RunResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export trade records as CSV, one row per exit. An entry without exits
/// still gets one row with the exit columns empty.
///
/// Columns: ref, side, entry_datetime, entry_price, entry_size, entry_value,
/// entry_commission, exit_seq, exit_datetime, exit_price, exit_size, pnl,
/// pnlcomm, exit_commission, hold_bars
pub fn export_trades_csv<'a, I>(trades: I) -> Result<String>
where
    I: IntoIterator<Item = &'a TradeRecord>,
{
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "ref",
        "side",
        "entry_datetime",
        "entry_price",
        "entry_size",
        "entry_value",
        "entry_commission",
        "exit_seq",
        "exit_datetime",
        "exit_price",
        "exit_size",
        "pnl",
        "pnlcomm",
        "exit_commission",
        "hold_bars",
    ])?;

    for t in trades {
        let e = &t.entry;
        let entry_cols = [
            e.trade_ref.to_string(),
            e.side.to_string(),
            e.timestamp.to_string(),
            format!("{:.6}", e.price),
            format!("{:.6}", e.size),
            format!("{:.2}", e.value),
            format!("{:.2}", e.commission),
        ];

        if t.exits.is_empty() {
            let mut row: Vec<String> = entry_cols.to_vec();
            row.extend(std::iter::repeat(String::new()).take(8));
            wtr.write_record(&row)?;
            continue;
        }

        for (seq, x) in t.exits.iter().enumerate() {
            let mut row: Vec<String> = entry_cols.to_vec();
            row.extend([
                (seq + 1).to_string(),
                x.timestamp.to_string(),
                format!("{:.6}", x.price),
                format!("{:.6}", x.size),
                format!("{:.2}", x.pnl),
                format!("{:.2}", x.pnl_after_commission),
                format!("{:.2}", x.commission),
                x.hold_bars.map(|b| b.to_string()).unwrap_or_default(),
            ]);
            wtr.write_record(&row)?;
        }
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with datetime and equity columns.
pub fn export_equity_csv(equity: &[EquitySample]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["datetime", "equity"])?;
    for sample in equity {
        wtr.write_record([sample.timestamp.to_string(), format!("{:.2}", sample.value)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full output set for a single run.
///
/// Creates a directory named `{strategy}_{started}_{id8}/` under
/// `output_dir` containing:
/// - `result.json`: the full `RunResult`
/// - `trades.csv`: trade tape
/// - `equity.csv`: equity curve
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &RunResult, output_dir: &Path) -> Result<PathBuf> {
    let id = result.id.simple().to_string();
    let dirname = format!(
        "{}_{}_{}",
        sanitize(&result.strategy_id),
        result.started_at.format("%Y%m%d_%H%M%S"),
        &id[..8]
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create output dir: {}", run_dir.display()))?;

    let write = |name: &str, contents: String| -> Result<()> {
        let path = run_dir.join(name);
        std::fs::write(&path, contents).with_context(|| format!("failed to write {}", path.display()))
    };
    write("result.json", export_json(result)?)?;
    write("trades.csv", export_trades_csv(result.trades.values())?)?;
    write("equity.csv", export_equity_csv(&result.equity)?)?;
    write("report.md", generate_report(result))?;

    Ok(run_dir)
}

/// Load a `RunResult` from a `result.json` file or a directory holding one.
pub fn load_artifacts(path: &Path) -> Result<RunResult> {
    let file = if path.is_dir() {
        path.join("result.json")
    } else {
        path.to_path_buf()
    };
    let json = std::fs::read_to_string(&file).with_context(|| format!("failed to read {}", file.display()))?;
    import_json(&json)
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ─── Markdown report ────────────────────────────────────────────────

/// Generate a Markdown report for a single run.
pub fn generate_report(result: &RunResult) -> String {
    let mut md = String::with_capacity(2048);

    md.push_str("# Strategy Run Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Run ID | {} |\n", result.id));
    md.push_str(&format!("| Strategy | {} |\n", result.strategy_id));
    md.push_str(&format!("| Engine | {} |\n", result.engine));
    md.push_str(&format!(
        "| Started | {} |\n",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!(
        "| Duration | {:.1}s |\n",
        result.duration().num_milliseconds() as f64 / 1000.0
    ));
    md.push_str(&format!("| Config Hash | {} |\n", result.config_hash));
    if let (Some(first), Some(last)) = (result.equity.first(), result.equity.last()) {
        md.push_str(&format!("| Period | {} to {} |\n", first.timestamp, last.timestamp));
    }
    md.push('\n');

    let m = &result.performance;
    md.push_str("## Performance Summary\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
    md.push_str(&format!("| Annualized Return | {:.2}% |\n", m.annualized_return * 100.0));
    md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
    md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe_ratio));
    md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino_ratio));
    md.push_str(&format!("| Calmar | {:.3} |\n", m.calmar_ratio));
    md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
    md.push_str(&format!("| Profit Factor | {} |\n", ratio(m.profit_factor)));
    md.push_str(&format!("| Avg Win / Avg Loss | {} |\n", ratio(m.avg_win_loss_ratio)));
    md.push_str(&format!("| Skewness | {:.3} |\n", m.skewness));
    md.push_str(&format!("| Kurtosis | {:.3} |\n", m.kurtosis));
    md.push_str(&format!("| Trades | {} |\n", m.trade_count));
    let commission: f64 = result.trades.values().map(|t| t.total_commission()).sum();
    md.push_str(&format!("| Commission Paid | {commission:.2} |\n"));
    md.push('\n');

    let s = &result.stats;
    let problems = s.dropped_lines + s.orphan_exits + s.rejected_entries + s.discarded_tail_bytes;
    if problems > 0 || s.reopened_refs > 0 {
        md.push_str("## Stream Diagnostics\n\n");
        if s.dropped_lines > 0 {
            md.push_str(&format!("- {} malformed protocol lines dropped\n", s.dropped_lines));
        }
        if s.orphan_exits > 0 {
            md.push_str(&format!("- {} exits for unknown trade refs\n", s.orphan_exits));
        }
        if s.rejected_entries > 0 {
            md.push_str(&format!("- {} entries rejected for refs still open\n", s.rejected_entries));
        }
        if s.reopened_refs > 0 {
            md.push_str(&format!("- {} refs reused after closing\n", s.reopened_refs));
        }
        if s.discarded_tail_bytes > 0 {
            md.push_str(&format!(
                "- {} bytes of unterminated output discarded\n",
                s.discarded_tail_bytes
            ));
        }
        md.push('\n');
    }

    md
}

/// Format a ratio that may be infinite.
pub fn ratio(v: f64) -> String {
    if v.is_infinite() && v > 0.0 {
        "∞".to_string()
    } else {
        format!("{v:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::fixtures::sample_result;

    // ─── JSON round-trip ─────────────────────────────────────────────

    #[test]
    fn json_roundtrip() {
        let original = sample_result();
        let json = export_json(&original).unwrap();
        let restored = import_json(&json).unwrap();

        assert_eq!(restored.schema_version, SCHEMA_VERSION);
        assert_eq!(restored.id, original.id);
        assert_eq!(restored.strategy_id, original.strategy_id);
        assert_eq!(restored.trades, original.trades);
        assert_eq!(restored.equity.len(), original.equity.len());
        assert!((restored.performance.sharpe_ratio - original.performance.sharpe_ratio).abs() < 1e-10);
        assert_eq!(restored.performance.profit_factor, f64::INFINITY);
    }

    #[test]
    fn json_rejects_unknown_version() {
        let mut result = sample_result();
        result.schema_version = 99;
        let json = export_json(&result).unwrap();
        let msg = import_json(&json).unwrap_err().to_string();
        assert!(msg.contains("unsupported schema version 99"));
    }

    #[test]
    fn json_rejects_garbage() {
        assert!(import_json("{\"not\": \"a result\"}").is_err());
    }

    // ─── CSV trades ─────────────────────────────────────────────────

    #[test]
    fn csv_trades_header() {
        let csv = export_trades_csv(std::iter::empty()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].split(',').count(), 15);
        assert!(lines[0].starts_with("ref,side,entry_datetime"));
    }

    #[test]
    fn csv_trades_one_row_per_exit_plus_open_entries() {
        let result = sample_result();
        let csv = export_trades_csv(result.trades.values()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        // header + ref 1 (one exit) + ref 2 (open)
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("1,long,2024-01-02 00:00:00,100.000000"));
        assert!(lines[1].contains(",10.00,9.00,1.00,1"));
        assert!(lines[2].starts_with("2,long,"));
        assert!(lines[2].ends_with(",,,,,,,"));
    }

    #[test]
    fn csv_trades_partial_exits_numbered() {
        let mut result = sample_result();
        let record = result.trades.values_mut().next().unwrap();
        let mut second = record.exits[0].clone();
        second.hold_bars = None;
        record.exits.push(second);

        let csv = export_trades_csv(result.trades.values()).unwrap();
        let rows: Vec<&str> = csv.lines().skip(1).filter(|l| l.starts_with("1,")).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].contains(",1,2024-01-03"));
        assert!(rows[1].contains(",2,2024-01-03"));
        assert!(rows[1].ends_with(','));
    }

    // ─── CSV equity ─────────────────────────────────────────────────

    #[test]
    fn csv_equity_basic() {
        let csv = export_equity_csv(&sample_result().equity).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "datetime,equity");
        assert_eq!(lines[1], "2024-01-02 00:00:00,100000.00");
        assert_eq!(lines[3], "2024-01-02 00:00:00,99800.00");
    }

    // ─── Markdown report ────────────────────────────────────────────

    #[test]
    fn markdown_report_has_sections() {
        let md = generate_report(&sample_result());
        assert!(md.contains("## Metadata"));
        assert!(md.contains("| Strategy | sma_cross |"));
        assert!(md.contains("| Profit Factor | ∞ |"));
        assert!(md.contains("| Trades | 2 |"));
        assert!(md.contains("| Commission Paid | 3.00 |"));
        assert!(!md.contains("## Stream Diagnostics"));
    }

    #[test]
    fn markdown_report_lists_stream_problems() {
        let mut result = sample_result();
        result.stats.dropped_lines = 3;
        result.stats.orphan_exits = 1;
        let md = generate_report(&result);
        assert!(md.contains("## Stream Diagnostics"));
        assert!(md.contains("- 3 malformed protocol lines dropped"));
        assert!(md.contains("- 1 exits for unknown trade refs"));
    }

    // ─── Save/load artifacts ────────────────────────────────────────

    #[test]
    fn save_load_artifacts_roundtrip() {
        let result = sample_result();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&result, dir.path()).unwrap();

        assert!(run_dir.join("result.json").exists());
        assert!(run_dir.join("trades.csv").exists());
        assert!(run_dir.join("equity.csv").exists());
        assert!(run_dir.join("report.md").exists());
        let name = run_dir.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("sma_cross_"));

        let from_dir = load_artifacts(&run_dir).unwrap();
        assert_eq!(from_dir.id, result.id);
        let from_file = load_artifacts(&run_dir.join("result.json")).unwrap();
        assert_eq!(from_file.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn strategy_name_is_sanitized_for_dirname() {
        let mut result = sample_result();
        result.strategy_id = "mean/rev v2".into();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&result, dir.path()).unwrap();
        assert!(run_dir.starts_with(dir.path()));
        assert!(run_dir.file_name().unwrap().to_str().unwrap().starts_with("mean_rev_v2_"));
    }

    #[test]
    fn load_missing_file_has_context() {
        let err = load_artifacts(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
