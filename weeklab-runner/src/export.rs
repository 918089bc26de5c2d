//! CSV and JSON export of sweep and slice results.

use std::path::Path;

use anyhow::{Context, Result};

use crate::slice::SliceReport;
use crate::sweep::SweepReport;

// ─── CSV export ─────────────────────────────────────────────────────

/// One row per scan point, in scan order.
///
/// Columns: symbol, kind, param, weeks, total_profit, positive,
/// average_profit, positive_rate, score
pub fn export_sweep_csv(report: &SweepReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "symbol",
        "kind",
        "param",
        "weeks",
        "total_profit",
        "positive",
        "average_profit",
        "positive_rate",
        "score",
    ])?;

    for r in &report.results {
        wtr.write_record([
            report.symbol.clone(),
            report.policy.label().to_string(),
            format!("{:.6}", r.param),
            r.weeks.to_string(),
            format!("{:.6}", r.total_profit),
            r.positive.to_string(),
            format!("{:.6}", r.average_profit),
            format!("{:.6}", r.positive_rate),
            format!("{:.4}", r.score),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// One row per traded week.
pub fn export_slice_csv(report: &SliceReport) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "close",
        "weekly_change",
        "cumulative_stock",
        "strike",
        "strike_gap",
        "leverage",
        "profit",
        "cumulative_profit",
    ])?;

    for row in &report.rows {
        wtr.write_record([
            row.date.to_string(),
            row.close.to_string(),
            format!("{:.6}", row.weekly_change),
            format!("{:.6}", row.cumulative_stock),
            row.strike.to_string(),
            format!("{:.6}", row.strike_gap),
            format!("{:.4}", row.leverage),
            format!("{:.6}", row.profit),
            format!("{:.6}", row.cumulative_profit),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_sweep_json(report: &SweepReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize SweepReport to JSON")
}

/// Write `content` to `path`, creating parent directories.
pub fn write_export(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = content.len(), "wrote export");
    Ok(())
}
