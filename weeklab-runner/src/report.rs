//! Tab-separated report lines for the terminal.
//!
//! Percentages are printed from ratios (`0.0125` → `1.25%`); signed fields
//! always carry their sign.

use weeklab_core::domain::PricePoint;

use crate::inspect::{LeverageSteps, OptionView, SellPrices, WeekView};
use crate::slice::{SliceReport, SliceRow};
use crate::sweep::{ScanPolicy, ScanResult};

/// `ratio` as a percentage with `decimals` places.
pub fn pct(ratio: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, ratio * 100.0)
}

/// Like [`pct`] with an explicit sign.
pub fn signed_pct(ratio: f64, decimals: usize) -> String {
    format!("{:+.*}%", decimals, ratio * 100.0)
}

/// `<param>\taverage profit <pct>\tpositive <pct>`.
///
/// Strike gaps print as signed percentages, leverages with two decimals.
pub fn scan_line(policy: &ScanPolicy, result: &ScanResult) -> String {
    let param = match policy {
        ScanPolicy::StrikeGap { .. } => signed_pct(result.param, 2),
        ScanPolicy::Leverage { .. } => format!("{:.2}", result.param),
    };
    format!(
        "{param}\taverage profit {}\tpositive {}",
        pct(result.average_profit, 1),
        pct(result.positive_rate, 1)
    )
}

/// One-line summary of a scan point's score for logs.
pub fn best_line(policy: &ScanPolicy, result: &ScanResult) -> String {
    format!("best {} (score {:.1})", scan_line(policy, result), result.score)
}

pub fn slice_line(row: &SliceRow) -> String {
    format!(
        "{}\t{} ({} {})\t{} ({} x{:.0})\t{} ({})",
        row.date,
        row.close,
        signed_pct(row.weekly_change, 2),
        signed_pct(row.cumulative_stock, 0),
        row.strike,
        signed_pct(row.strike_gap, 2),
        row.leverage,
        signed_pct(row.profit, 2),
        signed_pct(row.cumulative_profit, 0),
    )
}

pub fn slice_summary(report: &SliceReport) -> String {
    format!(
        "average profit {}\tpositive {}",
        pct(report.average_profit, 1),
        pct(report.positive_rate, 1)
    )
}

fn anchor_line(p: &PricePoint) -> String {
    format!("{} {}", p.date, p.close)
}

pub fn option_line(o: &OptionView) -> String {
    format!(
        "strike={}\tcall-buy={} (x{:.0})\tcall-sell={} ({})",
        o.strike,
        o.buy_price,
        o.leverage,
        o.sell_price,
        signed_pct(o.profit, 0)
    )
}

/// Previous anchor, settlement anchor, then one line per option.
pub fn week_lines(view: &WeekView) -> Vec<String> {
    let mut lines = vec![anchor_line(&view.prev), anchor_line(&view.stock)];
    lines.extend(view.options.iter().map(option_line));
    lines
}

pub fn sell_prices_line(row: &SellPrices) -> String {
    let prices: Vec<String> = row.prices.iter().map(|p| p.to_string()).collect();
    format!("{} ({}) {}", row.date, row.close, prices.join(" "))
}

pub fn leverage_steps_line(row: &LeverageSteps) -> String {
    let ratios: Vec<String> = row.ratios.iter().map(|r| format!("{r:.2}")).collect();
    format!("{}\t{}", row.date, ratios.join(" "))
}
