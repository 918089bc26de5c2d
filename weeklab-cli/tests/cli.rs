//! Runs the `weeklab` binary against a history stored in a temp data dir.

use std::path::Path;
use std::process::{Command, Output};

use chrono::NaiveDate;
use weeklab_core::data::HistoryStore;
use weeklab_core::domain::{
    History, OptionContract, OptionRecord, PricePoint, TickerDetails, WeekRecord,
};
use weeklab_runner::{LabConfig, ScanPolicy};

fn weeklab(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_weeklab"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

fn point(date: NaiveDate, close: f64) -> PricePoint {
    PricePoint {
        date,
        open: close,
        high: close,
        low: close,
        close,
    }
}

fn option(start: NaiveDate, end: NaiveDate, strike: f64, buy: f64, sell: f64) -> OptionRecord {
    OptionRecord::new(
        OptionContract {
            ticker: format!("O:XYZ{}C{:08}", end.format("%y%m%d"), (strike * 1000.0) as u64),
            strike_price: strike,
            expiration_date: end,
        },
        vec![point(start, buy), point(end, sell)],
    )
    .unwrap()
}

/// Ten ladder weeks, then one week whose two lowest strikes share a leverage.
fn history() -> History {
    let first = NaiveDate::from_ymd_opt(2023, 1, 6).unwrap();
    let mut close = 100.0;
    let mut weeks: Vec<WeekRecord> = (0..10)
        .map(|i| {
            let start = first + chrono::Duration::weeks(i);
            let end = start + chrono::Duration::weeks(1);
            let prev = close;
            close = prev * (1.0 + ((i * 5) % 7 - 3) as f64 / 100.0);
            let options = (1..=5)
                .map(|k| {
                    let strike = (prev + 2.0 * k as f64).round();
                    option(start, end, strike, 3.0 / k as f64, (close - strike).max(0.0))
                })
                .collect();
            WeekRecord::new(point(start, prev), point(end, close), options).unwrap()
        })
        .collect();

    let start = first + chrono::Duration::weeks(10);
    let end = start + chrono::Duration::weeks(1);
    let options = vec![
        option(start, end, 112.0, 1.12, 0.0),
        option(start, end, 113.0, 1.13, 0.0),
        option(start, end, 115.0, 0.5, 0.0),
        option(start, end, 120.0, 0.05, 0.0),
    ];
    weeks.push(WeekRecord::new(point(start, 110.0), point(end, 111.0), options).unwrap());

    History::new("XYZ", weeks, TickerDetails::bare("XYZ"), vec![]).unwrap()
}

fn stored_history(dir: &Path) -> History {
    let history = history();
    HistoryStore::new(dir).save(&history).unwrap();
    history
}

fn assert_scan_lines(stdout: &str, expected: usize) {
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), expected, "stdout:\n{stdout}");
    for line in lines {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 3, "{line}");
        assert!(fields[0].parse::<f64>().is_ok() || fields[0].ends_with('%'), "{line}");
        assert!(fields[1].starts_with("average profit ") && fields[1].ends_with('%'), "{line}");
        assert!(fields[2].starts_with("positive ") && fields[2].ends_with('%'), "{line}");
    }
}

#[test]
fn missing_symbol_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    let out = weeklab(dir.path(), &["strike-gap"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    assert!(!out.stderr.is_empty());
}

#[test]
fn unknown_symbol_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = weeklab(dir.path(), &["leverage", "QQQ"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
}

#[test]
fn strike_gap_prints_one_line_per_scan_point() {
    let dir = tempfile::tempdir().unwrap();
    let history = stored_history(dir.path());
    let policy = ScanPolicy::strike_gap(&history, LabConfig::default().sweep.return_quantile).unwrap();

    let out = weeklab(dir.path(), &["strike-gap", "XYZ"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_scan_lines(&stdout, policy.len());
    assert!(stdout.starts_with("+0.00%\t"));
}

#[test]
fn leverage_prints_one_line_per_scan_point() {
    let dir = tempfile::tempdir().unwrap();
    let history = stored_history(dir.path());
    let policy = ScanPolicy::leverage(&history, LabConfig::default().sweep.leverage_quantile).unwrap();

    let out = weeklab(dir.path(), &["--sequential", "leverage", "XYZ"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_scan_lines(&String::from_utf8(out.stdout).unwrap(), policy.len());
}
