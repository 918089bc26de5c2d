//! Strike-gap and leverage sweeps over an assembled history.
//!
//! A sweep evaluates one strategy parameter at a series of scan points. At
//! each point every week contributes the profit ratio of the option the
//! selection engine picks for it. Scan points are computed from their index,
//! never by accumulation, and each point sums its weeks in chronological
//! order, so parallel and sequential runs produce identical reports.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use weeklab_core::domain::{History, OptionRecord, WeekRecord};
use weeklab_core::error::EmptyHistoryError;
use weeklab_core::selection::{find_lever, find_strike};
use weeklab_core::stats;

/// Hard ceiling on the number of scan points of one sweep.
pub const MAX_SCAN_POINTS: usize = 100_000;

/// Errors from deriving or running a sweep.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SweepError {
    #[error(transparent)]
    EmptyHistory(#[from] EmptyHistoryError),

    #[error("no {what} in the history of '{symbol}'")]
    MissingStatistic { symbol: String, what: &'static str },

    #[error("degenerate scan: {0}")]
    DegenerateStep(String),
}

/// The parameter being swept and its range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanPolicy {
    /// Strike offset above the previous close: `start + i * step` up to `end`.
    StrikeGap { start: f64, end: f64, step: f64 },
    /// Target leverage: `start * ratio^i` up to `end`.
    Leverage { start: f64, end: f64, ratio: f64 },
}

impl ScanPolicy {
    /// From 0 to the `return_quantile` weekly stock return, stepped by the
    /// smallest adjacent-strike gap.
    pub fn strike_gap(history: &History, return_quantile: f64) -> Result<Self, SweepError> {
        history.ensure_not_empty()?;
        let missing = |what| SweepError::MissingStatistic {
            symbol: history.symbol().to_string(),
            what,
        };

        let (step, _) = history
            .strike_gap_bounds()
            .ok_or_else(|| missing("adjacent strikes"))?;
        let end = stats::quantile(&history.weekly_returns(), return_quantile)
            .ok_or_else(|| missing("weekly returns"))?;

        let policy = ScanPolicy::StrikeGap {
            start: 0.0,
            end,
            step,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// From the smallest leverage to the `leverage_quantile` leverage,
    /// stepped by the lowest decile of the adjacent-strike leverage ratios
    /// (see [`leverage_step`]).
    pub fn leverage(history: &History, leverage_quantile: f64) -> Result<Self, SweepError> {
        history.ensure_not_empty()?;
        let missing = |what| SweepError::MissingStatistic {
            symbol: history.symbol().to_string(),
            what,
        };

        let leverages = history.leverages();
        let start = leverages.iter().copied().fold(f64::INFINITY, f64::min);
        let end = stats::quantile(&leverages, leverage_quantile)
            .ok_or_else(|| missing("leverages"))?;
        let ratio = leverage_step(&history.leverage_ratios(), start, end)
            .ok_or_else(|| missing("leverage steps above 1"))?;

        let policy = ScanPolicy::Leverage { start, end, ratio };
        policy.validate()?;
        Ok(policy)
    }

    /// Check the range can be enumerated.
    pub fn validate(&self) -> Result<(), SweepError> {
        let degenerate = |msg: String| Err(SweepError::DegenerateStep(msg));
        match *self {
            ScanPolicy::StrikeGap { start, end, step } => {
                if !(start.is_finite() && end.is_finite()) {
                    return degenerate(format!("strike gap range {start}..{end}"));
                }
                if !(step.is_finite() && step > 0.0) {
                    return degenerate(format!("strike gap step {step}"));
                }
            }
            ScanPolicy::Leverage { start, end, ratio } => {
                if !(start.is_finite() && start > 0.0 && end.is_finite()) {
                    return degenerate(format!("leverage range {start}..{end}"));
                }
                if !(ratio.is_finite() && ratio > 1.0) {
                    return degenerate(format!("leverage ratio {ratio}"));
                }
            }
        }
        let n = self.len();
        if n > MAX_SCAN_POINTS {
            return degenerate(format!("{n} scan points (limit {MAX_SCAN_POINTS})"));
        }
        Ok(())
    }

    /// Number of scan points; 0 when `end < start`.
    pub fn len(&self) -> usize {
        // Absorbs rounding so an end that is a whole number of steps away is included.
        const EPS: f64 = 1e-9;
        let steps = match *self {
            ScanPolicy::StrikeGap { start, end, step } => (end - start) / step,
            ScanPolicy::Leverage { start, end, ratio } => (end / start).ln() / ratio.ln(),
        };
        if !(steps + EPS >= 0.0) {
            return 0;
        }
        let steps = (steps + EPS).floor();
        if steps >= MAX_SCAN_POINTS as f64 {
            return MAX_SCAN_POINTS + 1;
        }
        steps as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan point `i`.
    pub fn point(&self, i: usize) -> f64 {
        match *self {
            ScanPolicy::StrikeGap { start, step, .. } => start + i as f64 * step,
            ScanPolicy::Leverage { start, ratio, .. } => start * ratio.powi(i as i32),
        }
    }

    pub fn points(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.point(i)).collect()
    }

    /// The option this policy trades in `week` at scan point `param`.
    pub fn select<'w>(&self, week: &'w WeekRecord, param: f64) -> &'w OptionRecord {
        match self {
            ScanPolicy::StrikeGap { .. } => find_strike(week, week.prev_close() * (1.0 + param)),
            ScanPolicy::Leverage { .. } => find_lever(week, param),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScanPolicy::StrikeGap { .. } => "strike_gap",
            ScanPolicy::Leverage { .. } => "leverage",
        }
    }
}

/// Ratios this close to 1 come from equal leverages and are not steps.
const RATIO_TOLERANCE: f64 = 1e-9;

/// Geometric step of a leverage sweep from `start` to `end`.
///
/// The lowest decile of the adjacent-strike ratios above `1 + RATIO_TOLERANCE`,
/// never below the smallest of them, and widened when needed so the sweep
/// stays within [`MAX_SCAN_POINTS`]. `None` when no ratio is above 1.
pub fn leverage_step(ratios: &[f64], start: f64, end: f64) -> Option<f64> {
    let steps: Vec<f64> = ratios
        .iter()
        .copied()
        .filter(|r| r.is_finite() && *r > 1.0 + RATIO_TOLERANCE)
        .collect();
    let smallest = steps.iter().copied().fold(f64::INFINITY, f64::min);
    if !smallest.is_finite() {
        return None;
    }
    let decile = stats::quantiles(&steps, 10).map_or(smallest, |cuts| cuts[0]);
    let widest_span = (end / start).powf(1.0 / (MAX_SCAN_POINTS - 1) as f64);
    Some(decile.max(smallest).max(widest_span))
}

/// Aggregate outcome of one scan point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub param: f64,
    pub weeks: usize,
    /// Sum of weekly profit ratios.
    pub total_profit: f64,
    /// Weeks with a profit ratio above zero.
    pub positive: usize,
    pub average_profit: f64,
    pub positive_rate: f64,
    /// `average_profit * positive_rate * 10000`.
    pub score: f64,
}

/// Evaluate one scan point over every week of `history`.
pub fn evaluate(history: &History, policy: &ScanPolicy, param: f64) -> ScanResult {
    let (total_profit, positive) =
        history
            .weeks()
            .iter()
            .fold((0.0, 0usize), |(sum, positive), week| {
                let ratio = policy.select(week, param).profit_ratio();
                (sum + ratio, positive + usize::from(ratio > 0.0))
            });

    let weeks = history.len();
    let (average_profit, positive_rate) = if weeks == 0 {
        (0.0, 0.0)
    } else {
        (total_profit / weeks as f64, positive as f64 / weeks as f64)
    };
    ScanResult {
        param,
        weeks,
        total_profit,
        positive,
        average_profit,
        positive_rate,
        score: average_profit * positive_rate * 10_000.0,
    }
}

/// All scan points of one sweep, in scan order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub symbol: String,
    pub policy: ScanPolicy,
    pub results: Vec<ScanResult>,
}

impl SweepReport {
    /// Highest-scoring scan point; the earliest wins ties.
    pub fn best(&self) -> Option<&ScanResult> {
        let mut best: Option<&ScanResult> = None;
        for r in &self.results {
            if best.map_or(true, |b| r.score > b.score) {
                best = Some(r);
            }
        }
        best
    }
}

/// Sweep executor.
///
/// Runs scan points on the rayon pool unless parallelism is disabled.
#[derive(Debug, Clone)]
pub struct Sweeper {
    parallel: bool,
}

impl Default for Sweeper {
    fn default() -> Self {
        Self::new()
    }
}

impl Sweeper {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run(&self, history: &History, policy: &ScanPolicy) -> Result<SweepReport, SweepError> {
        history.ensure_not_empty()?;
        policy.validate()?;

        let points = policy.points();
        tracing::debug!(
            symbol = history.symbol(),
            kind = policy.label(),
            points = points.len(),
            weeks = history.len(),
            parallel = self.parallel,
            "running sweep"
        );

        let results: Vec<ScanResult> = if self.parallel {
            points
                .par_iter()
                .map(|&p| evaluate(history, policy, p))
                .collect()
        } else {
            points
                .iter()
                .map(|&p| evaluate(history, policy, p))
                .collect()
        };

        Ok(SweepReport {
            symbol: history.symbol().to_string(),
            policy: *policy,
            results,
        })
    }
}

/// Run `policy` over `history`.
pub fn run_sweep(
    history: &History,
    policy: &ScanPolicy,
    parallel: bool,
) -> Result<SweepReport, SweepError> {
    Sweeper::new().with_parallelism(parallel).run(history, policy)
}
