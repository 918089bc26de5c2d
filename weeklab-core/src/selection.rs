//! Nearest-match selection of a week's call option.
//!
//! Both searches are linear scans over the week's options in ascending strike
//! order; the first option reaching the minimum distance wins ties.

use crate::domain::{OptionRecord, WeekRecord};

/// Scale-symmetric distance between two leverages: `max(l / t, t / l)`.
///
/// At least 1, equal to 1 only when `l == t`, and symmetric in its arguments.
pub fn leverage_distance(leverage: f64, target: f64) -> f64 {
    (leverage / target).max(target / leverage)
}

/// The first option minimizing `distance`.
fn nearest<'w>(week: &'w WeekRecord, distance: impl Fn(&OptionRecord) -> f64) -> &'w OptionRecord {
    let options = week.call_options();
    let mut best = options
        .first()
        .expect("WeekRecord holds at least one call option");
    let mut best_distance = distance(best);
    for option in &options[1..] {
        let d = distance(option);
        if d < best_distance {
            best = option;
            best_distance = d;
        }
    }
    best
}

/// Option whose strike is closest to `target`.
pub fn find_strike(week: &WeekRecord, target: f64) -> &OptionRecord {
    nearest(week, |o| (o.strike_price() - target).abs())
}

/// Option whose leverage is closest to `target` by [`leverage_distance`].
pub fn find_lever(week: &WeekRecord, target: f64) -> &OptionRecord {
    nearest(week, |o| leverage_distance(o.leverage(), target))
}

impl WeekRecord {
    /// See [`find_strike`].
    pub fn find_strike(&self, target: f64) -> &OptionRecord {
        find_strike(self, target)
    }

    /// See [`find_lever`].
    pub fn find_lever(&self, target: f64) -> &OptionRecord {
        find_lever(self, target)
    }

    /// Option closest to a strike `gap` above the previous close.
    pub fn find_strike_gap(&self, gap: f64) -> &OptionRecord {
        find_strike(self, self.prev_close() * (1.0 + gap))
    }
}
