//! Order statistics used to derive sweep bounds.

/// Cut points dividing `data` into `n` equal-probability groups.
///
/// Uses the exclusive method (the sample is treated as drawn from a
/// population that may hold values beyond its extremes), returning `n - 1`
/// values. `None` for empty input or `n < 1`; a single observation is
/// repeated. NaNs are ignored.
pub fn quantiles(data: &[f64], n: usize) -> Option<Vec<f64>> {
    if n < 1 {
        return None;
    }
    let mut sorted: Vec<f64> = data.iter().copied().filter(|x| !x.is_nan()).collect();
    if sorted.is_empty() {
        return None;
    }
    if sorted.len() == 1 {
        return Some(vec![sorted[0]; n - 1]);
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let ld = sorted.len();
    let m = ld + 1;
    let cuts = (1..n)
        .map(|i| {
            let j = (i * m / n).clamp(1, ld - 1);
            // i*m - j*n can go negative once j is clamped up to 1
            let delta = (i * m) as f64 - (j * n) as f64;
            (sorted[j - 1] * (n as f64 - delta) + sorted[j] * delta) / n as f64
        })
        .collect();
    Some(cuts)
}

/// Value at quantile `q` in (0, 1), resolved on a 100-group grid.
///
/// `q = 0.9` is the ninth decile, the same as `quantiles(data, 10)[8]`.
pub fn quantile(data: &[f64], q: f64) -> Option<f64> {
    if !(q > 0.0 && q < 1.0) {
        return None;
    }
    let cuts = quantiles(data, 100)?;
    let idx = ((q * 100.0).round() as usize).clamp(1, 99) - 1;
    Some(cuts[idx])
}
