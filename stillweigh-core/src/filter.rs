//! Robust statistics over sample windows

/// Median of `values`, sorting them in place
///
/// An even count averages the two middle values. Returns `None` for an
/// empty slice. NaN sorts last under `total_cmp`, so callers should drop
/// non-finite values first.
pub fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}
