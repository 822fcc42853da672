//! Small numeric helpers shared by the fitter, the optimizer and the search.

/// Lossy conversion of a count into a float.
#[must_use]
pub const fn usize_to_f64(value: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let newval = value as f64;
    newval
}

/// Midpoint of the closed interval `[min, max]`.
#[must_use]
pub fn interval_midpoint(min: f64, max: f64) -> f64 {
    0.5 * (min + max)
}

/// Clamp `value` into `[min, max]`.
///
/// Unlike [`f64::clamp`] this does not panic for `min > max` but returns `min`.
#[must_use]
pub fn clamp_to(value: f64, min: f64, max: f64) -> f64 {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Arithmetic mean of a slice. Returns `None` for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / usize_to_f64(values.len()))
    }
}
