//! Small numeric helpers shared by the encoder and decoder.

use ndarray::ArrayView1;

/// Returns the index and value of the maximum element.
///
/// Ties resolve to the lowest index, `NaN` values never win. Returns `None` for an empty view.
#[inline]
#[must_use]
pub fn argmax(values: ArrayView1<'_, f32>) -> Option<(usize, f32)> {
    let mut iter = values.iter().copied().enumerate();
    let first = iter.next()?;

    Some(iter.fold(first, |best, (i, value)| {
        if value > best.1 || (best.1.is_nan() && !value.is_nan()) {
            (i, value)
        } else {
            best
        }
    }))
}
