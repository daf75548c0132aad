use itertools::Itertools;
use ndarray::{Array1, Array2};

use crate::error::Result;

/// Build the `(x, y)` coordinates of a grid, one row per grid point.
///
/// The rows are ordered row-major: `x` varies fastest, then `y`.
pub fn meshgrid(ys: &Array1<f32>, xs: &Array1<f32>) -> Result<Array2<f32>> {
    let values = ys
        .iter()
        .cartesian_product(xs)
        .flat_map(|(&y, &x)| [x, y])
        .collect::<Vec<_>>();

    Ok(Array2::from_shape_vec((ys.len() * xs.len(), 2), values)?)
}
