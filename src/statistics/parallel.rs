//! Parallel computation implementations for statistical operations

use super::operations::StatOperation;
use crate::errors::{ArCheckError, Result};
use ndarray::{ArrayD, ArrayView1, Axis};
use rayon::prelude::*;
use tracing::debug;

/// Reduces every lane along `axis` in parallel, skipping NaN and infinite values
///
/// # Errors
///
/// Returns an error if the axis is out of bounds.
pub fn parallel_reduce_axis(
    data: &ArrayD<f32>,
    axis: usize,
    operation: StatOperation,
) -> Result<ArrayD<f32>> {
    if axis >= data.ndim() {
        return Err(ArCheckError::ShapeMismatch(format!(
            "Axis {axis} is out of bounds for array with {} dimensions",
            data.ndim()
        )));
    }

    let lanes: Vec<ArrayView1<'_, f32>> = data.lanes(Axis(axis)).into_iter().collect();
    debug!(
        lanes = lanes.len(),
        threads = rayon::current_num_threads(),
        "computing {}",
        operation.as_str()
    );

    let result: Vec<f32> = lanes
        .par_iter()
        .map(|lane| operation.apply(lane.iter().copied()))
        .collect();

    let mut shape = data.shape().to_vec();
    shape.remove(axis);
    Ok(ArrayD::from_shape_vec(shape, result)?)
}

/// Weighted mean of the finite values; NaN when no finite value carries weight
pub fn weighted_nan_mean(values: impl Iterator<Item = (f32, f64)>) -> f32 {
    let (sum, weight) = values
        .filter(|(v, w)| v.is_finite() && w.is_finite())
        .fold((0.0_f64, 0.0_f64), |(sum, weight), (v, w)| {
            (sum + f64::from(v) * w, weight + w)
        });
    if weight > 0.0 {
        (sum / weight) as f32
    } else {
        f32::NAN
    }
}
