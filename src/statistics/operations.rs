//! Core statistical operations and traits

use crate::errors::{ArCheckError, Result};
use ndarray::ArrayD;
use std::str::FromStr;

/// Supported statistical operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatOperation {
    /// Arithmetic mean
    Mean,
    /// Sum of values
    Sum,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
}

impl StatOperation {
    /// Get the string representation of the operation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
            Self::Min => "minimum",
            Self::Max => "maximum",
        }
    }

    /// Fold the finite values of `values`.
    ///
    /// Mean, min and max of a lane without finite values are NaN; the sum is 0.
    pub fn apply(self, values: impl Iterator<Item = f32>) -> f32 {
        let mut count = 0_usize;
        let mut sum = 0.0_f64;
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for value in values.filter(|v| v.is_finite()) {
            count += 1;
            sum += f64::from(value);
            min = min.min(value);
            max = max.max(value);
        }
        match self {
            Self::Sum => sum as f32,
            _ if count == 0 => f32::NAN,
            Self::Mean => (sum / count as f64) as f32,
            Self::Min => min,
            Self::Max => max,
        }
    }
}

impl FromStr for StatOperation {
    type Err = ArCheckError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            "min" | "minimum" => Ok(Self::Min),
            "max" | "maximum" => Ok(Self::Max),
            other => Err(ArCheckError::Verification(format!(
                "Unknown reduction '{other}' (expected mean, sum, min or max)"
            ))),
        }
    }
}

/// Trait for types that can perform statistical reductions along an axis
pub trait StatisticalReduction<T> {
    /// Perform a statistical reduction along the specified axis
    ///
    /// # Errors
    ///
    /// Returns an error if the axis is out of bounds for the array.
    fn reduce_along_axis(&self, axis: usize, operation: StatOperation) -> Result<ArrayD<T>>;
}

impl StatisticalReduction<f32> for ArrayD<f32> {
    fn reduce_along_axis(&self, axis: usize, operation: StatOperation) -> Result<ArrayD<f32>> {
        super::parallel::parallel_reduce_axis(self, axis, operation)
    }
}
