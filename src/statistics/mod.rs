//! Statistical reductions over labeled dimensions
//!
//! This module provides NaN-skipping reductions (mean, sum, min, max) along an
//! axis and the weighted means used by the spatial skill summaries.
//!
//! # Organization
//!
//! - [`operations`]: the reduction kinds and the [`StatisticalReduction`] trait
//! - [`parallel`]: rayon-backed lane reductions

pub mod operations;
pub mod parallel;

pub use operations::{StatOperation, StatisticalReduction};
pub use parallel::{parallel_reduce_axis, weighted_nan_mean};
