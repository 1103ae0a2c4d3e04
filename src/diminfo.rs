//! Input/output dimension bookkeeping for AR models
//!
//! [`get_ar_model_diminfo`] describes the tensors an AR model consumes and
//! produces: which features enter the model (static, then boundary conditions,
//! then dynamic variables), which it predicts, and the resulting tensor shapes
//! once the number of input/output lead times is known.

use crate::checks::check_dimnames_data_array;
use crate::errors::{ArCheckError, Result};
use crate::labeled::{DataArray, FEATURE_DIM, NODE_DIM, SAMPLE_DIM, TIME_DIM};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

fn default_forecast_cycle() -> u32 {
    1
}

fn default_ar_iterations() -> u32 {
    6
}

fn default_stack_most_recent_prediction() -> bool {
    true
}

/// Lead-time configuration of an autoregressive model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArSettings {
    /// Offsets (negative) of the input timesteps relative to the forecast time
    pub input_k: Vec<i32>,
    /// Offsets (non-negative) of the predicted timesteps
    pub output_k: Vec<i32>,
    #[serde(default = "default_forecast_cycle")]
    pub forecast_cycle: u32,
    #[serde(default = "default_ar_iterations")]
    pub ar_iterations: u32,
    #[serde(default = "default_stack_most_recent_prediction")]
    pub stack_most_recent_prediction: bool,
}

impl ArSettings {
    pub fn new(input_k: Vec<i32>, output_k: Vec<i32>) -> Self {
        Self {
            input_k,
            output_k,
            forecast_cycle: default_forecast_cycle(),
            ar_iterations: default_ar_iterations(),
            stack_most_recent_prediction: default_stack_most_recent_prediction(),
        }
    }

    /// Load settings from a JSON file and validate them
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        check_offsets("input_k", &self.input_k, |k| k < 0, "strictly negative")?;
        check_offsets("output_k", &self.output_k, |k| k >= 0, "non-negative")?;
        if self.forecast_cycle == 0 {
            return Err(ArCheckError::Settings(
                "'forecast_cycle' must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_offsets(field: &str, offsets: &[i32], valid: impl Fn(i32) -> bool, rule: &str) -> Result<()> {
    if offsets.is_empty() {
        return Err(ArCheckError::Settings(format!("'{field}' must not be empty")));
    }
    if let Some(bad) = offsets.iter().find(|&&k| !valid(k)) {
        return Err(ArCheckError::Settings(format!(
            "'{field}' values must be {rule}, got {bad}"
        )));
    }
    let unique: HashSet<i32> = offsets.iter().copied().collect();
    if unique.len() != offsets.len() {
        return Err(ArCheckError::Settings(format!("'{field}' contains duplicates")));
    }
    Ok(())
}

/// Shape description of the AR model input and output tensors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimInfo {
    pub input_feature_dim: usize,
    pub output_feature_dim: usize,
    pub input_features: Vec<String>,
    pub output_features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_time_dim: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_time_dim: Option<usize>,
    pub input_node_dim: usize,
    pub output_node_dim: usize,
    pub dim_order: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_shape: Option<Vec<usize>>,
}

fn tensor_shape(dim_order: &[String], node: usize, time: usize, feature: usize) -> Result<Vec<usize>> {
    dim_order
        .iter()
        .map(|dim| match dim.as_str() {
            NODE_DIM => Ok(node),
            TIME_DIM => Ok(time),
            FEATURE_DIM => Ok(feature),
            other => Err(ArCheckError::DimensionOrderMismatch(format!(
                "Unsupported dimension '{other}' for AR model tensors"
            ))),
        })
        .collect()
}

/// Retrieve dimension information for AR models.
///
/// `settings` adds the time dimension and the tensor shapes; without it only
/// feature and node information is returned.
pub fn get_ar_model_diminfo(
    da_dynamic: &DataArray,
    da_static: Option<&DataArray>,
    da_bc: Option<&DataArray>,
    settings: Option<&ArSettings>,
) -> Result<DimInfo> {
    check_dimnames_data_array(da_dynamic, &[TIME_DIM, NODE_DIM, FEATURE_DIM], "dynamic DataArray")?;
    let dynamic_variables = da_dynamic.labels(FEATURE_DIM)?;

    let static_variables = match da_static {
        Some(da) => {
            check_dimnames_data_array(da, &[NODE_DIM, FEATURE_DIM], "static DataArray")?;
            da.labels(FEATURE_DIM)?
        }
        None => Vec::new(),
    };

    let bc_variables = match da_bc {
        Some(da) => {
            check_dimnames_data_array(da, &[TIME_DIM, NODE_DIM, FEATURE_DIM], "bc DataArray")?;
            if da.dims() != da_dynamic.dims() {
                return Err(ArCheckError::DimensionOrderMismatch(
                    "Dimension order of dynamic and bc DataArrays must be equal.".to_string(),
                ));
            }
            da.labels(FEATURE_DIM)?
        }
        None => Vec::new(),
    };

    let input_features: Vec<String> = static_variables
        .iter()
        .chain(&bc_variables)
        .chain(&dynamic_variables)
        .cloned()
        .collect();
    let output_features = dynamic_variables;
    let node_dim = da_dynamic.dim_size(NODE_DIM)?;

    let mut dim_order = vec![SAMPLE_DIM.to_string()];
    dim_order.extend(da_dynamic.dims().iter().cloned());

    let mut info = DimInfo {
        input_feature_dim: input_features.len(),
        output_feature_dim: output_features.len(),
        input_features,
        output_features,
        input_time_dim: None,
        output_time_dim: None,
        input_node_dim: node_dim,
        output_node_dim: node_dim,
        dim_order,
        input_shape: None,
        output_shape: None,
    };

    if let Some(settings) = settings {
        let input_time_dim = settings.input_k.len();
        let output_time_dim = settings.output_k.len();
        let tensor_dims = &info.dim_order[1..];
        info.input_shape = Some(tensor_shape(
            tensor_dims,
            info.input_node_dim,
            input_time_dim,
            info.input_feature_dim,
        )?);
        info.output_shape = Some(tensor_shape(
            tensor_dims,
            info.output_node_dim,
            output_time_dim,
            info.output_feature_dim,
        )?);
        info.input_time_dim = Some(input_time_dim);
        info.output_time_dim = Some(output_time_dim);
    }

    Ok(info)
}
