//! Preconditions for AR training and prediction data
//!
//! The checks run in a fixed order so the first violated precondition is the
//! one reported: dimension names, presence of paired inputs, gaps along the
//! time axis, temporal alignment of dynamic and boundary-condition data and,
//! for DataArrays, matching model dimensions between training and validation.

use crate::diminfo::get_ar_model_diminfo;
use crate::errors::{ArCheckError, Result};
use crate::labeled::{DataArray, Dataset, FEATURE_DIM, NODE_DIM, TIME_DIM};
use crate::timesteps::check_no_missing_timesteps;
use chrono::NaiveDateTime;
use tracing::debug;

fn missing_dims(present: &[String], required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|dim| !present.iter().any(|p| p == *dim))
        .map(|dim| dim.to_string())
        .collect()
}

/// Check that `required_dimnames` are dimensions of the DataArray
pub fn check_dimnames_data_array(da: &DataArray, required_dimnames: &[&str], da_name: &str) -> Result<()> {
    let missing = missing_dims(da.dims(), required_dimnames);
    if !missing.is_empty() {
        return Err(ArCheckError::MissingDimensions {
            name: da_name.to_string(),
            missing,
        });
    }
    Ok(())
}

/// Check that `required_dimnames` are dimensions of the Dataset
pub fn check_dimnames_dataset(ds: &Dataset, required_dimnames: &[&str], ds_name: &str) -> Result<()> {
    let missing = missing_dims(&ds.dim_names(), required_dimnames);
    if !missing.is_empty() {
        return Err(ArCheckError::MissingDimensions {
            name: ds_name.to_string(),
            missing,
        });
    }
    Ok(())
}

/// Check the Dataset does not contain NaN and Inf values
pub fn check_finite_dataset(ds: &Dataset) -> Result<()> {
    let with_nan: Vec<String> = ds
        .variables()
        .filter(|(_, var)| var.data.iter().any(|v| v.is_nan()))
        .map(|(name, _)| name.to_string())
        .collect();
    if !with_nan.is_empty() {
        return Err(ArCheckError::NonFiniteValues {
            kind: "NaN".to_string(),
            variables: with_nan,
        });
    }

    let with_inf: Vec<String> = ds
        .variables()
        .filter(|(_, var)| var.data.iter().any(|v| v.is_infinite()))
        .map(|(name, _)| name.to_string())
        .collect();
    if !with_inf.is_empty() {
        return Err(ArCheckError::NonFiniteValues {
            kind: "Inf".to_string(),
            variables: with_inf,
        });
    }
    Ok(())
}

fn same_timesteps(a: &[NaiveDateTime], b: &[NaiveDateTime]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
}

/// DataArrays feeding AR training and validation
#[derive(Debug, Clone, Copy)]
pub struct ArDataArrays<'a> {
    pub training_dynamic: &'a DataArray,
    pub validation_dynamic: Option<&'a DataArray>,
    pub training_bc: Option<&'a DataArray>,
    pub validation_bc: Option<&'a DataArray>,
    pub static_data: Option<&'a DataArray>,
}

impl<'a> ArDataArrays<'a> {
    pub fn new(training_dynamic: &'a DataArray) -> Self {
        Self {
            training_dynamic,
            validation_dynamic: None,
            training_bc: None,
            validation_bc: None,
            static_data: None,
        }
    }

    pub fn with_validation_dynamic(mut self, da: &'a DataArray) -> Self {
        self.validation_dynamic = Some(da);
        self
    }

    pub fn with_training_bc(mut self, da: &'a DataArray) -> Self {
        self.training_bc = Some(da);
        self
    }

    pub fn with_validation_bc(mut self, da: &'a DataArray) -> Self {
        self.validation_bc = Some(da);
        self
    }

    pub fn with_static(mut self, da: &'a DataArray) -> Self {
        self.static_data = Some(da);
        self
    }
}

fn check_ar_data_array_dimnames(
    da_dynamic: Option<&DataArray>,
    da_bc: Option<&DataArray>,
    da_static: Option<&DataArray>,
) -> Result<()> {
    if let Some(da) = da_dynamic {
        check_dimnames_data_array(da, &[TIME_DIM, NODE_DIM, FEATURE_DIM], "dynamic DataArray")?;
    }
    if let Some(da) = da_static {
        check_dimnames_data_array(da, &[NODE_DIM, FEATURE_DIM], "static DataArray")?;
    }
    if let Some(da) = da_bc {
        check_dimnames_data_array(da, &[TIME_DIM, NODE_DIM, FEATURE_DIM], "bc DataArray")?;
    }
    Ok(())
}

/// Check DataArrays required for AR training and predictions
pub fn check_ar_data_arrays(inputs: &ArDataArrays<'_>, verbose: bool) -> Result<()> {
    if inputs.validation_bc.is_some() && inputs.validation_dynamic.is_none() {
        return Err(ArCheckError::MissingInput(
            "The validation dynamic DataArray is necessary for AR models.".to_string(),
        ));
    }

    check_ar_data_array_dimnames(Some(inputs.training_dynamic), inputs.training_bc, inputs.static_data)?;
    check_ar_data_array_dimnames(inputs.validation_dynamic, inputs.validation_bc, inputs.static_data)?;

    if inputs.validation_dynamic.is_some()
        && inputs.training_bc.is_some()
        && inputs.validation_bc.is_none()
    {
        return Err(ArCheckError::MissingInput(
            "If boundary conditions data are provided for the training, must be provided also for validation!"
                .to_string(),
        ));
    }

    if verbose {
        println!("- Data time period");
    }
    check_no_missing_timesteps(inputs.training_dynamic.times()?, verbose)?;
    if let Some(da) = inputs.validation_dynamic {
        if verbose {
            println!("- Validation Data time period");
        }
        check_no_missing_timesteps(da.times()?, verbose)?;
    }
    if let Some(da) = inputs.training_bc {
        check_no_missing_timesteps(da.times()?, false)?;
    }
    if let Some(da) = inputs.validation_bc {
        check_no_missing_timesteps(da.times()?, false)?;
    }

    if let Some(bc) = inputs.training_bc {
        if !same_timesteps(inputs.training_dynamic.times()?, bc.times()?) {
            return Err(ArCheckError::TimestepsMismatch {
                what: "training dynamic DataArray and the training boundary conditions DataArray"
                    .to_string(),
            });
        }
    }
    if let (Some(dynamic), Some(bc)) = (inputs.validation_dynamic, inputs.validation_bc) {
        if !same_timesteps(dynamic.times()?, bc.times()?) {
            return Err(ArCheckError::TimestepsMismatch {
                what: "validation dynamic DataArray and the validation boundary conditions DataArray"
                    .to_string(),
            });
        }
    }

    if let Some(validation_dynamic) = inputs.validation_dynamic {
        let training = get_ar_model_diminfo(
            inputs.training_dynamic,
            inputs.static_data,
            inputs.training_bc,
            None,
        )?;
        let validation = get_ar_model_diminfo(
            validation_dynamic,
            inputs.static_data,
            inputs.validation_bc,
            None,
        )?;
        if training != validation {
            return Err(ArCheckError::DimensionOrderMismatch(
                "The dimension order of training and validation DataArrays do not coincide!"
                    .to_string(),
            ));
        }
    }

    debug!("AR DataArrays passed all checks");
    Ok(())
}

/// Datasets feeding AR training and validation
#[derive(Debug, Clone, Copy)]
pub struct ArDatasets<'a> {
    pub training_dynamic: &'a Dataset,
    pub validation_dynamic: Option<&'a Dataset>,
    pub training_bc: Option<&'a Dataset>,
    pub validation_bc: Option<&'a Dataset>,
    pub static_data: Option<&'a Dataset>,
}

impl<'a> ArDatasets<'a> {
    pub fn new(training_dynamic: &'a Dataset) -> Self {
        Self {
            training_dynamic,
            validation_dynamic: None,
            training_bc: None,
            validation_bc: None,
            static_data: None,
        }
    }

    pub fn with_validation_dynamic(mut self, ds: &'a Dataset) -> Self {
        self.validation_dynamic = Some(ds);
        self
    }

    pub fn with_training_bc(mut self, ds: &'a Dataset) -> Self {
        self.training_bc = Some(ds);
        self
    }

    pub fn with_validation_bc(mut self, ds: &'a Dataset) -> Self {
        self.validation_bc = Some(ds);
        self
    }

    pub fn with_static(mut self, ds: &'a Dataset) -> Self {
        self.static_data = Some(ds);
        self
    }
}

fn check_ar_dataset_dimnames(
    ds_dynamic: Option<&Dataset>,
    ds_bc: Option<&Dataset>,
    ds_static: Option<&Dataset>,
) -> Result<()> {
    if let Some(ds) = ds_dynamic {
        check_dimnames_dataset(ds, &[TIME_DIM, NODE_DIM], "dynamic Dataset")?;
    }
    if let Some(ds) = ds_static {
        check_dimnames_dataset(ds, &[NODE_DIM], "static Dataset")?;
    }
    if let Some(ds) = ds_bc {
        check_dimnames_dataset(ds, &[TIME_DIM, NODE_DIM], "bc Dataset")?;
    }
    Ok(())
}

/// Check Datasets required for AR training and predictions
pub fn check_ar_datasets(inputs: &ArDatasets<'_>, verbose: bool) -> Result<()> {
    check_ar_dataset_dimnames(Some(inputs.training_dynamic), inputs.training_bc, inputs.static_data)?;
    check_ar_dataset_dimnames(inputs.validation_dynamic, inputs.validation_bc, inputs.static_data)?;

    if inputs.validation_dynamic.is_some()
        && inputs.training_bc.is_some()
        && inputs.validation_bc.is_none()
    {
        return Err(ArCheckError::MissingInput(
            "If boundary conditions data are provided for the training, must be provided also for validation!"
                .to_string(),
        ));
    }

    if verbose {
        println!("Data");
    }
    check_no_missing_timesteps(inputs.training_dynamic.times()?, verbose)?;
    if let Some(ds) = inputs.validation_dynamic {
        if verbose {
            println!("Validation Data");
        }
        check_no_missing_timesteps(ds.times()?, verbose)?;
    }
    if let Some(ds) = inputs.training_bc {
        check_no_missing_timesteps(ds.times()?, false)?;
    }
    if let Some(ds) = inputs.validation_bc {
        check_no_missing_timesteps(ds.times()?, false)?;
    }

    if let Some(bc) = inputs.training_bc {
        if !same_timesteps(inputs.training_dynamic.times()?, bc.times()?) {
            return Err(ArCheckError::TimestepsMismatch {
                what: "training dynamic Dataset and the training boundary conditions Dataset"
                    .to_string(),
            });
        }
    }
    if let (Some(dynamic), Some(bc)) = (inputs.validation_dynamic, inputs.validation_bc) {
        if !same_timesteps(dynamic.times()?, bc.times()?) {
            return Err(ArCheckError::TimestepsMismatch {
                what: "validation dynamic Dataset and the validation boundary conditions Dataset"
                    .to_string(),
            });
        }
    }

    debug!("AR Datasets passed all checks");
    Ok(())
}
