//! ARCheck: preprocessing checks and forecast verification for autoregressive models
//!
//! A Rust library for validating the gridded datasets fed to autoregressive
//! (AR) spatiotemporal forecasting models and for verifying their forecasts.
//! Datasets are labeled multi-dimensional arrays loaded from NetCDF files or
//! Zarr stores.
//!
//! ## Key Features
//!
//! - **Preprocessing checks**: required dimensions, time gaps, NaN/Inf values,
//!   training/validation time alignment
//! - **Model dimension info**: input/output feature and shape bookkeeping for AR models
//! - **Verification**: deterministic continuous skill scores computed in parallel
//! - **Spatial summaries**: global, latitudinal and longitudinal means on spherical meshes
//! - **NetCDF & Zarr Support**: read and write both NetCDF and Zarr formats
//!
//! ## Module Organization
//!
//! - [`labeled`]: `DataArray` and `Dataset`, the labeled array model
//! - [`timesteps`]: timestep parsing, subsetting and gap detection
//! - [`checks`]: AR preprocessing checks
//! - [`diminfo`]: AR model dimension info and settings
//! - [`verification`]: deterministic skill scores
//! - [`mesh`] and [`summary`]: node coordinates and spatial summaries
//! - [`workflow`]: the verification walkthrough as a single call
//! - [`statistics`]: NaN-skipping parallel reductions
//! - [`netcdf_io`], [`zarr_io`], [`data_source`]: dataset I/O
//! - [`metadata`]: dataset inspection
//! - [`parallel`]: parallel processing configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use archeck::prelude::*;
//! use std::path::Path;
//!
//! # async fn run() -> archeck::Result<()> {
//! let obs = open_dataset(Path::new("obs.nc")).await?;
//! check_finite_dataset(&obs)?;
//! check_no_missing_timesteps(obs.times()?.to_vec(), true)?;
//!
//! let pred = open_dataset(Path::new("forecast.zarr")).await?;
//! let skills = deterministic(&pred, &obs, &VerificationOptions::default())?;
//! save_dataset(&skills, Path::new("skills.nc")).await?;
//! # Ok(())
//! # }
//! ```

pub mod cf_time;
pub mod checks;
pub mod cli;
pub mod data_source;
pub mod diminfo;
pub mod errors;
pub mod labeled;
pub mod mesh;
pub mod metadata;
pub mod netcdf_io;
pub mod parallel;
pub mod statistics;
pub mod summary;
pub mod timesteps;
pub mod verification;
pub mod workflow;
pub mod zarr_io;

pub use errors::{ArCheckError, Result};

pub mod prelude {
    //! Commonly used imports for convenience
    pub use crate::checks::{
        check_ar_data_arrays, check_ar_datasets, check_dimnames_data_array,
        check_dimnames_dataset, check_finite_dataset, ArDataArrays, ArDatasets,
    };
    pub use crate::data_source::{open_dataset, save_dataset, DatasetReader, DatasetWriter};
    pub use crate::diminfo::{get_ar_model_diminfo, ArSettings, DimInfo};
    pub use crate::errors::{ArCheckError, Result};
    pub use crate::labeled::{
        Coordinate, CoordValues, DataArray, Dataset, FEATURE_DIM, NODE_DIM, TIME_DIM,
    };
    pub use crate::mesh::{attach_healpix_nodes, healpix_ring_nodes};
    pub use crate::netcdf_io::NetCDFWriter;
    pub use crate::parallel::ParallelConfig;
    pub use crate::statistics::{StatOperation, StatisticalReduction};
    pub use crate::summary::{global_summary, latitudinal_summary, longitudinal_summary};
    pub use crate::timesteps::{
        check_no_missing_timesteps, check_timesteps, get_subset_timesteps_idxs,
    };
    pub use crate::verification::{deterministic, Skill, VerificationOptions};
    pub use crate::workflow::{run_verification, VerificationReport, WorkflowOptions};
    pub use crate::zarr_io::{ZarrReader, ZarrStore, ZarrWriter};
}
