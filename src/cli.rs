//! Defines command-line interface options using `clap` for the ARCheck application.

use crate::statistics::StatOperation;
use clap::Parser;
use std::ops::Range;
use std::path::PathBuf;

/// Preprocessing checks and forecast verification for autoregressive models
#[derive(Parser, Debug)]
#[command(
    version,
    name = "archeck",
    about = "Check AR training data and verify forecasts on NetCDF/Zarr datasets"
)]
pub struct Args {
    /// Training dynamic dataset (NetCDF file or Zarr store); the observations when verifying
    #[arg(short, long)]
    pub file: PathBuf,

    /// Validation dynamic dataset
    #[arg(long)]
    pub validation: Option<PathBuf>,

    /// Training boundary-condition dataset
    #[arg(long)]
    pub bc: Option<PathBuf>,

    /// Validation boundary-condition dataset
    #[arg(long)]
    pub validation_bc: Option<PathBuf>,

    /// Static dataset (no time dimension)
    #[arg(long)]
    pub static_data: Option<PathBuf>,

    /// Run the AR preprocessing checks on the given datasets
    #[arg(long)]
    pub check: bool,

    /// Print the AR model dimension info as JSON
    #[arg(long)]
    pub diminfo: bool,

    /// JSON file with AR settings (input_k, output_k, ...)
    #[arg(long)]
    pub ar_settings: Option<PathBuf>,

    /// Forecast dataset to verify against --file
    #[arg(long)]
    pub verify: Option<PathBuf>,

    /// Dimensions aggregated when computing skills
    #[arg(long, value_delimiter = ',', default_value = "time")]
    pub aggregating_dims: Vec<String>,

    /// Attach HEALPix (RING) node coordinates with this nside before summarizing
    #[arg(long)]
    pub healpix_nside: Option<u32>,

    /// Latitude band width in degrees for the latitudinal summary
    #[arg(long, default_value_t = 10.0)]
    pub lat_res: f64,

    /// Longitude band width in degrees for the longitudinal summary
    #[arg(long, default_value_t = 30.0)]
    pub lon_res: f64,

    /// Select timesteps by index before any action, formatted as <start>:<end>
    #[arg(long, value_parser = parse_range_arg)]
    pub isel_time: Option<Range<usize>>,

    /// Reduce every variable over a dimension, formatted as <dim>:<mean|sum|min|max>
    #[arg(long, value_parser = parse_reduce_arg)]
    pub reduce: Option<(String, StatOperation)>,

    /// Describe a specific variable (shape, attributes and statistics)
    #[arg(long)]
    pub describe: Option<String>,

    /// Path to save the result as NetCDF
    #[arg(long)]
    pub output_netcdf: Option<PathBuf>,

    /// Path to save the result as a Zarr store
    #[arg(long)]
    pub output_zarr: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Number of threads to use for parallel processing. Defaults to number of CPU cores.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
}

impl Args {
    /// Whether any action besides the default summary was requested
    pub fn has_action(&self) -> bool {
        self.check
            || self.diminfo
            || self.verify.is_some()
            || self.reduce.is_some()
            || self.describe.is_some()
    }
}

fn parse_range_arg(s: &str) -> Result<Range<usize>, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [start, end] => {
            let start = start
                .parse::<usize>()
                .map_err(|_| "Invalid start index".to_string())?;
            let end = end
                .parse::<usize>()
                .map_err(|_| "Invalid end index".to_string())?;
            if start > end {
                return Err(format!("Invalid range {}:{}", start, end));
            }
            Ok(start..end)
        }
        _ => Err("Invalid format: Expected '<start>:<end>'.".to_string()),
    }
}

fn parse_reduce_arg(s: &str) -> Result<(String, StatOperation), String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [dim, op] => {
            let op = op.parse::<StatOperation>().map_err(|e| e.to_string())?;
            Ok((dim.to_string(), op))
        }
        _ => Err("Invalid format: Expected '<dimension>:<operation>'.".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_arg() {
        assert_eq!(parse_range_arg("0:10"), Ok(0..10));
        assert!(parse_range_arg("10:0").is_err());
        assert!(parse_range_arg("10").is_err());
    }

    #[test]
    fn test_verify_args() {
        let args = Args::parse_from([
            "archeck",
            "-f",
            "obs.nc",
            "--verify",
            "pred.nc",
            "--aggregating-dims",
            "time,node",
            "--reduce",
            "time:mean",
        ]);
        assert_eq!(args.aggregating_dims, vec!["time", "node"]);
        assert_eq!(args.reduce, Some(("time".to_string(), StatOperation::Mean)));
        assert!(args.has_action());
        assert_eq!(args.lat_res, 10.0);
    }

    #[test]
    fn test_default_is_summary() {
        let args = Args::parse_from(["archeck", "-f", "data.zarr"]);
        assert!(!args.has_action());
        assert_eq!(args.aggregating_dims, vec!["time"]);
    }
}
