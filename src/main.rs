//! Entry point for the ARCheck application.
//! Handles CLI parsing, dataset loading, and dispatches checks, dimension info, verification and summaries.

use archeck::checks::{
    check_ar_data_arrays, check_ar_datasets, check_finite_dataset, ArDataArrays, ArDatasets,
};
use archeck::cli::Args;
use archeck::data_source::open_dataset;
use archeck::diminfo::{get_ar_model_diminfo, ArSettings};
use archeck::labeled::{DataArray, Dataset, FEATURE_DIM, TIME_DIM};
use archeck::metadata::{describe_variable, print_dataset_summary};
use archeck::netcdf_io::NetCDFWriter;
use archeck::parallel::{get_parallel_info, ParallelConfig};
use archeck::verification::{Skill, VerificationOptions};
use archeck::workflow::{run_verification, WorkflowOptions};
use archeck::zarr_io::{ZarrStore, ZarrWriter};
use clap::Parser;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Datasets named on the command line
struct Inputs {
    training: Dataset,
    validation: Option<Dataset>,
    bc: Option<Dataset>,
    validation_bc: Option<Dataset>,
    static_data: Option<Dataset>,
}

/// The same inputs with their variables stacked along `feature`
struct FeatureArrays {
    training: DataArray,
    validation: Option<DataArray>,
    bc: Option<DataArray>,
    validation_bc: Option<DataArray>,
    static_data: Option<DataArray>,
}

impl FeatureArrays {
    fn ar_inputs(&self) -> ArDataArrays<'_> {
        let mut inputs = ArDataArrays::new(&self.training);
        if let Some(da) = &self.validation {
            inputs = inputs.with_validation_dynamic(da);
        }
        if let Some(da) = &self.bc {
            inputs = inputs.with_training_bc(da);
        }
        if let Some(da) = &self.validation_bc {
            inputs = inputs.with_validation_bc(da);
        }
        if let Some(da) = &self.static_data {
            inputs = inputs.with_static(da);
        }
        inputs
    }
}

async fn load(path: &Path, isel_time: Option<&Range<usize>>) -> archeck::Result<Dataset> {
    let ds = open_dataset(path).await?;
    match isel_time {
        Some(range) if ds.has_dim(TIME_DIM) => ds.isel(TIME_DIM, range.clone()),
        _ => Ok(ds),
    }
}

async fn load_optional(path: Option<&PathBuf>, isel_time: Option<&Range<usize>>) -> archeck::Result<Option<Dataset>> {
    match path {
        Some(path) => Ok(Some(load(path, isel_time).await?)),
        None => Ok(None),
    }
}

/// A dataset holding one variable along `feature` is used as is; otherwise
/// its variables become the `feature` labels.
fn feature_array(ds: &Dataset) -> archeck::Result<DataArray> {
    let names = ds.var_names();
    if ds.has_dim(FEATURE_DIM) && names.len() == 1 {
        return ds.data_array(names[0]);
    }
    ds.to_array(FEATURE_DIM)
}

fn feature_arrays(inputs: &Inputs) -> archeck::Result<FeatureArrays> {
    let optional = |ds: &Option<Dataset>| ds.as_ref().map(feature_array).transpose();
    Ok(FeatureArrays {
        training: feature_array(&inputs.training)?,
        validation: optional(&inputs.validation)?,
        bc: optional(&inputs.bc)?,
        validation_bc: optional(&inputs.validation_bc)?,
        static_data: optional(&inputs.static_data)?,
    })
}

fn run_checks(inputs: &Inputs, arrays: &FeatureArrays, verbose: bool) -> archeck::Result<()> {
    let mut datasets = ArDatasets::new(&inputs.training);
    if let Some(ds) = &inputs.validation {
        datasets = datasets.with_validation_dynamic(ds);
    }
    if let Some(ds) = &inputs.bc {
        datasets = datasets.with_training_bc(ds);
    }
    if let Some(ds) = &inputs.validation_bc {
        datasets = datasets.with_validation_bc(ds);
    }
    if let Some(ds) = &inputs.static_data {
        datasets = datasets.with_static(ds);
    }
    check_ar_datasets(&datasets, verbose)?;

    let all = [
        Some(&inputs.training),
        inputs.validation.as_ref(),
        inputs.bc.as_ref(),
        inputs.validation_bc.as_ref(),
        inputs.static_data.as_ref(),
    ];
    for ds in all.into_iter().flatten() {
        check_finite_dataset(ds)?;
    }

    check_ar_data_arrays(&arrays.ar_inputs(), verbose)?;
    println!("✅ All AR preprocessing checks passed");
    Ok(())
}

async fn save(result: &Dataset, args: &Args) -> archeck::Result<()> {
    if let Some(path) = &args.output_netcdf {
        NetCDFWriter::new(path).write_dataset(result)?;
        println!("✅ Saved result to {}", path.display());
    }
    if let Some(path) = &args.output_zarr {
        let store = ZarrStore::from_path_str(&path.to_string_lossy())?;
        ZarrWriter::new(store)
            .await?
            .with_chunk(TIME_DIM, 1)
            .write_dataset(result)
            .await?;
        println!("✅ Saved result to {}", path.display());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    println!(
        r#"
------------------------------------------------------------------
                 _    ____   ____ _               _
                / \  |  _ \ / ___| |__   ___  ___| | __
               / _ \ | |_) | |   | '_ \ / _ \/ __| |/ /
              / ___ \|  _ <| |___| | | |  __/ (__|   <
             /_/   \_\_| \_\\____|_| |_|\___|\___|_|\_\
              AR data checks and forecast verification
------------------------------------------------------------------
"#
    );

    ParallelConfig::new(args.threads).setup_global_pool()?;
    if args.verbose {
        get_parallel_info().print_info();
    }

    let isel_time = args.isel_time.as_ref();
    let ds = load(&args.file, isel_time).await?;
    println!("Successfully opened dataset: {}", args.file.display());

    let mut result: Option<Dataset> = None;

    if args.check || args.diminfo {
        let inputs = Inputs {
            validation: load_optional(args.validation.as_ref(), isel_time).await?,
            bc: load_optional(args.bc.as_ref(), isel_time).await?,
            validation_bc: load_optional(args.validation_bc.as_ref(), isel_time).await?,
            static_data: load_optional(args.static_data.as_ref(), None).await?,
            training: ds.clone(),
        };
        let arrays = feature_arrays(&inputs)?;

        if args.check {
            run_checks(&inputs, &arrays, args.verbose)?;
        }
        if args.diminfo {
            let settings = args
                .ar_settings
                .as_deref()
                .map(ArSettings::from_json_file)
                .transpose()?;
            let diminfo = get_ar_model_diminfo(
                &arrays.training,
                arrays.static_data.as_ref(),
                arrays.bc.as_ref(),
                settings.as_ref(),
            )?;
            println!("\n🧮 AR model dimension info");
            println!("{}", serde_json::to_string_pretty(&diminfo)?);
        }
    }

    if let Some(pred_path) = &args.verify {
        let pred = load(pred_path, isel_time).await?;
        let options = WorkflowOptions {
            verification: VerificationOptions {
                aggregating_dims: args.aggregating_dims.clone(),
                ..VerificationOptions::default()
            },
            healpix_nside: args.healpix_nside,
            lat_res: args.lat_res,
            lon_res: args.lon_res,
        };
        let report = run_verification(&pred, &ds, &options)?;
        report.print_global_table();
        report.print_summaries(Skill::Rmse);
        result = Some(report.skills);
    }

    if let Some((dim, op)) = &args.reduce {
        let source = result.as_ref().unwrap_or(&ds);
        let reduced = source.reduce(dim, *op)?;
        info!(dim = %dim, operation = op.as_str(), "reduced dataset");
        println!("\n🔻 {} over '{}'", op.as_str(), dim);
        print_dataset_summary(&reduced);
        result = Some(reduced);
    }

    if let Some(var) = &args.describe {
        describe_variable(result.as_ref().unwrap_or(&ds), var)?;
    }

    if !args.has_action() {
        print_dataset_summary(&ds);
    }

    if args.output_netcdf.is_some() || args.output_zarr.is_some() {
        save(result.as_ref().unwrap_or(&ds), &args).await?;
    }

    Ok(())
}
