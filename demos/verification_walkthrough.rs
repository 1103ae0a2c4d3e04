//! Walkthrough of the forecast verification workflow.
//!
//! Loads the sample dynamic dataset (run `create_ar_sample` first), builds a
//! biased forecast for the first ten timesteps, computes the deterministic
//! skills and their spatial and temporal summaries, then exports the skill
//! fields for external plotting.

use archeck::metadata::describe_variable;
use archeck::prelude::*;
use archeck::workflow::print_skill_series;
use std::path::Path;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    ParallelConfig::all_cores().setup_global_pool()?;

    let path = Path::new("ar_dynamic.nc");
    if !path.exists() {
        println!("❌ {} not found. Run: cargo run --example create_ar_sample", path.display());
        return Ok(());
    }

    let obs = open_dataset(path).await?.isel(TIME_DIM, 0..10)?;
    check_finite_dataset(&obs)?;
    check_no_missing_timesteps(obs.times()?.to_vec(), true)?;

    // Stand-in forecast: observations with a constant warm bias and a small
    // node-dependent error.
    let mut pred = obs.mapv(|v| v + 0.15);
    if let Some(t2m) = pred.var_mut("t2m") {
        t2m.data.indexed_iter_mut().for_each(|(idx, v)| {
            *v += 0.01 * (idx[1] % 7) as f32;
        });
    }

    // Skills over time: one skill field per node
    let options = WorkflowOptions {
        healpix_nside: Some(2),
        lat_res: 30.0,
        lon_res: 90.0,
        ..WorkflowOptions::default()
    };
    let report = run_verification(&pred, &obs, &options)?;
    report.print_global_table();
    report.print_summaries(Skill::Rmse);
    report.print_summaries(Skill::Bias);

    // Skills over space: one value per timestep
    let temporal = deterministic(&pred, &obs, &VerificationOptions::over(&[NODE_DIM]))?;
    print_skill_series(&temporal, TIME_DIM, Skill::Rmse);

    // Climatology the skill maps are read against
    let climatology = obs.reduce(TIME_DIM, StatOperation::Mean)?;
    describe_variable(&climatology, "t2m")?;

    save_dataset(&report.skills, Path::new("skills.nc")).await?;
    save_dataset(&report.skills, Path::new("skills.zarr")).await?;
    if let Some(lat) = &report.latitudinal {
        save_dataset(lat, Path::new("skills_latitudinal.nc")).await?;
    }
    println!("\n✅ Skill fields saved to skills.nc and skills.zarr");
    Ok(())
}
