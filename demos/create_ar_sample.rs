//! Creates sample AR datasets for trying out ARCheck.
//!
//! Writes hourly dynamic, boundary-condition and static fields on a HEALPix
//! nside=2 mesh (48 nodes) to NetCDF, plus a Zarr copy of the dynamic data and
//! an AR settings file.

use archeck::prelude::*;
use archeck::mesh::attach_node_coordinates;
use chrono::{NaiveDate, TimeDelta};
use ndarray::{Array1, Array2};
use std::path::Path;

const NSIDE: u32 = 2;
const N_TIMES: usize = 72;

fn field(lons: &[f64], lats: &[f64], base: f32, amplitude: f32, phase: f32) -> Array2<f32> {
    Array2::from_shape_fn((N_TIMES, lons.len()), |(t, n)| {
        let hour = t as f32 * std::f32::consts::TAU / 24.0;
        let lat_effect = -0.4 * lats[n].abs() as f32;
        let lon_effect = (lons[n].to_radians() as f32 + hour + phase).sin();
        base + lat_effect + amplitude * lon_effect
    })
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let nodes = healpix_ring_nodes(NSIDE)?;
    let start = NaiveDate::from_ymd_opt(2020, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("invalid start date")?;
    let times: Vec<_> = (0..N_TIMES as i64)
        .map(|h| start + TimeDelta::hours(h))
        .collect();

    println!("🔨 Creating sample AR datasets on a HEALPix nside={} mesh", NSIDE);

    let mut dynamic = Dataset::new()
        .with_var("t2m", [TIME_DIM, NODE_DIM], field(&nodes.lon, &nodes.lat, 288.0, 5.0, 0.0).into_dyn())?
        .with_var("z500", [TIME_DIM, NODE_DIM], field(&nodes.lon, &nodes.lat, 5500.0, 40.0, 1.0).into_dyn())?
        .with_coord(TIME_DIM, Coordinate::time(TIME_DIM, times.clone()))?;
    attach_node_coordinates(&mut dynamic, &nodes)?;
    dynamic.set_attr("title", "ARCheck sample dynamic data");

    let mut bc = Dataset::new()
        .with_var(
            "toa_radiation",
            [TIME_DIM, NODE_DIM],
            field(&nodes.lon, &nodes.lat, 340.0, 100.0, 0.5).into_dyn(),
        )?
        .with_coord(TIME_DIM, Coordinate::time(TIME_DIM, times))?;
    attach_node_coordinates(&mut bc, &nodes)?;

    let elevation = Array1::from_iter(nodes.lat.iter().map(|lat| (lat.abs() * 20.0) as f32));
    let mut static_data = Dataset::new()
        .with_var("elevation", [NODE_DIM], elevation.into_dyn())?
        .with_var("land_mask", [NODE_DIM], Array1::from_elem(nodes.len(), 1.0_f32).into_dyn())?;
    attach_node_coordinates(&mut static_data, &nodes)?;

    NetCDFWriter::new(Path::new("ar_dynamic.nc")).write_dataset(&dynamic)?;
    NetCDFWriter::new(Path::new("ar_bc.nc")).write_dataset(&bc)?;
    NetCDFWriter::new(Path::new("ar_static.nc")).write_dataset(&static_data)?;
    save_dataset(&dynamic, Path::new("ar_dynamic.zarr")).await?;

    let settings = ArSettings::new(vec![-3, -2, -1], vec![0]);
    std::fs::write("ar_settings.json", serde_json::to_string_pretty(&settings)?)?;

    println!("✅ Successfully created sample datasets:");
    println!("   📈 ar_dynamic.nc / ar_dynamic.zarr: t2m, z500 (time={}, node={})", N_TIMES, nodes.len());
    println!("   🌤️  ar_bc.nc: toa_radiation");
    println!("   🏔️  ar_static.nc: elevation, land_mask");
    println!("   ⚙️  ar_settings.json");
    println!("\n🧪 Try:");
    println!("   cargo run -- -f ar_dynamic.nc --bc ar_bc.nc --static-data ar_static.nc --check --diminfo --ar-settings ar_settings.json");
    println!("   cargo run --example verification_walkthrough");

    Ok(())
}
