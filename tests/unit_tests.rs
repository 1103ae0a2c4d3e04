//! Unit tests for the ARCheck checks, dimension info and labeled arrays
//!
//! These tests cover the preconditions reported to the training harness and
//! the bookkeeping behind them.

use archeck::{
    cf_time::{CfTimeUnits, TimeUnit},
    checks::{
        check_ar_data_arrays, check_ar_datasets, check_dimnames_data_array,
        check_dimnames_dataset, check_finite_dataset, ArDataArrays, ArDatasets,
    },
    diminfo::{get_ar_model_diminfo, ArSettings},
    errors::{ArCheckError, Result},
    labeled::{Coordinate, DataArray, Dataset, FEATURE_DIM, NODE_DIM, TIME_DIM},
    mesh::{attach_healpix_nodes, healpix_ring_nodes},
    statistics::{StatOperation, StatisticalReduction},
    timesteps::{check_no_missing_timesteps, check_timesteps, get_subset_timesteps_idxs},
};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use ndarray::{ArrayD, IxDyn};
use std::f64::consts::PI;
use tempfile::tempdir;

fn hourly(n: usize) -> Vec<NaiveDateTime> {
    let start = NaiveDate::from_ymd_opt(2021, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    (0..n).map(|h| start + TimeDelta::hours(h as i64)).collect()
}

fn dynamic_array(name: &str, times: Vec<NaiveDateTime>, n_nodes: usize, features: &[&str]) -> DataArray {
    let data = ArrayD::zeros(IxDyn(&[times.len(), n_nodes, features.len()]));
    DataArray::new(name, [TIME_DIM, NODE_DIM, FEATURE_DIM], data)
        .unwrap()
        .with_coord(TIME_DIM, Coordinate::time(TIME_DIM, times))
        .unwrap()
        .with_coord(FEATURE_DIM, Coordinate::labels(FEATURE_DIM, features.iter().copied()))
        .unwrap()
}

fn static_array(n_nodes: usize, features: &[&str]) -> DataArray {
    let data = ArrayD::ones(IxDyn(&[n_nodes, features.len()]));
    DataArray::new("static", [NODE_DIM, FEATURE_DIM], data)
        .unwrap()
        .with_coord(FEATURE_DIM, Coordinate::labels(FEATURE_DIM, features.iter().copied()))
        .unwrap()
}

fn dataset(times: Vec<NaiveDateTime>, n_nodes: usize, vars: &[&str]) -> Dataset {
    let mut ds = Dataset::new();
    for var in vars {
        ds.add_var(*var, [TIME_DIM, NODE_DIM], ArrayD::zeros(IxDyn(&[times.len(), n_nodes])))
            .unwrap();
    }
    ds.with_coord(TIME_DIM, Coordinate::time(TIME_DIM, times)).unwrap()
}

#[test]
fn test_check_timesteps_formats() -> Result<()> {
    let single = check_timesteps("2021-01-01T06:00:00")?;
    assert_eq!(single, vec![hourly(7)[6]]);

    let many = check_timesteps(vec!["2021-01-01".to_string(), "2021-01-01 12:00".to_string()])?;
    assert_eq!(many, vec![hourly(13)[0], hourly(13)[12]]);

    let empty = check_timesteps(Vec::<NaiveDateTime>::new());
    assert!(matches!(empty, Err(ArCheckError::InvalidTimesteps(msg)) if msg.contains("empty")));
    assert!(check_timesteps("not a date").is_err());

    assert_eq!(check_timesteps("2021-01-01T06")?, vec![hourly(7)[6]]);
    assert_eq!(check_timesteps("2021-01-01 6")?, vec![hourly(7)[6]]);
    assert!(check_timesteps("2021-01-01T25").is_err());
    assert!(check_timesteps("2021-01-01T").is_err());
    Ok(())
}

#[test]
fn test_subset_timesteps_idxs() -> Result<()> {
    let times = hourly(6);
    let outside = times[5] + TimeDelta::hours(100);

    assert_eq!(get_subset_timesteps_idxs(times.clone(), vec![times[3], times[1]], true)?, vec![1, 3]);

    let strict = get_subset_timesteps_idxs(times.clone(), vec![times[1], outside], true);
    match strict {
        Err(ArCheckError::SubsetNotWithin { missing }) => assert_eq!(missing, vec![outside]),
        other => panic!("expected SubsetNotWithin, got {:?}", other),
    }

    let relaxed = get_subset_timesteps_idxs(times.clone(), vec![times[1], outside], false)?;
    assert_eq!(relaxed, vec![1]);

    let none = get_subset_timesteps_idxs(times, vec![outside], false);
    assert!(matches!(none, Err(ArCheckError::InvalidTimesteps(_))));
    Ok(())
}

#[test]
fn test_no_missing_timesteps() {
    assert!(check_no_missing_timesteps(hourly(10), true).is_ok());
    assert!(check_no_missing_timesteps(hourly(1), false).is_ok());

    let empty = check_no_missing_timesteps(Vec::<NaiveDateTime>::new(), false);
    assert!(matches!(empty, Err(ArCheckError::MissingInput(msg)) if msg == "No data available !"));

    let full = hourly(10);
    let mut with_gap = full.clone();
    with_gap.remove(4);
    match check_no_missing_timesteps(with_gap, false) {
        Err(ArCheckError::MissingTimesteps { gaps }) => assert_eq!(gaps, vec![(full[3], full[5])]),
        other => panic!("expected MissingTimesteps, got {:?}", other),
    }

    // One 1h step and one 2h step: no dominant step to measure gaps against
    let tied = vec![full[0], full[1], full[3]];
    let err = check_no_missing_timesteps(tied, false).unwrap_err();
    assert!(matches!(&err, ArCheckError::MissingTimesteps { gaps } if gaps.is_empty()));
    assert!(err.to_string().contains("(irregular time step)"));
}

#[test]
fn test_check_dimnames() {
    let da = DataArray::new("x", [TIME_DIM, NODE_DIM], ArrayD::zeros(IxDyn(&[2, 3]))).unwrap();
    assert!(check_dimnames_data_array(&da, &[TIME_DIM, NODE_DIM], "dynamic DataArray").is_ok());
    match check_dimnames_data_array(&da, &[TIME_DIM, NODE_DIM, FEATURE_DIM], "dynamic DataArray") {
        Err(err @ ArCheckError::MissingDimensions { .. }) => {
            assert!(err.to_string().starts_with("The dynamic DataArray must have also the"));
            assert!(err.to_string().contains("feature"));
        }
        other => panic!("expected MissingDimensions, got {:?}", other),
    }

    let ds = dataset(hourly(3), 4, &["t2m"]);
    assert!(check_dimnames_dataset(&ds, &[TIME_DIM, NODE_DIM], "dynamic Dataset").is_ok());
    assert!(check_dimnames_dataset(&ds, &["level"], "dynamic Dataset").is_err());
}

#[test]
fn test_check_finite_dataset() {
    let mut ds = dataset(hourly(3), 2, &["a", "b"]);
    assert!(check_finite_dataset(&ds).is_ok());

    ds.var_mut("b").unwrap().data[[0, 1]] = f32::INFINITY;
    match check_finite_dataset(&ds) {
        Err(ArCheckError::NonFiniteValues { kind, variables }) => {
            assert_eq!(kind, "Inf");
            assert_eq!(variables, vec!["b"]);
        }
        other => panic!("expected Inf error, got {:?}", other),
    }

    ds.var_mut("a").unwrap().data[[2, 0]] = f32::NAN;
    match check_finite_dataset(&ds) {
        Err(ArCheckError::NonFiniteValues { kind, variables }) => {
            assert_eq!(kind, "NaN");
            assert_eq!(variables, vec!["a"]);
        }
        other => panic!("expected NaN error, got {:?}", other),
    }
}

#[test]
fn test_check_ar_data_arrays_valid_inputs() -> Result<()> {
    let train = dynamic_array("train", hourly(6), 4, &["t2m", "z500"]);
    let valid = dynamic_array("valid", hourly(4), 4, &["t2m", "z500"]);
    let train_bc = dynamic_array("train_bc", hourly(6), 4, &["toa"]);
    let valid_bc = dynamic_array("valid_bc", hourly(4), 4, &["toa"]);
    let stat = static_array(4, &["elevation"]);

    let inputs = ArDataArrays::new(&train)
        .with_validation_dynamic(&valid)
        .with_training_bc(&train_bc)
        .with_validation_bc(&valid_bc)
        .with_static(&stat);
    check_ar_data_arrays(&inputs, true)
}

#[test]
fn test_check_ar_data_arrays_failures() {
    let train = dynamic_array("train", hourly(6), 4, &["t2m"]);
    let valid = dynamic_array("valid", hourly(4), 4, &["t2m"]);
    let train_bc = dynamic_array("train_bc", hourly(6), 4, &["toa"]);
    let valid_bc = dynamic_array("valid_bc", hourly(4), 4, &["toa"]);

    let no_valid_dynamic = ArDataArrays::new(&train).with_validation_bc(&valid_bc);
    assert!(matches!(
        check_ar_data_arrays(&no_valid_dynamic, false),
        Err(ArCheckError::MissingInput(_))
    ));

    let no_valid_bc = ArDataArrays::new(&train)
        .with_validation_dynamic(&valid)
        .with_training_bc(&train_bc);
    assert!(matches!(
        check_ar_data_arrays(&no_valid_bc, false),
        Err(ArCheckError::MissingInput(msg)) if msg.contains("boundary conditions")
    ));

    let short_bc = dynamic_array("train_bc", hourly(5), 4, &["toa"]);
    let misaligned = ArDataArrays::new(&train).with_training_bc(&short_bc);
    assert!(matches!(
        check_ar_data_arrays(&misaligned, false),
        Err(ArCheckError::TimestepsMismatch { .. })
    ));

    let other_features = dynamic_array("valid", hourly(4), 4, &["t2m", "q"]);
    let mismatch = ArDataArrays::new(&train).with_validation_dynamic(&other_features);
    assert!(matches!(
        check_ar_data_arrays(&mismatch, false),
        Err(ArCheckError::DimensionOrderMismatch(_))
    ));

    let mut gappy_times = hourly(8);
    gappy_times.remove(2);
    let gappy = dynamic_array("train", gappy_times, 4, &["t2m"]);
    assert!(matches!(
        check_ar_data_arrays(&ArDataArrays::new(&gappy), false),
        Err(ArCheckError::MissingTimesteps { .. })
    ));

    let flat = DataArray::new("train", [TIME_DIM, NODE_DIM], ArrayD::zeros(IxDyn(&[2, 4]))).unwrap();
    assert!(matches!(
        check_ar_data_arrays(&ArDataArrays::new(&flat), false),
        Err(ArCheckError::MissingDimensions { .. })
    ));
}

#[test]
fn test_check_ar_datasets() -> Result<()> {
    let train = dataset(hourly(6), 3, &["t2m"]);
    let train_bc = dataset(hourly(6), 3, &["toa"]);
    let valid = dataset(hourly(3), 3, &["t2m"]);
    let valid_bc = dataset(hourly(3), 3, &["toa"]);
    let stat = Dataset::new().with_var("elevation", [NODE_DIM], ArrayD::zeros(IxDyn(&[3])))?;

    let inputs = ArDatasets::new(&train)
        .with_training_bc(&train_bc)
        .with_validation_dynamic(&valid)
        .with_validation_bc(&valid_bc)
        .with_static(&stat);
    check_ar_datasets(&inputs, false)?;

    let late_bc = dataset(hourly(7)[1..].to_vec(), 3, &["toa"]);
    let misaligned = ArDatasets::new(&train).with_training_bc(&late_bc);
    assert!(matches!(
        check_ar_datasets(&misaligned, false),
        Err(ArCheckError::TimestepsMismatch { what }) if what.contains("training")
    ));

    let no_time = Dataset::new().with_var("t2m", [NODE_DIM], ArrayD::zeros(IxDyn(&[3])))?;
    assert!(matches!(
        check_ar_datasets(&ArDatasets::new(&no_time), false),
        Err(ArCheckError::MissingDimensions { .. })
    ));
    Ok(())
}

#[test]
fn test_diminfo_feature_order() -> Result<()> {
    let dynamic = dynamic_array("dynamic", hourly(5), 4, &["t2m", "z500"]);
    let bc = dynamic_array("bc", hourly(5), 4, &["toa"]);
    let stat = static_array(4, &["elevation", "land_mask"]);

    let info = get_ar_model_diminfo(&dynamic, Some(&stat), Some(&bc), None)?;
    assert_eq!(
        info.input_features,
        vec!["elevation", "land_mask", "toa", "t2m", "z500"]
    );
    assert_eq!(info.output_features, vec!["t2m", "z500"]);
    assert_eq!(info.input_feature_dim, 5);
    assert_eq!(info.output_feature_dim, 2);
    assert_eq!(info.input_node_dim, 4);
    assert_eq!(info.dim_order, vec!["sample", "time", "node", "feature"]);
    assert_eq!(info.input_shape, None);
    assert_eq!(info.input_time_dim, None);

    let json = serde_json::to_value(&info)?;
    assert!(json.get("input_features").is_some());
    assert!(json.get("input_shape").is_none());
    Ok(())
}

#[test]
fn test_diminfo_with_settings() -> Result<()> {
    let dynamic = dynamic_array("dynamic", hourly(5), 4, &["t2m", "z500"]);
    let bc = dynamic_array("bc", hourly(5), 4, &["toa"]);
    let settings = ArSettings::new(vec![-2, -1], vec![0]);

    let info = get_ar_model_diminfo(&dynamic, None, Some(&bc), Some(&settings))?;
    assert_eq!(info.input_time_dim, Some(2));
    assert_eq!(info.output_time_dim, Some(1));
    assert_eq!(info.input_shape, Some(vec![2, 4, 3]));
    assert_eq!(info.output_shape, Some(vec![1, 4, 2]));

    let node_first = dynamic.transpose(&[NODE_DIM, TIME_DIM, FEATURE_DIM])?;
    let info = get_ar_model_diminfo(&node_first, None, None, Some(&settings))?;
    assert_eq!(info.dim_order, vec!["sample", "node", "time", "feature"]);
    assert_eq!(info.input_shape, Some(vec![4, 2, 2]));
    Ok(())
}

#[test]
fn test_diminfo_errors() {
    let dynamic = dynamic_array("dynamic", hourly(5), 4, &["t2m"]);
    let bc = dynamic_array("bc", hourly(5), 4, &["toa"])
        .transpose(&[NODE_DIM, TIME_DIM, FEATURE_DIM])
        .unwrap();
    assert!(matches!(
        get_ar_model_diminfo(&dynamic, None, Some(&bc), None),
        Err(ArCheckError::DimensionOrderMismatch(_))
    ));

    let members = DataArray::new(
        "ens",
        [TIME_DIM, NODE_DIM, FEATURE_DIM, "member"],
        ArrayD::zeros(IxDyn(&[3, 4, 1, 2])),
    )
    .unwrap();
    let info = get_ar_model_diminfo(&members, None, None, None).unwrap();
    assert_eq!(info.output_features, vec!["0"]);
    let settings = ArSettings::new(vec![-1], vec![0]);
    assert!(get_ar_model_diminfo(&members, None, None, Some(&settings)).is_err());
}

#[test]
fn test_ar_settings_validation() -> Result<()> {
    assert!(ArSettings::new(vec![-3, -2, -1], vec![0, 1]).validate().is_ok());
    assert!(ArSettings::new(vec![-1, 0], vec![0]).validate().is_err());
    assert!(ArSettings::new(vec![], vec![0]).validate().is_err());
    assert!(ArSettings::new(vec![-1], vec![-1]).validate().is_err());
    assert!(ArSettings::new(vec![-1, -1], vec![0]).validate().is_err());
    let mut settings = ArSettings::new(vec![-1], vec![0]);
    settings.forecast_cycle = 0;
    assert!(matches!(settings.validate(), Err(ArCheckError::Settings(_))));

    let dir = tempdir()?;
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"input_k": [-3, -2, -1], "output_k": [0]}"#)?;
    let loaded = ArSettings::from_json_file(&path)?;
    assert_eq!(loaded.input_k, vec![-3, -2, -1]);
    assert_eq!(loaded.forecast_cycle, 1);
    assert_eq!(loaded.ar_iterations, 6);
    assert!(loaded.stack_most_recent_prediction);

    std::fs::write(&path, r#"{"input_k": [1], "output_k": [0]}"#)?;
    assert!(ArSettings::from_json_file(&path).is_err());
    Ok(())
}

#[test]
fn test_data_array_labels_and_reduce() -> Result<()> {
    assert!(DataArray::new("x", [TIME_DIM], ArrayD::<f32>::zeros(IxDyn(&[2, 2]))).is_err());
    assert!(DataArray::new("x", [TIME_DIM, TIME_DIM], ArrayD::<f32>::zeros(IxDyn(&[2, 2]))).is_err());

    let data = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![1.0, f32::NAN, 3.0, 5.0, 7.0, 9.0])?;
    let da = DataArray::new("x", [NODE_DIM, FEATURE_DIM], data)?;
    assert_eq!(da.labels(FEATURE_DIM)?, vec!["0", "1", "2"]);
    assert!(da
        .clone()
        .with_coord(FEATURE_DIM, Coordinate::labels(FEATURE_DIM, ["a", "b"]))
        .is_err());
    assert!(!da.is_lazy());

    let mean = da.reduce(NODE_DIM, StatOperation::Mean)?;
    assert_eq!(mean.dims(), &[FEATURE_DIM.to_string()]);
    assert_eq!(mean.data().as_slice().unwrap(), &[3.0, 7.0, 6.0]);

    let transposed = da.transpose(&[FEATURE_DIM, NODE_DIM])?;
    assert_eq!(transposed.shape(), &[3, 2]);
    assert_eq!(transposed.data()[[2, 1]], 9.0);
    assert!(da.transpose(&[FEATURE_DIM]).is_err());
    Ok(())
}

#[test]
fn test_dataset_selection_and_stacking() -> Result<()> {
    let times = hourly(6);
    let ds = dataset(times.clone(), 3, &["t2m", "z500"]);
    assert_eq!(ds.dim_size(TIME_DIM), Some(6));

    let subset = ds.isel(TIME_DIM, 2..5)?;
    assert_eq!(subset.times()?, &times[2..5]);
    assert_eq!(subset.var("t2m").unwrap().data.shape(), &[3, 3]);
    assert!(ds.isel(TIME_DIM, 4..8).is_err());

    let stacked = ds.to_array(FEATURE_DIM)?;
    assert_eq!(stacked.dims(), &[TIME_DIM, NODE_DIM, FEATURE_DIM]);
    assert_eq!(stacked.shape(), &[6, 3, 2]);
    assert_eq!(stacked.labels(FEATURE_DIM)?, vec!["t2m", "z500"]);
    assert_eq!(stacked.times()?.len(), 6);

    let mut bad = ds.clone();
    assert!(bad
        .add_var("q", [TIME_DIM, NODE_DIM], ArrayD::zeros(IxDyn(&[5, 3])))
        .is_err());
    Ok(())
}

#[test]
fn test_reductions_skip_non_finite() -> Result<()> {
    assert!(StatOperation::Mean.apply([f32::NAN, f32::NAN].into_iter()).is_nan());
    assert_eq!(StatOperation::Sum.apply([f32::NAN].into_iter()), 0.0);
    assert_eq!(StatOperation::Max.apply([1.0, f32::INFINITY, 4.0].into_iter()), 4.0);
    assert_eq!("min".parse::<StatOperation>()?, StatOperation::Min);
    assert!("median".parse::<StatOperation>().is_err());

    let data = ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1.0, 2.0, f32::NAN, 4.0])?;
    let min = data.reduce_along_axis(0, StatOperation::Min)?;
    assert_eq!(min.as_slice().unwrap(), &[1.0, 2.0]);
    assert!(data.reduce_along_axis(2, StatOperation::Min).is_err());
    Ok(())
}

#[test]
fn test_cf_time_units() -> Result<()> {
    let units = CfTimeUnits::parse("days since 2000-01-01")?;
    assert_eq!(units.unit, TimeUnit::Days);
    let decoded = units.decode(1.5)?;
    assert_eq!(
        decoded,
        NaiveDate::from_ymd_opt(2000, 1, 2).unwrap().and_hms_opt(12, 0, 0).unwrap()
    );
    assert_eq!(units.encode(decoded), 1.5);
    assert!(matches!(units.decode(f64::NAN), Err(ArCheckError::InvalidTimesteps(_))));
    assert!(units.decode(f64::INFINITY).is_err());
    assert_eq!(
        CfTimeUnits::parse("hours since 1970-01-01 00:00:00")?.to_string(),
        "hours since 1970-01-01 00:00:00"
    );
    assert!(CfTimeUnits::parse("meters since 2000-01-01").is_err());
    assert!(!CfTimeUnits::is_time_units("degrees_north"));
    Ok(())
}

#[test]
fn test_healpix_nodes() -> Result<()> {
    assert!(healpix_ring_nodes(0).is_err());

    let nodes = healpix_ring_nodes(1)?;
    assert_eq!(nodes.len(), 12);
    assert!((nodes.lat[0] - (2.0_f64 / 3.0).asin().to_degrees()).abs() < 1e-9);
    assert!((nodes.lon[0] - 45.0).abs() < 1e-9);
    assert!((nodes.lat[11] + (2.0_f64 / 3.0).asin().to_degrees()).abs() < 1e-9);

    let nodes = healpix_ring_nodes(2)?;
    assert_eq!(nodes.len(), 48);
    assert!((nodes.area.iter().sum::<f64>() - 4.0 * PI).abs() < 1e-9);
    assert!(nodes.lat.iter().all(|lat| (-90.0..=90.0).contains(lat)));
    assert!(nodes.lon.iter().all(|lon| (0.0..360.0).contains(lon)));
    assert!(nodes.lat.iter().sum::<f64>().abs() < 1e-6);

    let mut ds = dataset(hourly(2), 12, &["t2m"]);
    attach_healpix_nodes(&mut ds, 1)?;
    assert!(ds.coord("lat").is_some());
    assert!(attach_healpix_nodes(&mut ds, 2).is_err());
    Ok(())
}

#[test]
fn test_error_messages() {
    let times = hourly(3);
    let err = ArCheckError::MissingTimesteps {
        gaps: vec![(times[0], times[2])],
    };
    assert!(err.to_string().contains("2021-01-01 00:00:00 and 2021-01-01 02:00:00"));

    let err = ArCheckError::TimestepsMismatch {
        what: "training dynamic Dataset and the training boundary conditions Dataset".to_string(),
    };
    assert_eq!(
        err.to_string(),
        "The training dynamic Dataset and the training boundary conditions Dataset do not have the same timesteps!"
    );

    let err = ArCheckError::VariableNotFound {
        var: "temp".to_string(),
    };
    assert!(err.to_string().contains("Variable 'temp' not found"));
}
