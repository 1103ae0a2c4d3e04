use archeck::data_source::{is_zarr_path, open_dataset, open_reader, save_dataset};
use archeck::labeled::{Coordinate, Dataset, FEATURE_DIM, NODE_DIM, TIME_DIM};
use archeck::zarr_io::{ZarrReader, ZarrStore, ZarrWriter, DIMENSIONS_ATTRIBUTE};
use chrono::{NaiveDate, TimeDelta};
use ndarray::{ArrayD, IxDyn};
use serde_json::Map;
use tempfile::tempdir;

fn sample_dataset() -> Dataset {
    let start = NaiveDate::from_ymd_opt(2022, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let times = (0..5).map(|h| start + TimeDelta::hours(6 * h)).collect();
    let data: Vec<f32> = (0..5 * 4).map(|x| x as f32 * 0.5).collect();

    let mut ds = Dataset::new()
        .with_var(
            "t2m",
            [TIME_DIM, NODE_DIM],
            ArrayD::from_shape_vec(IxDyn(&[5, 4]), data).unwrap(),
        )
        .unwrap()
        .with_coord(TIME_DIM, Coordinate::time(TIME_DIM, times))
        .unwrap()
        .with_coord("lat", Coordinate::numeric(NODE_DIM, vec![-45.0, -15.0, 15.0, 45.0]))
        .unwrap();
    ds.set_attr("title", "zarr round trip");
    ds
}

#[tokio::test]
async fn test_read_write_zarr_array() {
    let test_dir = tempdir().unwrap();
    let store = ZarrStore::from_path(test_dir.path());

    // 10x10 array split in 4x4 chunks, the last row/column of chunks is partial
    let data: Vec<f32> = (0..100).map(|x| x as f32).collect();
    let array = ArrayD::from_shape_vec(IxDyn(&[10, 10]), data).unwrap();
    let dims = vec!["y".to_string(), "x".to_string()];

    let writer = ZarrWriter::new(store.clone()).await.unwrap();
    writer
        .write_array("test_array", &dims, &array, Some(vec![4, 4]), Map::new())
        .await
        .unwrap();
    assert!(test_dir.path().join("test_array").join("2.2").exists());

    let reader = ZarrReader::new(store).await.unwrap();
    let meta = reader.array_metadata("test_array").await.unwrap();
    assert_eq!(meta.shape, vec![10, 10]);
    assert_eq!(meta.chunks, vec![4, 4]);
    assert_eq!(meta.dtype, "<f4");
    assert_eq!(reader.array_dimensions("test_array").await.unwrap(), dims);

    let loaded = reader.read_array("test_array").await.unwrap();
    assert_eq!(loaded, array.mapv(f64::from));
}

#[tokio::test]
async fn test_missing_chunk_reads_fill_value() {
    let test_dir = tempdir().unwrap();
    let store = ZarrStore::from_path(test_dir.path());

    let array = ArrayD::from_elem(IxDyn(&[4, 2]), 1.0_f64);
    let writer = ZarrWriter::new(store.clone()).await.unwrap();
    writer
        .write_array("sparse", &["a".to_string(), "b".to_string()], &array, Some(vec![2, 2]), Map::new())
        .await
        .unwrap();
    std::fs::remove_file(test_dir.path().join("sparse").join("1.0")).unwrap();

    let loaded = ZarrReader::new(store).await.unwrap().read_array("sparse").await.unwrap();
    assert_eq!(loaded[[0, 0]], 1.0);
    assert!(loaded[[3, 1]].is_nan());
}

#[tokio::test]
async fn test_zarr_dataset_round_trip_with_chunks() {
    let test_dir = tempdir().unwrap();
    let path = test_dir.path().join("sample.zarr");
    let ds = sample_dataset();

    ZarrWriter::new(ZarrStore::from_path(&path))
        .await
        .unwrap()
        .with_chunk(TIME_DIM, 2)
        .write_dataset(&ds)
        .await
        .unwrap();

    let reader = ZarrReader::new(ZarrStore::from_path(&path)).await.unwrap();
    assert_eq!(reader.list_arrays().await.unwrap(), vec!["lat", "t2m", "time"]);
    let attrs = reader.array_attributes("t2m").await.unwrap();
    assert!(attrs.contains_key(DIMENSIONS_ATTRIBUTE));

    let loaded = reader.read_dataset().await.unwrap();
    let var = loaded.var("t2m").expect("t2m should be loaded");
    assert_eq!(var.data, ds.var("t2m").unwrap().data);
    assert_eq!(var.chunks, Some(vec![2, 4]));
    assert!(loaded.data_array("t2m").unwrap().is_lazy());

    assert_eq!(loaded.times().unwrap(), ds.times().unwrap());
    assert!(loaded.coord("lat").is_some());
    assert_eq!(loaded.attrs().get("title").map(String::as_str), Some("zarr round trip"));
    assert!(loaded.attrs().contains_key("history"));
}

#[tokio::test]
async fn test_label_coordinates_survive_zarr() {
    let test_dir = tempdir().unwrap();
    let path = test_dir.path().join("stacked.zarr");
    let ds = sample_dataset();
    let stacked = ds.to_array(FEATURE_DIM).unwrap();

    let mut out = Dataset::new();
    out.add_var("data", stacked.dims().to_vec(), stacked.data().clone())
        .unwrap();
    out.set_coord(FEATURE_DIM, stacked.coord(FEATURE_DIM).unwrap().clone())
        .unwrap();
    save_dataset(&out, &path).await.unwrap();

    let loaded = open_dataset(&path).await.unwrap();
    let da = loaded.data_array("data").unwrap();
    assert_eq!(da.labels(FEATURE_DIM).unwrap(), vec!["t2m"]);
}

#[tokio::test]
async fn test_open_dataset_dispatch() {
    let test_dir = tempdir().unwrap();
    let nc_path = test_dir.path().join("sample.nc");
    let zarr_path = test_dir.path().join("sample.zarr");
    let ds = sample_dataset();

    save_dataset(&ds, &nc_path).await.unwrap();
    save_dataset(&ds, &zarr_path).await.unwrap();
    assert!(!is_zarr_path(&nc_path));
    assert!(is_zarr_path(&zarr_path));

    let from_nc = open_dataset(&nc_path).await.unwrap();
    let from_zarr = open_dataset(&zarr_path).await.unwrap();
    assert_eq!(from_nc.var("t2m").unwrap().data, from_zarr.var("t2m").unwrap().data);
    assert_eq!(from_nc.times().unwrap(), from_zarr.times().unwrap());

    let reader = open_reader(&zarr_path).await.unwrap();
    assert_eq!(reader.list_variables().await.unwrap(), vec!["t2m"]);
}

#[tokio::test]
async fn test_missing_store_is_an_error() {
    let test_dir = tempdir().unwrap();
    let missing = ZarrStore::from_path(&test_dir.path().join("nope.zarr"));
    assert!(ZarrReader::new(missing).await.is_err());
    assert!(open_dataset(&test_dir.path().join("nope.nc")).await.is_err());
}
