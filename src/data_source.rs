//! Data source abstraction for unified NetCDF and Zarr interfaces
//!
//! [`open_dataset`] and [`save_dataset`] pick the backend from the path: a
//! directory or a `.zarr` suffix is a Zarr store, anything else is NetCDF.

use crate::errors::Result;
use crate::labeled::Dataset;
use crate::netcdf_io::{self, NetCDFWriter};
use crate::zarr_io::{ZarrReader, ZarrStore, ZarrWriter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::info;

/// Reading a whole dataset from a source
#[async_trait]
pub trait DatasetReader {
    /// Names of the data variables available in the source
    async fn list_variables(&self) -> Result<Vec<String>>;

    async fn read_dataset(&self) -> Result<Dataset>;
}

/// Writing a whole dataset to a destination
#[async_trait]
pub trait DatasetWriter {
    async fn write_dataset(&self, ds: &Dataset) -> Result<()>;
}

/// A NetCDF file
#[derive(Debug, Clone)]
pub struct NetCDFSource {
    pub path: PathBuf,
}

impl NetCDFSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl DatasetReader for NetCDFSource {
    async fn list_variables(&self) -> Result<Vec<String>> {
        let ds = netcdf_io::read_dataset(&self.path)?;
        Ok(ds.var_names().into_iter().map(str::to_string).collect())
    }

    async fn read_dataset(&self) -> Result<Dataset> {
        netcdf_io::read_dataset(&self.path)
    }
}

#[async_trait]
impl DatasetWriter for NetCDFSource {
    async fn write_dataset(&self, ds: &Dataset) -> Result<()> {
        NetCDFWriter::new(&self.path).write_dataset(ds)
    }
}

#[async_trait]
impl DatasetReader for ZarrReader {
    async fn list_variables(&self) -> Result<Vec<String>> {
        let ds = ZarrReader::read_dataset(self).await?;
        Ok(ds.var_names().into_iter().map(str::to_string).collect())
    }

    async fn read_dataset(&self) -> Result<Dataset> {
        ZarrReader::read_dataset(self).await
    }
}

#[async_trait]
impl DatasetWriter for ZarrWriter {
    async fn write_dataset(&self, ds: &Dataset) -> Result<()> {
        ZarrWriter::write_dataset(self, ds).await
    }
}

/// Whether `path` names a Zarr store rather than a NetCDF file
pub fn is_zarr_path(path: &Path) -> bool {
    path.is_dir() || path.extension().is_some_and(|ext| ext == "zarr")
}

/// Open the reader matching the format of `path`
pub async fn open_reader(path: &Path) -> Result<Box<dyn DatasetReader + Send + Sync>> {
    if is_zarr_path(path) {
        let store = ZarrStore::from_path_str(&path.to_string_lossy())?;
        Ok(Box::new(ZarrReader::new(store).await?))
    } else {
        Ok(Box::new(NetCDFSource::new(path)))
    }
}

/// Read a NetCDF file or Zarr store into memory
pub async fn open_dataset(path: &Path) -> Result<Dataset> {
    info!(path = %path.display(), "opening dataset");
    open_reader(path).await?.read_dataset().await
}

/// Write a dataset to NetCDF or Zarr depending on the path
pub async fn save_dataset(ds: &Dataset, path: &Path) -> Result<()> {
    if is_zarr_path(path) {
        let store = ZarrStore::from_path_str(&path.to_string_lossy())?;
        ZarrWriter::new(store).await?.write_dataset(ds).await
    } else {
        NetCDFSource::new(path).write_dataset(ds).await
    }
}
