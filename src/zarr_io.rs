//! Zarr v2 dataset I/O
//!
//! Reads and writes xarray-style Zarr v2 groups on the local filesystem: one
//! array per variable, dimension names in the `_ARRAY_DIMENSIONS` attribute and
//! raw little-endian chunks in C order. Compressed chunks are not supported.

use crate::cf_time::{CfTimeUnits, DEFAULT_TIME_UNITS};
use crate::errors::{ArCheckError, Result};
use crate::labeled::{Attributes, CoordValues, Coordinate, Dataset, Variable};
use crate::netcdf_io::{AUXILIARY_COORDS, LABELS_ATTRIBUTE};
use chrono::Utc;
use ndarray::{ArrayD, IxDyn, Slice};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Attribute holding the dimension names of an array
pub const DIMENSIONS_ATTRIBUTE: &str = "_ARRAY_DIMENSIONS";

type JsonAttributes = Map<String, JsonValue>;

/// Location of a Zarr store
#[derive(Debug, Clone)]
pub struct ZarrStore {
    /// Local filesystem path
    pub path: PathBuf,
}

impl ZarrStore {
    /// Create a new ZarrStore from a path string
    pub fn from_path_str(s: &str) -> Result<Self> {
        if s.starts_with("s3://") || s.starts_with("gs://") || s.starts_with("https://") {
            return Err(ArCheckError::Zarr(
                "Cloud storage is not supported. Please use local filesystem paths.".to_string(),
            ));
        }
        Ok(ZarrStore {
            path: PathBuf::from(s),
        })
    }

    pub fn from_path(path: &Path) -> Self {
        ZarrStore {
            path: path.to_path_buf(),
        }
    }
}

/// Contents of a `.zarray` file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayMetadata {
    pub zarr_format: u8,
    pub shape: Vec<usize>,
    pub chunks: Vec<usize>,
    pub dtype: String,
    #[serde(default)]
    pub compressor: Option<JsonValue>,
    #[serde(default)]
    pub fill_value: Option<JsonValue>,
    #[serde(default = "default_order")]
    pub order: String,
    #[serde(default)]
    pub filters: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension_separator: Option<String>,
}

fn default_order() -> String {
    "C".to_string()
}

impl ArrayMetadata {
    /// Fill value as a float; `"NaN"`, `"Infinity"` and `"-Infinity"` are accepted
    pub fn fill_value_f64(&self) -> Option<f64> {
        json_number(self.fill_value.as_ref()?)
    }

    fn check_supported(&self, name: &str) -> Result<()> {
        if self.zarr_format != 2 {
            return Err(ArCheckError::Zarr(format!(
                "array '{name}' uses zarr_format {}, only 2 is supported",
                self.zarr_format
            )));
        }
        if self.compressor.as_ref().is_some_and(|c| !c.is_null()) {
            return Err(ArCheckError::Zarr(format!(
                "array '{name}' is compressed; only uncompressed stores are supported"
            )));
        }
        if self
            .filters
            .as_ref()
            .is_some_and(|f| !f.is_null() && f.as_array().map_or(true, |a| !a.is_empty()))
        {
            return Err(ArCheckError::Zarr(format!("array '{name}' uses filters")));
        }
        if self.order != "C" {
            return Err(ArCheckError::Zarr(format!(
                "array '{name}' has '{}' order, only C order is supported",
                self.order
            )));
        }
        if self.chunks.len() != self.shape.len() || self.chunks.contains(&0) {
            return Err(ArCheckError::Zarr(format!(
                "array '{name}' has invalid chunks {:?} for shape {:?}",
                self.chunks, self.shape
            )));
        }
        Ok(())
    }
}

fn json_number(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
enum Dtype {
    F4,
    F8,
    I4,
    I8,
}

impl Dtype {
    fn parse(dtype: &str) -> Result<Self> {
        match dtype {
            "<f4" => Ok(Self::F4),
            "<f8" => Ok(Self::F8),
            "<i4" => Ok(Self::I4),
            "<i8" => Ok(Self::I8),
            other => Err(ArCheckError::Zarr(format!("unsupported dtype '{other}'"))),
        }
    }

    fn size(self) -> usize {
        match self {
            Self::F4 | Self::I4 => 4,
            Self::F8 | Self::I8 => 8,
        }
    }

    fn decode(self, bytes: &[u8]) -> Vec<f64> {
        match self {
            Self::F4 => bytes
                .chunks_exact(4)
                .map(|b| f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .collect(),
            Self::I4 => bytes
                .chunks_exact(4)
                .map(|b| f64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])))
                .collect(),
            Self::F8 => bytes
                .chunks_exact(8)
                .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
                .collect(),
            Self::I8 => bytes
                .chunks_exact(8)
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
                .collect(),
        }
    }
}

/// Element types that can be written as Zarr chunks
pub trait ZarrElement: Copy + Send + Sync {
    const DTYPE: &'static str;

    fn fill() -> Self;

    fn fill_json() -> JsonValue;

    fn extend_le(self, out: &mut Vec<u8>);
}

impl ZarrElement for f32 {
    const DTYPE: &'static str = "<f4";

    fn fill() -> Self {
        f32::NAN
    }

    fn fill_json() -> JsonValue {
        JsonValue::from("NaN")
    }

    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl ZarrElement for f64 {
    const DTYPE: &'static str = "<f8";

    fn fill() -> Self {
        f64::NAN
    }

    fn fill_json() -> JsonValue {
        JsonValue::from("NaN")
    }

    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl ZarrElement for i32 {
    const DTYPE: &'static str = "<i4";

    fn fill() -> Self {
        0
    }

    fn fill_json() -> JsonValue {
        JsonValue::from(0)
    }

    fn extend_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Indices of every chunk of the grid, in C order
fn chunk_grid(shape: &[usize], chunks: &[usize]) -> Vec<Vec<usize>> {
    let mut grid = vec![Vec::new()];
    for (&n, &c) in shape.iter().zip(chunks) {
        let count = n.div_ceil(c);
        grid = grid
            .into_iter()
            .flat_map(|prefix| {
                (0..count).map(move |i| {
                    let mut idx = prefix.clone();
                    idx.push(i);
                    idx
                })
            })
            .collect();
    }
    grid
}

fn chunk_key(idx: &[usize], separator: &str) -> String {
    if idx.is_empty() {
        return "0".to_string();
    }
    idx.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Start and valid extent of a chunk along every axis
fn chunk_bounds(idx: &[usize], shape: &[usize], chunks: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let starts: Vec<usize> = idx.iter().zip(chunks).map(|(i, c)| i * c).collect();
    let extents = starts
        .iter()
        .zip(shape)
        .zip(chunks)
        .map(|((&s, &n), &c)| c.min(n - s))
        .collect();
    (starts, extents)
}

fn read_json(path: &Path) -> Result<JsonAttributes> {
    if !path.exists() {
        return Ok(JsonAttributes::new());
    }
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        JsonValue::Object(map) => Ok(map),
        _ => Err(ArCheckError::Zarr(format!(
            "{} does not hold a JSON object",
            path.display()
        ))),
    }
}

fn string_attrs(attrs: &JsonAttributes, skip: &[&str]) -> Attributes {
    attrs
        .iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
        .collect()
}

fn string_list(value: Option<&JsonValue>) -> Option<Vec<String>> {
    match value? {
        JsonValue::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect(),
        JsonValue::String(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    }
}

/// Zarr reader for xarray-style groups
pub struct ZarrReader {
    store: ZarrStore,
}

impl ZarrReader {
    /// Create a new ZarrReader, checking that the store is a directory
    pub async fn new(store: ZarrStore) -> Result<Self> {
        if !store.path.exists() {
            return Err(ArCheckError::Zarr(format!(
                "Zarr store path does not exist: {:?}",
                store.path
            )));
        }
        if !store.path.is_dir() {
            return Err(ArCheckError::Zarr(format!(
                "Zarr store path is not a directory: {:?}",
                store.path
            )));
        }
        Ok(ZarrReader { store })
    }

    /// List all arrays in the store, sorted by name
    pub async fn list_arrays(&self) -> Result<Vec<String>> {
        let mut arrays = Vec::new();
        for entry in std::fs::read_dir(&self.store.path)? {
            let path = entry?.path();
            if path.is_dir() && path.join(".zarray").exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    arrays.push(name.to_string());
                }
            }
        }
        arrays.sort();
        Ok(arrays)
    }

    /// Parse the `.zarray` file of an array
    pub async fn array_metadata(&self, name: &str) -> Result<ArrayMetadata> {
        let path = self.store.path.join(name).join(".zarray");
        if !path.exists() {
            return Err(ArCheckError::VariableNotFound {
                var: name.to_string(),
            });
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Attributes (`.zattrs`) of an array
    pub async fn array_attributes(&self, name: &str) -> Result<JsonAttributes> {
        read_json(&self.store.path.join(name).join(".zattrs"))
    }

    /// Dimension names of an array
    pub async fn array_dimensions(&self, name: &str) -> Result<Vec<String>> {
        let attrs = self.array_attributes(name).await?;
        string_list(attrs.get(DIMENSIONS_ATTRIBUTE)).ok_or_else(|| {
            ArCheckError::Zarr(format!(
                "array '{name}' has no {DIMENSIONS_ATTRIBUTE} attribute"
            ))
        })
    }

    /// Read an entire array; missing chunks hold the fill value
    pub async fn read_array(&self, name: &str) -> Result<ArrayD<f64>> {
        let meta = self.array_metadata(name).await?;
        meta.check_supported(name)?;
        let dtype = Dtype::parse(&meta.dtype)?;
        let fill = meta.fill_value_f64().unwrap_or(f64::NAN);
        let separator = meta.dimension_separator.as_deref().unwrap_or(".");
        let chunk_len: usize = meta.chunks.iter().product();
        let dir = self.store.path.join(name);

        let grid = chunk_grid(&meta.shape, &meta.chunks);
        debug!(array = name, chunks = grid.len(), "reading Zarr chunks");

        let chunks = grid
            .into_par_iter()
            .map(|idx| {
                let key = chunk_key(&idx, separator);
                let values = match std::fs::read(dir.join(&key)) {
                    Ok(bytes) if bytes.len() == chunk_len * dtype.size() => dtype.decode(&bytes),
                    Ok(bytes) => {
                        return Err(ArCheckError::Zarr(format!(
                            "chunk '{key}' of '{name}' has {} bytes, expected {}",
                            bytes.len(),
                            chunk_len * dtype.size()
                        )))
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => vec![fill; chunk_len],
                    Err(e) => return Err(e.into()),
                };
                Ok((idx, values))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut out = ArrayD::from_elem(IxDyn(&meta.shape), fill);
        for (idx, values) in chunks {
            let chunk = ArrayD::from_shape_vec(IxDyn(&meta.chunks), values)?;
            let (starts, extents) = chunk_bounds(&idx, &meta.shape, &meta.chunks);
            let src = chunk.slice_each_axis(|ax| Slice::from(0..extents[ax.axis.index()]));
            out.slice_each_axis_mut(|ax| {
                let i = ax.axis.index();
                Slice::from(starts[i]..starts[i] + extents[i])
            })
            .assign(&src);
        }
        Ok(out)
    }

    /// Read the whole group into a [`Dataset`]
    pub async fn read_dataset(&self) -> Result<Dataset> {
        let names = self.list_arrays().await?;

        let mut coord_names: HashSet<String> = AUXILIARY_COORDS.iter().map(|s| s.to_string()).collect();
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let attrs = self.array_attributes(&name).await?;
            if let Some(listed) = string_list(attrs.get("coordinates")) {
                coord_names.extend(listed);
            }
            let dims = self.array_dimensions(&name).await?;
            entries.push((name, dims, attrs));
        }

        let mut ds = Dataset::new();
        for (name, dims, attrs) in entries {
            let data = self.read_array(&name).await?;

            if dims.len() == 1 && (dims[0] == name || coord_names.contains(&name)) {
                let coord = read_coordinate(&dims[0], &data, &attrs)?;
                ds.set_coord(name, coord)?;
                continue;
            }

            let fill = attrs.get("_FillValue").and_then(json_number);
            let data = data.mapv(|v| match fill {
                Some(fv) if v == fv => f32::NAN,
                _ => v as f32,
            });
            let chunks = self.array_metadata(&name).await?.chunks;
            let mut var = Variable::new(dims, data).with_attrs(string_attrs(
                &attrs,
                &[DIMENSIONS_ATTRIBUTE, "coordinates", "_FillValue"],
            ));
            if chunks.as_slice() != var.data.shape() {
                var.chunks = Some(chunks);
            }
            ds.insert_var(name, var)?;
        }

        let root_attrs = read_json(&self.store.path.join(".zattrs"))?;
        for (key, value) in string_attrs(&root_attrs, &[]) {
            ds.set_attr(key, value);
        }
        Ok(ds)
    }
}

fn read_coordinate(dim: &str, data: &ArrayD<f64>, attrs: &JsonAttributes) -> Result<Coordinate> {
    if let Some(labels) = string_list(attrs.get(LABELS_ATTRIBUTE)).filter(|l| l.len() == data.len()) {
        return Ok(Coordinate::labels(dim, labels));
    }
    let values: Vec<f64> = data.iter().copied().collect();
    match attrs.get("units").and_then(JsonValue::as_str) {
        Some(units) if CfTimeUnits::is_time_units(units) => {
            let units = CfTimeUnits::parse(units)?;
            Ok(Coordinate::time(dim, units.decode_all(&values)?))
        }
        _ => Ok(Coordinate::numeric(dim, values)),
    }
}

/// Zarr writer for xarray-style groups
pub struct ZarrWriter {
    store: ZarrStore,
    chunk_shapes: Vec<(String, usize)>,
}

impl ZarrWriter {
    /// Create a new ZarrWriter, creating the store directory if needed
    pub async fn new(store: ZarrStore) -> Result<Self> {
        std::fs::create_dir_all(&store.path)?;
        Ok(ZarrWriter {
            store,
            chunk_shapes: Vec::new(),
        })
    }

    /// Chunk data variables with `size` elements along `dim`
    pub fn with_chunk(mut self, dim: impl Into<String>, size: usize) -> Self {
        self.chunk_shapes.push((dim.into(), size.max(1)));
        self
    }

    fn chunks_for(&self, dims: &[String], shape: &[usize]) -> Vec<usize> {
        dims.iter()
            .zip(shape)
            .map(|(dim, &n)| {
                self.chunk_shapes
                    .iter()
                    .find(|(d, _)| d == dim)
                    .map_or(n, |&(_, size)| size.min(n))
                    .max(1)
            })
            .collect()
    }

    /// Write one array with its dimension names and attributes
    pub async fn write_array<T: ZarrElement>(
        &self,
        name: &str,
        dims: &[String],
        data: &ArrayD<T>,
        chunk_shape: Option<Vec<usize>>,
        mut attributes: JsonAttributes,
    ) -> Result<()> {
        let shape = data.shape().to_vec();
        if dims.len() != shape.len() {
            return Err(ArCheckError::ShapeMismatch(format!(
                "array '{name}' has {} axes but {} dimension names",
                shape.len(),
                dims.len()
            )));
        }
        let chunks = chunk_shape.unwrap_or_else(|| shape.iter().map(|&n| n.max(1)).collect());
        let meta = ArrayMetadata {
            zarr_format: 2,
            shape: shape.clone(),
            chunks: chunks.clone(),
            dtype: T::DTYPE.to_string(),
            compressor: None,
            fill_value: Some(T::fill_json()),
            order: default_order(),
            filters: None,
            dimension_separator: Some(".".to_string()),
        };
        meta.check_supported(name)?;

        let dir = self.store.path.join(name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(".zarray"), serde_json::to_string_pretty(&meta)?)?;

        attributes.insert(DIMENSIONS_ATTRIBUTE.to_string(), JsonValue::from(dims.to_vec()));
        std::fs::write(
            dir.join(".zattrs"),
            serde_json::to_string_pretty(&JsonValue::Object(attributes))?,
        )?;

        let grid = chunk_grid(&shape, &chunks);
        debug!(
            array = name,
            ?shape,
            ?chunks,
            n_chunks = grid.len(),
            threads = rayon::current_num_threads(),
            "writing Zarr chunks"
        );

        let chunk_len: usize = chunks.iter().product();
        grid.into_par_iter().try_for_each(|idx| {
            let (starts, extents) = chunk_bounds(&idx, &shape, &chunks);
            let mut chunk = ArrayD::from_elem(IxDyn(&chunks), T::fill());
            chunk
                .slice_each_axis_mut(|ax| Slice::from(0..extents[ax.axis.index()]))
                .assign(&data.slice_each_axis(|ax| {
                    let i = ax.axis.index();
                    Slice::from(starts[i]..starts[i] + extents[i])
                }));

            let mut bytes = Vec::with_capacity(chunk_len * std::mem::size_of::<T>());
            for &value in chunk.iter() {
                value.extend_le(&mut bytes);
            }
            std::fs::write(dir.join(chunk_key(&idx, ".")), bytes).map_err(ArCheckError::from)
        })
    }

    /// Write every coordinate and data variable of `ds` as a Zarr group
    pub async fn write_dataset(&self, ds: &Dataset) -> Result<()> {
        std::fs::write(
            self.store.path.join(".zgroup"),
            serde_json::to_string_pretty(&serde_json::json!({ "zarr_format": 2 }))?,
        )?;

        let time_units = CfTimeUnits::parse(DEFAULT_TIME_UNITS)?;
        for (name, coord) in ds.coords() {
            let dims = [coord.dim.clone()];
            let mut attrs = JsonAttributes::new();
            match &coord.values {
                CoordValues::Numeric(values) => {
                    let data = ArrayD::from_shape_vec(IxDyn(&[values.len()]), values.clone())?;
                    self.write_array(name, &dims, &data, None, attrs).await?;
                }
                CoordValues::Time(values) => {
                    let encoded: Vec<f64> = values.iter().map(|&t| time_units.encode(t)).collect();
                    attrs.insert("units".to_string(), JsonValue::from(time_units.to_string()));
                    attrs.insert("calendar".to_string(), JsonValue::from("standard"));
                    let data = ArrayD::from_shape_vec(IxDyn(&[encoded.len()]), encoded)?;
                    self.write_array(name, &dims, &data, None, attrs).await?;
                }
                CoordValues::Labels(labels) => {
                    let index: Vec<i32> = (0..labels.len() as i32).collect();
                    attrs.insert(LABELS_ATTRIBUTE.to_string(), JsonValue::from(labels.clone()));
                    let data = ArrayD::from_shape_vec(IxDyn(&[index.len()]), index)?;
                    self.write_array(name, &dims, &data, None, attrs).await?;
                }
            }
        }

        for (name, variable) in ds.variables() {
            let mut attrs: JsonAttributes = variable
                .attrs
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::from(v.as_str())))
                .collect();
            let aux: Vec<&str> = ds
                .coords()
                .iter()
                .filter(|(coord_name, c)| **coord_name != c.dim && variable.dims.contains(&c.dim))
                .map(|(coord_name, _)| coord_name.as_str())
                .collect();
            if !aux.is_empty() {
                attrs.insert("coordinates".to_string(), JsonValue::from(aux.join(" ")));
            }
            let chunks = self.chunks_for(&variable.dims, variable.data.shape());
            self.write_array(name, &variable.dims, &variable.data, Some(chunks), attrs)
                .await?;
        }

        let mut root: JsonAttributes = ds
            .attrs()
            .iter()
            .filter(|(k, _)| k.as_str() != "history")
            .map(|(k, v)| (k.clone(), JsonValue::from(v.as_str())))
            .collect();
        root.insert(
            "history".to_string(),
            JsonValue::from(format!("Created by ARCheck on {}", Utc::now().to_rfc3339())),
        );
        std::fs::write(
            self.store.path.join(".zattrs"),
            serde_json::to_string_pretty(&JsonValue::Object(root))?,
        )?;

        info!(path = %self.store.path.display(), "wrote Zarr dataset");
        Ok(())
    }
}
