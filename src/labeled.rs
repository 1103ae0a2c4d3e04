//! Labeled multi-dimensional arrays
//!
//! [`DataArray`] is a single named field with dimension names, coordinates and
//! attributes. [`Dataset`] groups several data variables that share dimensions
//! and coordinates, the way gridded NetCDF and Zarr stores are organized.

use crate::errors::{ArCheckError, Result};
use crate::statistics::{StatOperation, StatisticalReduction};
use chrono::NaiveDateTime;
use ndarray::{ArrayD, Axis, Slice};
use std::collections::BTreeMap;
use std::ops::Range;

/// Name of the time dimension
pub const TIME_DIM: &str = "time";
/// Name of the spatial node dimension
pub const NODE_DIM: &str = "node";
/// Name of the variable (feature) dimension
pub const FEATURE_DIM: &str = "feature";
/// Name of the batch dimension prepended by the training harness
pub const SAMPLE_DIM: &str = "sample";

/// Free-form string attributes
pub type Attributes = BTreeMap<String, String>;

/// Coordinates keyed by coordinate name
pub type Coordinates = BTreeMap<String, Coordinate>;

/// Values of a one-dimensional coordinate
#[derive(Debug, Clone, PartialEq)]
pub enum CoordValues {
    Time(Vec<NaiveDateTime>),
    Labels(Vec<String>),
    Numeric(Vec<f64>),
}

impl CoordValues {
    pub fn len(&self) -> usize {
        match self {
            Self::Time(v) => v.len(),
            Self::Labels(v) => v.len(),
            Self::Numeric(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(&self, range: Range<usize>) -> Self {
        match self {
            Self::Time(v) => Self::Time(v[range].to_vec()),
            Self::Labels(v) => Self::Labels(v[range].to_vec()),
            Self::Numeric(v) => Self::Numeric(v[range].to_vec()),
        }
    }

    /// String rendering of every value, used for feature labels
    pub fn to_labels(&self) -> Vec<String> {
        match self {
            Self::Time(v) => v.iter().map(ToString::to_string).collect(),
            Self::Labels(v) => v.clone(),
            Self::Numeric(v) => v.iter().map(ToString::to_string).collect(),
        }
    }
}

/// A one-dimensional coordinate attached to a dimension
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub dim: String,
    pub values: CoordValues,
}

impl Coordinate {
    pub fn new(dim: impl Into<String>, values: CoordValues) -> Self {
        Self {
            dim: dim.into(),
            values,
        }
    }

    pub fn time(dim: impl Into<String>, values: Vec<NaiveDateTime>) -> Self {
        Self::new(dim, CoordValues::Time(values))
    }

    pub fn labels<S: Into<String>>(dim: impl Into<String>, values: impl IntoIterator<Item = S>) -> Self {
        Self::new(
            dim,
            CoordValues::Labels(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn numeric(dim: impl Into<String>, values: Vec<f64>) -> Self {
        Self::new(dim, CoordValues::Numeric(values))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn validate_dims(owner: &str, dims: &[String], ndim: usize) -> Result<()> {
    if dims.len() != ndim {
        return Err(ArCheckError::ShapeMismatch(format!(
            "'{owner}' has {ndim} axes but {} dimension names {:?}",
            dims.len(),
            dims
        )));
    }
    for (i, dim) in dims.iter().enumerate() {
        if dims[..i].contains(dim) {
            return Err(ArCheckError::ShapeMismatch(format!(
                "'{owner}' repeats dimension '{dim}'"
            )));
        }
    }
    Ok(())
}

fn into_dim_names<S: Into<String>>(dims: impl IntoIterator<Item = S>) -> Vec<String> {
    dims.into_iter().map(Into::into).collect()
}

fn check_range(dim: &str, range: &Range<usize>, size: usize) -> Result<()> {
    if range.start > range.end || range.end > size {
        return Err(ArCheckError::ShapeMismatch(format!(
            "Invalid selection {}..{} for dimension '{dim}' of size {size}",
            range.start, range.end
        )));
    }
    Ok(())
}

/// A named, labeled N-dimensional array
#[derive(Debug, Clone)]
pub struct DataArray {
    name: String,
    dims: Vec<String>,
    data: ArrayD<f32>,
    coords: Coordinates,
    attrs: Attributes,
    chunks: Option<Vec<usize>>,
}

impl DataArray {
    /// Create a new array; the number of dimension names must match the rank
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f32>,
    ) -> Result<Self> {
        let name = name.into();
        let dims = into_dim_names(dims);
        validate_dims(&name, &dims, data.ndim())?;
        Ok(Self {
            name,
            dims,
            data,
            coords: Coordinates::new(),
            attrs: Attributes::new(),
            chunks: None,
        })
    }

    /// Attach a coordinate, checking it against the size of its dimension
    pub fn with_coord(mut self, name: impl Into<String>, coord: Coordinate) -> Result<Self> {
        let name = name.into();
        let size = self.dim_size(&coord.dim)?;
        if coord.len() != size {
            return Err(ArCheckError::ShapeMismatch(format!(
                "Coordinate '{name}' has {} values but dimension '{}' has size {size}",
                coord.len(),
                coord.dim
            )));
        }
        self.coords.insert(name, coord);
        Ok(self)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Mark the array as chunked (lazily loaded from a chunked store)
    pub fn with_chunks(mut self, chunks: Vec<usize>) -> Self {
        self.chunks = Some(chunks);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn data(&self) -> &ArrayD<f32> {
        &self.data
    }

    pub fn into_data(self) -> ArrayD<f32> {
        self.data
    }

    pub fn coords(&self) -> &Coordinates {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn chunks(&self) -> Option<&[usize]> {
        self.chunks.as_deref()
    }

    /// Whether the data is backed by chunks rather than a single in-memory block
    pub fn is_lazy(&self) -> bool {
        self.chunks.is_some()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    pub fn axis(&self, dim: &str) -> Result<usize> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .ok_or_else(|| ArCheckError::DimensionNotFound {
                var: self.name.clone(),
                dim: dim.to_string(),
            })
    }

    pub fn dim_size(&self, dim: &str) -> Result<usize> {
        Ok(self.data.shape()[self.axis(dim)?])
    }

    /// Timestamps of the `time` coordinate
    pub fn times(&self) -> Result<&[NaiveDateTime]> {
        self.axis(TIME_DIM)?;
        match self.coords.get(TIME_DIM).map(|c| &c.values) {
            Some(CoordValues::Time(values)) => Ok(values),
            _ => Err(ArCheckError::InvalidTimesteps(format!(
                "'{}' has no datetime '{TIME_DIM}' coordinate",
                self.name
            ))),
        }
    }

    /// Labels along `dim`, falling back to positional indices without a coordinate
    pub fn labels(&self, dim: &str) -> Result<Vec<String>> {
        let size = self.dim_size(dim)?;
        Ok(match self.coords.get(dim) {
            Some(coord) => coord.values.to_labels(),
            None => (0..size).map(|i| i.to_string()).collect(),
        })
    }

    /// Reorder dimensions; `order` must name every dimension exactly once
    pub fn transpose(&self, order: &[&str]) -> Result<Self> {
        if order.len() != self.dims.len() {
            return Err(ArCheckError::DimensionOrderMismatch(format!(
                "Cannot transpose {:?} to {:?}",
                self.dims, order
            )));
        }
        let perm = order
            .iter()
            .map(|dim| self.axis(dim))
            .collect::<Result<Vec<_>>>()?;
        let data = self
            .data
            .view()
            .permuted_axes(perm)
            .as_standard_layout()
            .into_owned();
        Ok(Self {
            name: self.name.clone(),
            dims: order.iter().map(|d| d.to_string()).collect(),
            data,
            coords: self.coords.clone(),
            attrs: self.attrs.clone(),
            chunks: None,
        })
    }

    /// Reduce along `dim`, skipping non-finite values
    pub fn reduce(&self, dim: &str, operation: StatOperation) -> Result<Self> {
        let axis = self.axis(dim)?;
        let data = self.data.reduce_along_axis(axis, operation)?;
        let dims = self
            .dims
            .iter()
            .filter(|d| d.as_str() != dim)
            .cloned()
            .collect();
        let coords = self
            .coords
            .iter()
            .filter(|(_, c)| c.dim != dim)
            .map(|(k, c)| (k.clone(), c.clone()))
            .collect();
        Ok(Self {
            name: self.name.clone(),
            dims,
            data,
            coords,
            attrs: self.attrs.clone(),
            chunks: None,
        })
    }
}

/// A data variable stored inside a [`Dataset`]
#[derive(Debug, Clone)]
pub struct Variable {
    pub dims: Vec<String>,
    pub data: ArrayD<f32>,
    pub attrs: Attributes,
    /// Chunk shape of the store the data was read from
    pub chunks: Option<Vec<usize>>,
}

impl Variable {
    pub fn new(dims: Vec<String>, data: ArrayD<f32>) -> Self {
        Self {
            dims,
            data,
            attrs: Attributes::new(),
            chunks: None,
        }
    }

    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }
}

/// A collection of data variables sharing dimensions and coordinates
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    vars: Vec<(String, Variable)>,
    coords: Coordinates,
    attrs: Attributes,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a data variable; dimension sizes must agree with the dataset
    pub fn add_var<S: Into<String>>(
        &mut self,
        name: impl Into<String>,
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f32>,
    ) -> Result<()> {
        self.insert_var(name.into(), Variable::new(into_dim_names(dims), data))
    }

    /// Builder form of [`Dataset::add_var`]
    pub fn with_var<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        dims: impl IntoIterator<Item = S>,
        data: ArrayD<f32>,
    ) -> Result<Self> {
        self.add_var(name, dims, data)?;
        Ok(self)
    }

    pub fn insert_var(&mut self, name: String, var: Variable) -> Result<()> {
        validate_dims(&name, &var.dims, var.data.ndim())?;
        for (dim, &size) in var.dims.iter().zip(var.data.shape()) {
            if let Some(existing) = self.dim_size_ignoring(dim, &name) {
                if existing != size {
                    return Err(ArCheckError::ShapeMismatch(format!(
                        "Variable '{name}' has size {size} along '{dim}' but the dataset has {existing}"
                    )));
                }
            }
        }
        match self.vars.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = var,
            None => self.vars.push((name, var)),
        }
        Ok(())
    }

    /// Attach a coordinate; its length must match the dimension when it exists
    pub fn set_coord(&mut self, name: impl Into<String>, coord: Coordinate) -> Result<()> {
        let name = name.into();
        if let Some(size) = self.dim_size(&coord.dim) {
            if size != coord.len() {
                return Err(ArCheckError::ShapeMismatch(format!(
                    "Coordinate '{name}' has {} values but dimension '{}' has size {size}",
                    coord.len(),
                    coord.dim
                )));
            }
        }
        self.coords.insert(name, coord);
        Ok(())
    }

    pub fn with_coord(mut self, name: impl Into<String>, coord: Coordinate) -> Result<Self> {
        self.set_coord(name, coord)?;
        Ok(self)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn var(&self, name: &str) -> Option<&Variable> {
        self.vars.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn var_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.vars.iter_mut().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn var_names(&self) -> Vec<&str> {
        self.vars.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Data variables in insertion order
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn coords(&self) -> &Coordinates {
        &self.coords
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Ordered `(name, size)` pairs, data variables first, then coordinates
    pub fn dims(&self) -> Vec<(String, usize)> {
        let mut dims: Vec<(String, usize)> = Vec::new();
        for (_, var) in &self.vars {
            for (dim, &size) in var.dims.iter().zip(var.data.shape()) {
                if !dims.iter().any(|(d, _)| d == dim) {
                    dims.push((dim.clone(), size));
                }
            }
        }
        for coord in self.coords.values() {
            if !dims.iter().any(|(d, _)| *d == coord.dim) {
                dims.push((coord.dim.clone(), coord.len()));
            }
        }
        dims
    }

    pub fn dim_names(&self) -> Vec<String> {
        self.dims().into_iter().map(|(d, _)| d).collect()
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dim_size(dim).is_some()
    }

    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.dims()
            .into_iter()
            .find(|(d, _)| d == dim)
            .map(|(_, size)| size)
    }

    fn dim_size_ignoring(&self, dim: &str, skip_var: &str) -> Option<usize> {
        self.vars
            .iter()
            .filter(|(n, _)| n != skip_var)
            .find_map(|(_, v)| v.axis(dim).map(|ax| v.data.shape()[ax]))
            .or_else(|| {
                self.coords
                    .values()
                    .find(|c| c.dim == dim)
                    .map(Coordinate::len)
            })
    }

    /// Timestamps of the `time` coordinate
    pub fn times(&self) -> Result<&[NaiveDateTime]> {
        match self.coords.get(TIME_DIM).map(|c| &c.values) {
            Some(CoordValues::Time(values)) => Ok(values),
            _ => Err(ArCheckError::InvalidTimesteps(format!(
                "the dataset has no datetime '{TIME_DIM}' coordinate"
            ))),
        }
    }

    /// Extract one data variable together with the coordinates along its dimensions
    pub fn data_array(&self, name: &str) -> Result<DataArray> {
        let var = self.var(name).ok_or_else(|| ArCheckError::VariableNotFound {
            var: name.to_string(),
        })?;
        let mut da = DataArray::new(name, var.dims.clone(), var.data.clone())?;
        da.attrs = var.attrs.clone();
        da.chunks = var.chunks.clone();
        da.coords = self.coords_along(&var.dims);
        Ok(da)
    }

    fn coords_along(&self, dims: &[String]) -> Coordinates {
        self.coords
            .iter()
            .filter(|(_, c)| dims.contains(&c.dim))
            .map(|(k, c)| (k.clone(), c.clone()))
            .collect()
    }

    /// Positional selection of `range` along `dim` for every variable and coordinate
    pub fn isel(&self, dim: &str, range: Range<usize>) -> Result<Self> {
        let size = self.dim_size(dim).ok_or_else(|| ArCheckError::DimensionNotFound {
            var: "dataset".to_string(),
            dim: dim.to_string(),
        })?;
        check_range(dim, &range, size)?;

        let vars = self
            .vars
            .iter()
            .map(|(name, var)| {
                let data = match var.axis(dim) {
                    Some(ax) => var
                        .data
                        .slice_axis(Axis(ax), Slice::from(range.clone()))
                        .to_owned(),
                    None => var.data.clone(),
                };
                (
                    name.clone(),
                    Variable {
                        dims: var.dims.clone(),
                        data,
                        attrs: var.attrs.clone(),
                        chunks: None,
                    },
                )
            })
            .collect();
        let coords = self
            .coords
            .iter()
            .map(|(name, coord)| {
                let coord = if coord.dim == dim {
                    Coordinate::new(coord.dim.clone(), coord.values.slice(range.clone()))
                } else {
                    coord.clone()
                };
                (name.clone(), coord)
            })
            .collect();

        Ok(Self {
            vars,
            coords,
            attrs: self.attrs.clone(),
        })
    }

    /// Apply `f` to every value of every data variable
    pub fn mapv(&self, f: impl Fn(f32) -> f32) -> Self {
        let vars = self
            .vars
            .iter()
            .map(|(name, var)| {
                (
                    name.clone(),
                    Variable {
                        dims: var.dims.clone(),
                        data: var.data.mapv(&f),
                        attrs: var.attrs.clone(),
                        chunks: None,
                    },
                )
            })
            .collect();
        Self {
            vars,
            coords: self.coords.clone(),
            attrs: self.attrs.clone(),
        }
    }

    /// Stack all data variables along a new trailing dimension named `dim`,
    /// labelled with the variable names.
    pub fn to_array(&self, dim: &str) -> Result<DataArray> {
        let (_, first) = self
            .vars
            .first()
            .ok_or_else(|| ArCheckError::MissingInput("The dataset has no data variables".to_string()))?;
        for (name, var) in &self.vars {
            if var.dims != first.dims {
                return Err(ArCheckError::ShapeMismatch(format!(
                    "Variable '{name}' has dimensions {:?}, expected {:?}",
                    var.dims, first.dims
                )));
            }
        }

        let views: Vec<_> = self.vars.iter().map(|(_, v)| v.data.view()).collect();
        let data = ndarray::stack(Axis(first.dims.len()), &views)?;

        let mut dims = first.dims.clone();
        dims.push(dim.to_string());
        let mut da = DataArray::new("stacked", dims.clone(), data)?;
        da.coords = self.coords_along(&dims);
        da.coords.insert(
            dim.to_string(),
            Coordinate::labels(dim, self.vars.iter().map(|(n, _)| n.clone())),
        );
        Ok(da)
    }

    /// Reduce every variable holding `dim`; variables without it are kept unchanged
    pub fn reduce(&self, dim: &str, operation: StatOperation) -> Result<Self> {
        let mut out = Self {
            vars: Vec::with_capacity(self.vars.len()),
            coords: self
                .coords
                .iter()
                .filter(|(_, c)| c.dim != dim)
                .map(|(k, c)| (k.clone(), c.clone()))
                .collect(),
            attrs: self.attrs.clone(),
        };
        for (name, var) in &self.vars {
            let reduced = match var.axis(dim) {
                Some(axis) => Variable {
                    dims: var.dims.iter().filter(|d| *d != dim).cloned().collect(),
                    data: var.data.reduce_along_axis(axis, operation)?,
                    attrs: var.attrs.clone(),
                    chunks: None,
                },
                None => var.clone(),
            };
            out.vars.push((name.clone(), reduced));
        }
        Ok(out)
    }
}
