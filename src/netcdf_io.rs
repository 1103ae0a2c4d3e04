//! NetCDF dataset I/O
//!
//! Reads a NetCDF file into a [`Dataset`]: coordinate variables become
//! coordinates (CF time axes are decoded), `_FillValue` is masked to NaN and
//! every other variable is loaded as `f32`. [`NetCDFWriter`] writes a dataset
//! back with its coordinates and attributes.

use crate::cf_time::{CfTimeUnits, DEFAULT_TIME_UNITS};
use crate::errors::Result;
use crate::labeled::{Attributes, CoordValues, Coordinate, Dataset, Variable};
use crate::mesh::{AREA_COORD, LAT_COORD, LON_COORD};
use chrono::Utc;
use ndarray::{Array1, ArrayD};
use netcdf::{create, AttributeValue};
use std::collections::HashSet;
use std::{fs, path::Path};
use tracing::{debug, warn};

/// Attribute listing the labels of a label coordinate
pub const LABELS_ATTRIBUTE: &str = "labels";

/// One-dimensional variables always treated as coordinates
pub const AUXILIARY_COORDS: &[&str] = &[LAT_COORD, LON_COORD, AREA_COORD, "latitude", "longitude"];

fn string_attribute(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn strings_attribute(var: &netcdf::Variable, name: &str) -> Option<Vec<String>> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Strs(values) => Some(values),
        AttributeValue::Str(s) => Some(s.split_whitespace().map(str::to_string).collect()),
        _ => None,
    }
}

fn numeric_attribute(var: &netcdf::Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Shorts(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Ints(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Floats(v) => v.first().map(|&x| f64::from(x)),
        AttributeValue::Doubles(v) => v.first().copied(),
        _ => None,
    }
}

/// Mask `_FillValue`/`missing_value` on the stored values, then unpack with
/// `scale_factor` and `add_offset`
fn decode_values(var: &netcdf::Variable, raw: Vec<f64>) -> Vec<f32> {
    let missing: Vec<f64> = ["_FillValue", "missing_value"]
        .iter()
        .filter_map(|name| numeric_attribute(var, name))
        .collect();
    let scale = numeric_attribute(var, "scale_factor").unwrap_or(1.0);
    let offset = numeric_attribute(var, "add_offset").unwrap_or(0.0);
    raw.into_iter()
        .map(|v| {
            if missing.contains(&v) {
                f32::NAN
            } else {
                (v * scale + offset) as f32
            }
        })
        .collect()
}

fn read_coordinate(var: &netcdf::Variable, dim: &str) -> Result<Coordinate> {
    let len = var.dimensions()[0].len();
    if let Some(labels) = strings_attribute(var, LABELS_ATTRIBUTE).filter(|l| l.len() == len) {
        return Ok(Coordinate::labels(dim, labels));
    }
    let values: Vec<f64> = var.get_values::<f64, _>(..)?;
    match string_attribute(var, "units") {
        Some(units) if CfTimeUnits::is_time_units(&units) => {
            let units = CfTimeUnits::parse(&units)?;
            Ok(Coordinate::time(dim, units.decode_all(&values)?))
        }
        _ => Ok(Coordinate::numeric(dim, values)),
    }
}

/// Read a whole NetCDF file into a [`Dataset`]
pub fn read_dataset(path: &Path) -> Result<Dataset> {
    let file = netcdf::open(path)?;
    let mut ds = Dataset::new();

    let mut coord_names: HashSet<String> = AUXILIARY_COORDS.iter().map(|s| s.to_string()).collect();
    for var in file.variables() {
        if let Some(names) = strings_attribute(&var, "coordinates") {
            coord_names.extend(names);
        }
    }

    for var in file.variables() {
        let name = var.name().to_string();
        let dims: Vec<String> = var
            .dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect();

        if dims.len() == 1 && (dims[0] == name || coord_names.contains(&name)) {
            match read_coordinate(&var, &dims[0]) {
                Ok(coord) => ds.set_coord(name, coord)?,
                Err(e) => warn!(variable = %name, error = %e, "skipping unreadable coordinate"),
            }
            continue;
        }

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let values = decode_values(&var, var.get_values::<f64, _>(..)?);

        let mut attrs = Attributes::new();
        for attr in var.attributes() {
            if let Ok(AttributeValue::Str(value)) = attr.value() {
                attrs.insert(attr.name().to_string(), value);
            }
        }
        debug!(variable = %name, ?dims, ?shape, "loaded variable");
        ds.insert_var(
            name,
            Variable::new(dims, ArrayD::from_shape_vec(shape, values)?).with_attrs(attrs),
        )?;
    }

    for attr in file.attributes() {
        if let Ok(AttributeValue::Str(value)) = attr.value() {
            ds.set_attr(attr.name(), value);
        }
    }
    Ok(ds)
}

/// NetCDF writer for datasets
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    /// Create a new NetCDF writer
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    /// Write every coordinate and data variable of `ds`, replacing an existing file
    pub fn write_dataset(&self, ds: &Dataset) -> Result<()> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        let mut file = create(self.output_path)?;

        for (dim, len) in ds.dims() {
            file.add_dimension(&dim, len)?;
        }

        let time_units = CfTimeUnits::parse(DEFAULT_TIME_UNITS)?;
        for (name, coord) in ds.coords() {
            match &coord.values {
                CoordValues::Numeric(values) => {
                    let mut var = file.add_variable::<f64>(name, &[coord.dim.as_str()])?;
                    var.put(Array1::from(values.clone()).view(), ..)?;
                }
                CoordValues::Time(values) => {
                    let encoded: Vec<f64> = values.iter().map(|&t| time_units.encode(t)).collect();
                    let mut var = file.add_variable::<f64>(name, &[coord.dim.as_str()])?;
                    var.put_attribute("units", time_units.to_string())?;
                    var.put_attribute("calendar", "standard")?;
                    var.put(Array1::from(encoded).view(), ..)?;
                }
                CoordValues::Labels(labels) => {
                    let index: Vec<i32> = (0..labels.len() as i32).collect();
                    let mut var = file.add_variable::<i32>(name, &[coord.dim.as_str()])?;
                    var.put_attribute(LABELS_ATTRIBUTE, labels.clone())?;
                    var.put(Array1::from(index).view(), ..)?;
                }
            }
        }

        for (name, variable) in ds.variables() {
            let dim_refs: Vec<&str> = variable.dims.iter().map(|s| s.as_str()).collect();
            let aux: Vec<&str> = ds
                .coords()
                .iter()
                .filter(|(coord_name, c)| **coord_name != c.dim && variable.dims.contains(&c.dim))
                .map(|(coord_name, _)| coord_name.as_str())
                .collect();

            let mut var = file.add_variable::<f32>(name, &dim_refs)?;
            for (key, value) in &variable.attrs {
                var.put_attribute(key, value.as_str())?;
            }
            if !aux.is_empty() {
                var.put_attribute("coordinates", aux.join(" "))?;
            }
            var.put(variable.data.view(), ..)?;
        }

        for (key, value) in ds.attrs() {
            if key != "history" {
                file.add_attribute(key, value.as_str())?;
            }
        }
        file.add_attribute(
            "history",
            format!("Created by ARCheck on {}", Utc::now().to_rfc3339()),
        )?;

        debug!(path = %self.output_path.display(), "wrote NetCDF dataset");
        Ok(())
    }
}
