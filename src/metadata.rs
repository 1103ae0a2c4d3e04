//! Dataset inspection and variable description
//!
//! Prints the structure of a loaded [`Dataset`] (dimensions, coordinates,
//! variables, time period) and quick statistics of a single variable.

use crate::errors::{ArCheckError, Result};
use crate::labeled::{CoordValues, Dataset, TIME_DIM};

/// Structured metadata for a data variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableMetadata {
    pub name: String,
    pub dimensions: Vec<(String, usize)>,
    pub chunks: Option<Vec<usize>>,
    pub total_elements: usize,
    pub estimated_size_bytes: usize,
    pub nan_count: usize,
    pub min: f32,
    pub mean: f32,
    pub max: f32,
}

/// Human readable byte count
pub fn format_size(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn describe_coord_values(values: &CoordValues) -> String {
    match values {
        CoordValues::Time(t) if !t.is_empty() => format!("time [{} .. {}]", t[0], t[t.len() - 1]),
        CoordValues::Labels(l) => format!("labels {:?}", l),
        CoordValues::Numeric(v) if !v.is_empty() => {
            let min = v.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = v.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            format!("numeric [{:.3} .. {:.3}]", min, max)
        }
        _ => "(empty)".to_string(),
    }
}

/// Prints dimensions, coordinates and variables of a dataset.
pub fn print_dataset_summary(ds: &Dataset) {
    println!("\n Dimensions");
    println!("==============");
    let dims = ds.dims();
    if dims.is_empty() {
        println!("   (No dimensions found)");
    }
    for (name, len) in &dims {
        println!("    {} = {}", name, len);
    }

    println!("\n Coordinates");
    println!("===============");
    if ds.coords().is_empty() {
        println!("   (No coordinates found)");
    }
    for (name, coord) in ds.coords() {
        println!(
            "    {} ({}): {}",
            name,
            coord.dim,
            describe_coord_values(&coord.values)
        );
    }

    println!("\n Variables");
    println!("=============");
    if ds.is_empty() {
        println!("   (No variables found)");
    }
    let mut total_bytes = 0;
    for (name, var) in ds.variables() {
        let shape: Vec<String> = var.data.shape().iter().map(|s| s.to_string()).collect();
        println!(
            "    {} (float32): [{}] = ({})",
            name,
            var.dims.join(", "),
            shape.join(" × ")
        );
        let key_attrs: Vec<String> = ["units", "long_name"]
            .iter()
            .filter_map(|key| var.attrs.get(*key).map(|v| format!("{}: {}", key, v)))
            .collect();
        if !key_attrs.is_empty() {
            println!("      └─ {}", key_attrs.join(", "));
        }
        total_bytes += var.data.len() * std::mem::size_of::<f32>();
    }

    if let Ok(times) = ds.times() {
        if let (Some(start), Some(end)) = (times.first(), times.last()) {
            println!("\n📅 Time period: {} - {} ({} timesteps)", start, end, times.len());
        }
    }
    println!("💾 Estimated in-memory size: {}", format_size(total_bytes));

    if !ds.attrs().is_empty() {
        println!("\n===== Global Attributes =====");
        for (key, value) in ds.attrs() {
            println!("- {}: {}", key, value);
        }
    }
}

/// Get structured metadata and NaN-skipping statistics for a variable
pub fn get_variable_metadata(ds: &Dataset, var_name: &str) -> Result<VariableMetadata> {
    let var = ds.var(var_name).ok_or_else(|| ArCheckError::VariableNotFound {
        var: var_name.to_string(),
    })?;

    let total_elements = var.data.len();
    let finite: Vec<f32> = var.data.iter().copied().filter(|v| v.is_finite()).collect();
    let nan_count = var.data.iter().filter(|v| v.is_nan()).count();
    let (min, mean, max) = if finite.is_empty() {
        (f32::NAN, f32::NAN, f32::NAN)
    } else {
        let min = finite.iter().cloned().fold(f32::INFINITY, f32::min);
        let max = finite.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let mean = (finite.iter().map(|&v| f64::from(v)).sum::<f64>() / finite.len() as f64) as f32;
        (min, mean, max)
    };

    Ok(VariableMetadata {
        name: var_name.to_string(),
        dimensions: var
            .dims
            .iter()
            .cloned()
            .zip(var.data.shape().iter().copied())
            .collect(),
        chunks: var.chunks.clone(),
        total_elements,
        estimated_size_bytes: total_elements * std::mem::size_of::<f32>(),
        nan_count,
        min,
        mean,
        max,
    })
}

/// Describes a specific variable showing its shape, attributes and statistics.
pub fn describe_variable(ds: &Dataset, var_name: &str) -> Result<()> {
    let meta = get_variable_metadata(ds, var_name)?;
    let var = ds.var(var_name).ok_or_else(|| ArCheckError::VariableNotFound {
        var: var_name.to_string(),
    })?;

    println!("\n Variable Description: {}", var_name);
    println!("={}", "=".repeat(var_name.len() + 25));

    if meta.dimensions.is_empty() {
        println!(" Dimensions: (scalar)");
    } else {
        let names: Vec<&str> = meta.dimensions.iter().map(|(n, _)| n.as_str()).collect();
        let sizes: Vec<String> = meta.dimensions.iter().map(|(_, s)| s.to_string()).collect();
        println!(" Dimensions: [{}]", names.join(", "));
        println!(" Shape: ({})", sizes.join(" × "));
    }
    if let Some(chunks) = &meta.chunks {
        println!(" Chunks: {:?}", chunks);
    }

    if var.attrs.is_empty() {
        println!("\n  Attributes: (none)");
    } else {
        println!("\n  Attributes:");
        for (key, value) in &var.attrs {
            println!("   • {}: \"{}\"", key, value);
        }
    }

    println!("\n Summary");
    println!("================================");
    println!("   Min: {}", meta.min);
    println!("   Max: {}", meta.max);
    println!("   Mean: {:.4}", meta.mean);
    println!("   NaN values: {} of {}", meta.nan_count, meta.total_elements);
    if var.has_dim(TIME_DIM) {
        if let Ok(times) = ds.times() {
            println!("   Timesteps: {}", times.len());
        }
    }
    println!("   Total size: {}", format_size(meta.estimated_size_bytes));
    Ok(())
}
