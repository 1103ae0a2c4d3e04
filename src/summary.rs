//! Spatial summaries of skill fields
//!
//! Collapses the `node` dimension either globally (area weighted) or into
//! latitude/longitude bands.

use crate::errors::{ArCheckError, Result};
use crate::labeled::{CoordValues, Coordinate, Dataset, Variable, NODE_DIM};
use crate::statistics::weighted_nan_mean;
use ndarray::{Array2, ArrayD, IxDyn};

/// Dimension created by [`latitudinal_summary`]
pub const LAT_BIN_DIM: &str = "lat_bin";
/// Dimension created by [`longitudinal_summary`]
pub const LON_BIN_DIM: &str = "lon_bin";

fn node_coord<'a>(ds: &'a Dataset, name: &str) -> Result<&'a [f64]> {
    match ds.coord(name) {
        Some(Coordinate {
            dim,
            values: CoordValues::Numeric(values),
        }) if dim == NODE_DIM => Ok(values),
        _ => Err(ArCheckError::VariableNotFound {
            var: format!("numeric '{name}' coordinate along '{NODE_DIM}'"),
        }),
    }
}

/// Groups of node indices and the weight of every node
struct NodeGroups {
    members: Vec<Vec<usize>>,
    weights: Vec<f64>,
}

fn reduce_variable(var: &Variable, groups: &NodeGroups, group_dim: Option<&str>) -> Result<Variable> {
    let Some(node_axis) = var.axis(NODE_DIM) else {
        return Ok(var.clone());
    };
    let shape = var.data.shape();
    let n_nodes = shape[node_axis];
    let n_rows = var.data.len() / n_nodes.max(1);

    let mut perm: Vec<usize> = (0..var.dims.len()).filter(|&ax| ax != node_axis).collect();
    perm.push(node_axis);
    let rows = var
        .data
        .view()
        .permuted_axes(perm.clone())
        .as_standard_layout()
        .into_owned()
        .into_shape((n_rows, n_nodes))?;

    let n_groups = groups.members.len();
    let reduced = Array2::from_shape_fn((n_rows, n_groups), |(r, g)| {
        weighted_nan_mean(
            groups.members[g]
                .iter()
                .map(|&node| (rows[[r, node]], groups.weights[node])),
        )
    });

    let mut dims: Vec<String> = perm[..perm.len() - 1]
        .iter()
        .map(|&ax| var.dims[ax].clone())
        .collect();
    let mut out_shape: Vec<usize> = perm[..perm.len() - 1].iter().map(|&ax| shape[ax]).collect();
    if let Some(dim) = group_dim {
        dims.push(dim.to_string());
        out_shape.push(n_groups);
    }
    let data: ArrayD<f32> = reduced.into_shape(IxDyn(&out_shape))?;
    Ok(Variable::new(dims, data).with_attrs(var.attrs.clone()))
}

fn summarize(ds: &Dataset, groups: &NodeGroups, group_coord: Option<(&str, Vec<f64>)>) -> Result<Dataset> {
    let group_dim = group_coord.as_ref().map(|(dim, _)| *dim);
    let mut out = Dataset::new();
    for (name, var) in ds.variables() {
        out.insert_var(name.to_string(), reduce_variable(var, groups, group_dim)?)?;
    }
    for (name, coord) in ds.coords() {
        if coord.dim != NODE_DIM {
            out.set_coord(name.clone(), coord.clone())?;
        }
    }
    if let Some((dim, centres)) = group_coord {
        out.set_coord(dim, Coordinate::numeric(dim, centres))?;
    }
    for (key, value) in ds.attrs() {
        out.set_attr(key.clone(), value.clone());
    }
    Ok(out)
}

fn band_groups(positions: &[f64], start: f64, extent: f64, resolution: f64) -> Result<(NodeGroups, Vec<f64>)> {
    if !(resolution > 0.0 && resolution <= extent) {
        return Err(ArCheckError::Verification(format!(
            "band resolution must be in (0, {extent}], got {resolution}"
        )));
    }
    let n_bands = (extent / resolution).ceil() as usize;
    let mut members = vec![Vec::new(); n_bands];
    for (node, &pos) in positions.iter().enumerate() {
        if !pos.is_finite() {
            continue;
        }
        let band = (((pos - start) / resolution).floor().max(0.0) as usize).min(n_bands - 1);
        members[band].push(node);
    }
    let centres = (0..n_bands)
        .map(|b| start + (b as f64 + 0.5) * resolution)
        .collect();
    let weights = vec![1.0; positions.len()];
    Ok((NodeGroups { members, weights }, centres))
}

/// Mean over all nodes, weighted by the `area_coord` coordinate when given
pub fn global_summary(ds: &Dataset, area_coord: Option<&str>) -> Result<Dataset> {
    let n_nodes = ds.dim_size(NODE_DIM).ok_or_else(|| ArCheckError::MissingDimensions {
        name: "skill Dataset".to_string(),
        missing: vec![NODE_DIM.to_string()],
    })?;
    let weights = match area_coord {
        Some(name) => node_coord(ds, name)?.to_vec(),
        None => vec![1.0; n_nodes],
    };
    let groups = NodeGroups {
        members: vec![(0..n_nodes).collect()],
        weights,
    };
    summarize(ds, &groups, None)
}

/// Mean over nodes grouped in latitude bands of `lat_res` degrees
pub fn latitudinal_summary(ds: &Dataset, lat_coord: &str, lat_res: f64) -> Result<Dataset> {
    let lat = node_coord(ds, lat_coord)?;
    let (groups, centres) = band_groups(lat, -90.0, 180.0, lat_res)?;
    summarize(ds, &groups, Some((LAT_BIN_DIM, centres)))
}

/// Mean over nodes grouped in longitude bands of `lon_res` degrees
///
/// Longitudes are wrapped into [-180, 180) first.
pub fn longitudinal_summary(ds: &Dataset, lon_coord: &str, lon_res: f64) -> Result<Dataset> {
    let lon: Vec<f64> = node_coord(ds, lon_coord)?
        .iter()
        .map(|l| (l + 180.0).rem_euclid(360.0) - 180.0)
        .collect();
    let (groups, centres) = band_groups(&lon, -180.0, 360.0, lon_res)?;
    summarize(ds, &groups, Some((LON_BIN_DIM, centres)))
}
