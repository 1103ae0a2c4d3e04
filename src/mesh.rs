//! Spherical node coordinates
//!
//! Attaches `lat`, `lon` and `area` coordinates to the `node` dimension so
//! skill fields can be summarized spatially. HEALPix meshes are generated
//! directly; any other mesh can be attached from precomputed coordinates.

use crate::errors::{ArCheckError, Result};
use crate::labeled::{Coordinate, Dataset, NODE_DIM};
use std::f64::consts::{FRAC_PI_2, PI};

pub const LAT_COORD: &str = "lat";
pub const LON_COORD: &str = "lon";
pub const AREA_COORD: &str = "area";

/// Node centres and areas of a spherical mesh
#[derive(Debug, Clone, PartialEq)]
pub struct SphereNodes {
    /// Longitudes in degrees, [0, 360)
    pub lon: Vec<f64>,
    /// Latitudes in degrees, [-90, 90]
    pub lat: Vec<f64>,
    /// Node areas in steradians
    pub area: Vec<f64>,
}

impl SphereNodes {
    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }
}

fn isqrt(n: u64) -> u64 {
    let mut root = (n as f64).sqrt() as u64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}

/// Pixel centres of a HEALPix grid in RING ordering.
///
/// The grid has `12 * nside^2` equal-area pixels.
pub fn healpix_ring_nodes(nside: u32) -> Result<SphereNodes> {
    if nside == 0 {
        return Err(ArCheckError::ShapeMismatch("HEALPix nside must be at least 1".to_string()));
    }
    let nside = u64::from(nside);
    let npix = 12 * nside * nside;
    let ncap = 2 * nside * (nside - 1);
    let fact2 = 4.0 / npix as f64;
    let fact1 = (2 * nside) as f64 * fact2;

    let mut lon = Vec::with_capacity(npix as usize);
    let mut lat = Vec::with_capacity(npix as usize);
    for ipix in 0..npix {
        let (z, phi) = if ipix < ncap {
            let iring = (1 + isqrt(1 + 2 * ipix)) >> 1;
            let iphi = ipix + 1 - 2 * iring * (iring - 1);
            let z = 1.0 - (iring * iring) as f64 * fact2;
            (z, (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64)
        } else if ipix < npix - ncap {
            let ip = ipix - ncap;
            let tmp = ip / (4 * nside);
            let iring = tmp + nside;
            let iphi = ip - tmp * 4 * nside + 1;
            let fodd = if (iring + nside) & 1 == 1 { 1.0 } else { 0.5 };
            let z = (2 * nside) as f64 - iring as f64;
            (z * fact1, (iphi as f64 - fodd) * PI * 0.75 * fact1)
        } else {
            let ip = npix - ipix;
            let iring = (1 + isqrt(2 * ip - 1)) >> 1;
            let iphi = 4 * iring + 1 - (ip - 2 * iring * (iring - 1));
            let z = -1.0 + (iring * iring) as f64 * fact2;
            (z, (iphi as f64 - 0.5) * FRAC_PI_2 / iring as f64)
        };
        lat.push(90.0 - z.clamp(-1.0, 1.0).acos().to_degrees());
        lon.push(phi.to_degrees());
    }

    let area = vec![4.0 * PI / npix as f64; npix as usize];
    Ok(SphereNodes { lon, lat, area })
}

/// Attach node coordinates to the `node` dimension of a dataset
pub fn attach_node_coordinates(ds: &mut Dataset, nodes: &SphereNodes) -> Result<()> {
    let n_nodes = ds.dim_size(NODE_DIM).ok_or_else(|| ArCheckError::MissingDimensions {
        name: "dataset".to_string(),
        missing: vec![NODE_DIM.to_string()],
    })?;
    if n_nodes != nodes.len() {
        return Err(ArCheckError::ShapeMismatch(format!(
            "The dataset has {n_nodes} nodes but the mesh has {}",
            nodes.len()
        )));
    }
    ds.set_coord(LAT_COORD, Coordinate::numeric(NODE_DIM, nodes.lat.clone()))?;
    ds.set_coord(LON_COORD, Coordinate::numeric(NODE_DIM, nodes.lon.clone()))?;
    ds.set_coord(AREA_COORD, Coordinate::numeric(NODE_DIM, nodes.area.clone()))?;
    Ok(())
}

/// Attach the coordinates of a HEALPix RING grid with the given `nside`
pub fn attach_healpix_nodes(ds: &mut Dataset, nside: u32) -> Result<()> {
    let nodes = healpix_ring_nodes(nside)?;
    attach_node_coordinates(ds, &nodes)
}
