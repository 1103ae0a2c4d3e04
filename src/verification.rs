//! Deterministic verification of continuous forecasts
//!
//! [`deterministic`] compares a forecast dataset against observations and
//! returns, for each shared variable, the skill scores computed over the
//! aggregating dimensions. The result keeps every other dimension and adds a
//! leading `skill` dimension labelled with the score names.

use crate::errors::{ArCheckError, Result};
use crate::labeled::{Coordinate, Dataset, Variable};
use ndarray::{Array2, ArrayD, IxDyn};
use rayon::prelude::*;
use tracing::{debug, info};

/// Name of the dimension holding the skill scores
pub const SKILL_DIM: &str = "skill";

/// Continuous verification scores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skill {
    Bias,
    Mae,
    Mse,
    Rmse,
    RelBias,
    RelMae,
    RelSd,
    DiffSd,
    PearsonR,
    PearsonR2,
    Nse,
    Kge,
}

impl Skill {
    pub const ALL: [Skill; 12] = [
        Skill::Bias,
        Skill::Mae,
        Skill::Mse,
        Skill::Rmse,
        Skill::RelBias,
        Skill::RelMae,
        Skill::RelSd,
        Skill::DiffSd,
        Skill::PearsonR,
        Skill::PearsonR2,
        Skill::Nse,
        Skill::Kge,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bias => "BIAS",
            Self::Mae => "MAE",
            Self::Mse => "MSE",
            Self::Rmse => "RMSE",
            Self::RelBias => "rBIAS",
            Self::RelMae => "rMAE",
            Self::RelSd => "rSD",
            Self::DiffSd => "diffSD",
            Self::PearsonR => "pearson_R",
            Self::PearsonR2 => "pearson_R2",
            Self::Nse => "NSE",
            Self::Kge => "KGE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }

    /// Position of the score along the `skill` dimension
    pub fn index(self) -> usize {
        Self::ALL
            .iter()
            .position(|s| *s == self)
            .unwrap_or_default()
    }
}

/// Options of the deterministic verification
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationOptions {
    /// Dimensions the scores are computed over
    pub aggregating_dims: Vec<String>,
    /// Ignore pairs where forecast or observation is not finite
    pub skip_na: bool,
    /// Denominators smaller than this in magnitude yield NaN
    pub tolerance: f64,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            aggregating_dims: vec!["time".to_string()],
            skip_na: true,
            tolerance: 1e-7,
        }
    }
}

impl VerificationOptions {
    pub fn over(dims: &[&str]) -> Self {
        Self {
            aggregating_dims: dims.iter().map(|d| d.to_string()).collect(),
            ..Self::default()
        }
    }
}

fn safe_div(num: f64, den: f64, tolerance: f64) -> f64 {
    if den.abs() < tolerance {
        f64::NAN
    } else {
        num / den
    }
}

/// All continuous scores for one set of forecast/observation pairs,
/// ordered as [`Skill::ALL`].
pub fn continuous_skills(pred: &[f32], obs: &[f32], skip_na: bool, tolerance: f64) -> [f32; 12] {
    let nan = [f32::NAN; 12];
    let pairs: Vec<(f64, f64)> = pred
        .iter()
        .zip(obs)
        .map(|(&p, &o)| (f64::from(p), f64::from(o)))
        .collect();
    let finite = |(p, o): &(f64, f64)| p.is_finite() && o.is_finite();
    if !skip_na && !pairs.iter().all(finite) {
        return nan;
    }
    let pairs: Vec<(f64, f64)> = pairs.into_iter().filter(finite).collect();
    if pairs.is_empty() {
        return nan;
    }

    let n = pairs.len() as f64;
    let mean = |f: &dyn Fn(&(f64, f64)) -> f64| pairs.iter().map(f).sum::<f64>() / n;

    let mean_pred = mean(&|(p, _)| *p);
    let mean_obs = mean(&|(_, o)| *o);
    let bias = mean(&|(p, o)| p - o);
    let mae = mean(&|(p, o)| (p - o).abs());
    let mse = mean(&|(p, o)| (p - o).powi(2));
    let mean_abs_obs = mean(&|(_, o)| o.abs());
    let sd_pred = mean(&|(p, _)| (p - mean_pred).powi(2)).sqrt();
    let sd_obs = mean(&|(_, o)| (o - mean_obs).powi(2)).sqrt();
    let cov = mean(&|(p, o)| (p - mean_pred) * (o - mean_obs));

    let r = safe_div(cov, sd_pred * sd_obs, tolerance);
    let rsd = safe_div(sd_pred, sd_obs, tolerance);
    let beta = safe_div(mean_pred, mean_obs, tolerance);
    let nse = 1.0 - safe_div(mse, sd_obs.powi(2), tolerance);
    let kge = 1.0 - ((r - 1.0).powi(2) + (rsd - 1.0).powi(2) + (beta - 1.0).powi(2)).sqrt();

    let scores = [
        bias,
        mae,
        mse,
        mse.sqrt(),
        safe_div(bias, mean_obs, tolerance),
        safe_div(mae, mean_abs_obs, tolerance),
        rsd,
        sd_pred - sd_obs,
        r,
        r * r,
        nse,
        kge,
    ];
    scores.map(|s| s as f32)
}

fn verify_variable(
    name: &str,
    pred: &Variable,
    obs: &Variable,
    options: &VerificationOptions,
) -> Result<Variable> {
    if pred.dims != obs.dims || pred.data.shape() != obs.data.shape() {
        return Err(ArCheckError::ShapeMismatch(format!(
            "Forecast '{name}' {:?}{:?} does not match observation {:?}{:?}",
            pred.dims,
            pred.data.shape(),
            obs.dims,
            obs.data.shape()
        )));
    }

    let mut aggregated = Vec::with_capacity(options.aggregating_dims.len());
    for (i, dim) in options.aggregating_dims.iter().enumerate() {
        if options.aggregating_dims[..i].contains(dim) {
            return Err(ArCheckError::Verification(format!(
                "aggregating dimension '{dim}' is listed more than once"
            )));
        }
        let axis = obs.axis(dim).ok_or_else(|| ArCheckError::DimensionNotFound {
            var: name.to_string(),
            dim: dim.clone(),
        })?;
        aggregated.push(axis);
    }
    let kept: Vec<usize> = (0..obs.dims.len()).filter(|ax| !aggregated.contains(ax)).collect();

    let shape = obs.data.shape();
    let n_out: usize = kept.iter().map(|&ax| shape[ax]).product();
    let n_agg: usize = aggregated.iter().map(|&ax| shape[ax]).product();
    let perm: Vec<usize> = kept.iter().chain(&aggregated).copied().collect();

    let as_rows = |data: &ArrayD<f32>| -> Result<Array2<f32>> {
        Ok(data
            .view()
            .permuted_axes(perm.clone())
            .as_standard_layout()
            .into_owned()
            .into_shape((n_out, n_agg))?)
    };
    let pred_rows = as_rows(&pred.data)?;
    let obs_rows = as_rows(&obs.data)?;

    debug!(variable = name, positions = n_out, samples = n_agg, "computing skills");
    let per_position: Vec<[f32; 12]> = (0..n_out)
        .into_par_iter()
        .map(|i| {
            let p = pred_rows.row(i).to_vec();
            let o = obs_rows.row(i).to_vec();
            continuous_skills(&p, &o, options.skip_na, options.tolerance)
        })
        .collect();

    let n_skills = Skill::ALL.len();
    let mut out_shape = vec![n_skills];
    out_shape.extend(kept.iter().map(|&ax| shape[ax]));
    let data = Array2::from_shape_fn((n_skills, n_out), |(s, i)| per_position[i][s])
        .into_shape(IxDyn(&out_shape))?;

    let mut dims = vec![SKILL_DIM.to_string()];
    dims.extend(kept.iter().map(|&ax| obs.dims[ax].clone()));
    Ok(Variable::new(dims, data).with_attrs(obs.attrs.clone()))
}

/// Forecast and observation must carry the same labels wherever both define a coordinate
fn check_aligned(pred: &Dataset, obs: &Dataset) -> Result<()> {
    for (name, obs_coord) in obs.coords() {
        match pred.coord(name) {
            Some(pred_coord) if pred_coord != obs_coord => {
                return Err(ArCheckError::Verification(format!(
                    "forecast and observation '{name}' coordinates differ"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Compute deterministic skill scores of `pred` against `obs`.
///
/// Only variables present in both datasets are verified. Values are paired by
/// position, so coordinates present in both datasets must be identical.
pub fn deterministic(pred: &Dataset, obs: &Dataset, options: &VerificationOptions) -> Result<Dataset> {
    check_aligned(pred, obs)?;
    let mut skills = Dataset::new();
    for (name, obs_var) in obs.variables() {
        let Some(pred_var) = pred.var(name) else {
            debug!(variable = name, "no forecast for variable, skipping");
            continue;
        };
        let var = verify_variable(name, pred_var, obs_var, options)?;
        skills.insert_var(name.to_string(), var)?;
    }
    if skills.is_empty() {
        return Err(ArCheckError::Verification(
            "forecast and observation datasets share no variable".to_string(),
        ));
    }

    skills.set_coord(
        SKILL_DIM,
        Coordinate::labels(SKILL_DIM, Skill::ALL.iter().map(|s| s.as_str())),
    )?;
    let kept_dims = skills.dim_names();
    for (coord_name, coord) in obs.coords() {
        if kept_dims.contains(&coord.dim) {
            skills.set_coord(coord_name.clone(), coord.clone())?;
        }
    }
    for (key, value) in obs.attrs() {
        skills.set_attr(key.clone(), value.clone());
    }
    skills.set_attr("verification", "deterministic continuous");
    skills.set_attr("aggregating_dims", options.aggregating_dims.join(","));

    info!(variables = skills.var_names().len(), "computed deterministic skills");
    Ok(skills)
}
