//! Forecast verification workflow
//!
//! Runs the deterministic verification and, when the skill fields still have
//! a `node` dimension with spherical coordinates, the global, latitudinal and
//! longitudinal summaries. The report prints the tables the command line shows.

use crate::errors::Result;
use crate::labeled::{Coordinate, Dataset, NODE_DIM, TIME_DIM};
use crate::mesh::{attach_healpix_nodes, AREA_COORD, LAT_COORD, LON_COORD};
use crate::summary::{
    global_summary, latitudinal_summary, longitudinal_summary, LAT_BIN_DIM, LON_BIN_DIM,
};
use crate::verification::{deterministic, Skill, VerificationOptions, SKILL_DIM};
use ndarray::Axis;
use tracing::info;

/// Options of [`run_verification`]
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowOptions {
    pub verification: VerificationOptions,
    /// Attach HEALPix node coordinates before summarizing
    pub healpix_nside: Option<u32>,
    pub lat_res: f64,
    pub lon_res: f64,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self {
            verification: VerificationOptions::default(),
            healpix_nside: None,
            lat_res: 10.0,
            lon_res: 30.0,
        }
    }
}

/// Skill fields and their spatial summaries
#[derive(Debug, Clone)]
pub struct VerificationReport {
    pub skills: Dataset,
    pub global: Option<Dataset>,
    pub latitudinal: Option<Dataset>,
    pub longitudinal: Option<Dataset>,
}

/// Verify `pred` against `obs` and summarize the skill fields spatially
pub fn run_verification(pred: &Dataset, obs: &Dataset, options: &WorkflowOptions) -> Result<VerificationReport> {
    let mut skills = deterministic(pred, obs, &options.verification)?;
    let mut report = VerificationReport {
        skills: Dataset::new(),
        global: None,
        latitudinal: None,
        longitudinal: None,
    };

    if skills.has_dim(NODE_DIM) {
        if let Some(nside) = options.healpix_nside {
            attach_healpix_nodes(&mut skills, nside)?;
        }
        let area = skills.coord(AREA_COORD).map(|_| AREA_COORD);
        report.global = Some(global_summary(&skills, area)?);
        if skills.coord(LAT_COORD).is_some() {
            report.latitudinal = Some(latitudinal_summary(&skills, LAT_COORD, options.lat_res)?);
        }
        if skills.coord(LON_COORD).is_some() {
            report.longitudinal = Some(longitudinal_summary(&skills, LON_COORD, options.lon_res)?);
        }
        info!(
            latitudinal = report.latitudinal.is_some(),
            longitudinal = report.longitudinal.is_some(),
            "computed spatial skill summaries"
        );
    }
    report.skills = skills;
    Ok(report)
}

impl VerificationReport {
    /// Overall value of `skill` for `var`.
    ///
    /// Taken from the global summary, or from the skill field itself when
    /// every other dimension was aggregated.
    pub fn global_skill(&self, var: &str, skill: Skill) -> Option<f32> {
        let ds = self.global.as_ref().unwrap_or(&self.skills);
        let v = ds.var(var)?;
        if v.dims.len() != 1 || v.dims[0] != SKILL_DIM {
            return None;
        }
        v.data.iter().nth(skill.index()).copied()
    }

    /// Print the overall skills as a table, one column per variable
    pub fn print_global_table(&self) {
        let names = self.skills.var_names();
        println!("\n📈 Overall skill scores");
        println!("========================");
        print!("{:<12}", "Skill");
        for name in &names {
            print!("{:>14}", name);
        }
        println!();
        for skill in Skill::ALL {
            print!("{:<12}", skill.as_str());
            for name in &names {
                match self.global_skill(name, skill) {
                    Some(value) => print!("{:>14.4}", value),
                    None => print!("{:>14}", "-"),
                }
            }
            println!();
        }
    }

    /// Print `skill` along the summary dimensions (bands, time) that are available
    pub fn print_summaries(&self, skill: Skill) {
        if let Some(ds) = &self.latitudinal {
            print_skill_series(ds, LAT_BIN_DIM, skill);
        }
        if let Some(ds) = &self.longitudinal {
            print_skill_series(ds, LON_BIN_DIM, skill);
        }
        let temporal = self.global.as_ref().unwrap_or(&self.skills);
        if temporal.has_dim(TIME_DIM) {
            print_skill_series(temporal, TIME_DIM, skill);
        }
    }
}

fn coordinate_labels(ds: &Dataset, dim: &str, len: usize) -> Vec<String> {
    let by_name = ds.coord(dim).filter(|c| c.dim == dim);
    let coord: Option<&Coordinate> = by_name.or_else(|| ds.coords().values().find(|c| c.dim == dim));
    match coord {
        Some(c) if c.len() == len => c.values.to_labels(),
        _ => (0..len).map(|i| i.to_string()).collect(),
    }
}

/// Print one skill of every `[skill, dim]` variable of `ds`
pub fn print_skill_series(ds: &Dataset, dim: &str, skill: Skill) {
    println!("\n📊 {} by {}", skill.as_str(), dim);
    println!("{}", "=".repeat(dim.len() + skill.as_str().len() + 8));
    for (name, var) in ds.variables() {
        if var.dims.len() != 2 || var.dims[0] != SKILL_DIM || var.dims[1] != dim {
            continue;
        }
        let row = var.data.index_axis(Axis(0), skill.index());
        let labels = coordinate_labels(ds, dim, row.len());
        println!("  {}:", name);
        for (label, value) in labels.iter().zip(row.iter()) {
            println!("    {:>20}  {:>10.4}", label, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ndarray::ArrayD;

    fn dataset(offset: f32) -> Dataset {
        let times: Vec<_> = (0..4)
            .map(|h| {
                NaiveDate::from_ymd_opt(2020, 1, 1)
                    .unwrap()
                    .and_hms_opt(h, 0, 0)
                    .unwrap()
            })
            .collect();
        let values: Vec<f32> = (0..4 * 12).map(|i| i as f32 + offset).collect();
        Dataset::new()
            .with_var("t2m", ["time", "node"], ArrayD::from_shape_vec(vec![4, 12], values).unwrap())
            .unwrap()
            .with_coord("time", Coordinate::time("time", times))
            .unwrap()
    }

    #[test]
    fn test_workflow_with_healpix_nodes() {
        let obs = dataset(0.0);
        let pred = dataset(0.5);
        let options = WorkflowOptions {
            healpix_nside: Some(1),
            ..WorkflowOptions::default()
        };
        let report = run_verification(&pred, &obs, &options).unwrap();
        assert!(report.latitudinal.is_some());
        assert!(report.longitudinal.is_some());
        assert!((report.global_skill("t2m", Skill::Bias).unwrap() - 0.5).abs() < 1e-5);
        assert!((report.global_skill("t2m", Skill::Rmse).unwrap() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_workflow_without_node_dimension() {
        let obs = dataset(0.0);
        let pred = dataset(1.0);
        let options = WorkflowOptions {
            verification: VerificationOptions::over(&["time", "node"]),
            ..WorkflowOptions::default()
        };
        let report = run_verification(&pred, &obs, &options).unwrap();
        assert!(report.global.is_none());
        assert!((report.global_skill("t2m", Skill::Mae).unwrap() - 1.0).abs() < 1e-5);
        assert_eq!(report.global_skill("missing", Skill::Mae), None);
    }
}
