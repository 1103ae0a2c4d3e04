//! Time axis checks
//!
//! Normalizes user supplied timestep specifications and detects gaps in a
//! regularly sampled time axis.

use crate::errors::{ArCheckError, Result};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A timestep specification as accepted by the time axis checks
#[derive(Debug, Clone, PartialEq)]
pub enum TimestepSpec {
    /// A single ISO 8601 timestamp
    Text(String),
    /// A single timestamp
    Single(NaiveDateTime),
    /// Several timestamps
    Many(Vec<NaiveDateTime>),
    /// Several ISO 8601 timestamps
    ManyText(Vec<String>),
}

impl From<&str> for TimestepSpec {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TimestepSpec {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for TimestepSpec {
    fn from(value: NaiveDateTime) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<NaiveDateTime>> for TimestepSpec {
    fn from(value: Vec<NaiveDateTime>) -> Self {
        Self::Many(value)
    }
}

impl From<&[NaiveDateTime]> for TimestepSpec {
    fn from(value: &[NaiveDateTime]) -> Self {
        Self::Many(value.to_vec())
    }
}

impl From<Vec<String>> for TimestepSpec {
    fn from(value: Vec<String>) -> Self {
        Self::ManyText(value)
    }
}

/// Parse an ISO 8601 timestamp (date only, minutes or seconds precision)
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim().trim_end_matches('Z');
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date_hour(text))
        .ok_or_else(|| ArCheckError::InvalidTimesteps(format!("cannot parse '{text}' as a datetime")))
}

/// Date only (`2021-01-01`) or date plus hour (`2021-01-01T06`)
fn parse_date_hour(text: &str) -> Option<NaiveDateTime> {
    let (date, hour) = match text.split_once(['T', ' ']) {
        Some((date, hour)) => (date, hour),
        None => (text, "0"),
    };
    if hour.is_empty() || hour.len() > 2 || !hour.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u32 = hour.parse().ok()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(hour, 0, 0)
}

/// Normalize a timestep specification into a vector of timestamps
pub fn check_timesteps(timesteps: impl Into<TimestepSpec>) -> Result<Vec<NaiveDateTime>> {
    let timesteps = match timesteps.into() {
        TimestepSpec::Text(text) => vec![parse_timestamp(&text)?],
        TimestepSpec::Single(t) => vec![t],
        TimestepSpec::Many(values) => values,
        TimestepSpec::ManyText(values) => values
            .iter()
            .map(|v| parse_timestamp(v))
            .collect::<Result<Vec<_>>>()?,
    };
    if timesteps.is_empty() {
        return Err(ArCheckError::InvalidTimesteps("'timesteps' is empty.".to_string()));
    }
    Ok(timesteps)
}

/// Indices of `timesteps` whose value is one of `subset_timesteps`.
///
/// Subset timesteps absent from `timesteps` are an error with `strict_match`;
/// otherwise they are reported as a warning and skipped.
pub fn get_subset_timesteps_idxs(
    timesteps: impl Into<TimestepSpec>,
    subset_timesteps: impl Into<TimestepSpec>,
    strict_match: bool,
) -> Result<Vec<usize>> {
    let subset = check_timesteps(subset_timesteps)?;
    let timesteps = check_timesteps(timesteps)?;

    let wanted: HashSet<NaiveDateTime> = subset.iter().copied().collect();
    let idxs: Vec<usize> = timesteps
        .iter()
        .enumerate()
        .filter(|(_, t)| wanted.contains(*t))
        .map(|(i, _)| i)
        .collect();
    if idxs.is_empty() {
        return Err(ArCheckError::InvalidTimesteps(
            "The 'subset_timesteps' are not within the available 'timesteps'.".to_string(),
        ));
    }

    let available: HashSet<NaiveDateTime> = timesteps.iter().copied().collect();
    let missing: Vec<NaiveDateTime> = subset
        .into_iter()
        .filter(|t| !available.contains(t))
        .collect();
    if !missing.is_empty() {
        if strict_match {
            return Err(ArCheckError::SubsetNotWithin { missing });
        }
        warn!(?missing, "some 'subset_timesteps' are not within 'timesteps'");
    }
    Ok(idxs)
}

/// Ensure a time axis has no gaps.
///
/// The most frequent step is taken as the sampling interval; every pair of
/// consecutive timesteps separated by another step is reported.
pub fn check_no_missing_timesteps(timesteps: impl Into<TimestepSpec>, verbose: bool) -> Result<()> {
    let timesteps = check_timesteps(timesteps).map_err(|e| match e {
        ArCheckError::InvalidTimesteps(msg) if msg.contains("empty") => {
            ArCheckError::MissingInput("No data available !".to_string())
        }
        other => other,
    })?;

    if verbose {
        println!("  --> Starting at {}", timesteps[0]);
        println!("  --> Ending at {}", timesteps[timesteps.len() - 1]);
    }

    let deltas: Vec<TimeDelta> = timesteps.windows(2).map(|w| w[1] - w[0]).collect();
    let mut counts: BTreeMap<TimeDelta, usize> = BTreeMap::new();
    for delta in &deltas {
        *counts.entry(*delta).or_insert(0) += 1;
    }
    if counts.len() <= 1 {
        return Ok(());
    }

    let max_count = counts.values().copied().max().unwrap_or(0);
    let mut gaps = Vec::new();
    println!("Missing data between:");
    for (bad_delta, _) in counts.iter().filter(|&(_, &c)| c != max_count) {
        for (idx, _) in deltas.iter().enumerate().filter(|(_, d)| *d == bad_delta) {
            let (start, end) = (timesteps[idx], timesteps[idx + 1]);
            println!("- {start} and {end}");
            gaps.push((start, end));
        }
    }
    Err(ArCheckError::MissingTimesteps { gaps })
}
