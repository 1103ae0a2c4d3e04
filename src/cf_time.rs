//! CF-convention time axes (`"<unit> since <reference>"`)

use crate::errors::{ArCheckError, Result};
use crate::timesteps::parse_timestamp;
use chrono::{NaiveDateTime, TimeDelta};

/// Default encoding used when writing time coordinates
pub const DEFAULT_TIME_UNITS: &str = "hours since 1970-01-01 00:00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn seconds(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
            Self::Days => 86400.0,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Minutes => "minutes",
            Self::Hours => "hours",
            Self::Days => "days",
        }
    }
}

/// Parsed CF time units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub unit: TimeUnit,
    pub reference: NaiveDateTime,
}

impl CfTimeUnits {
    /// Whether a `units` attribute describes a time axis
    pub fn is_time_units(units: &str) -> bool {
        units.contains(" since ")
    }

    pub fn parse(units: &str) -> Result<Self> {
        let (unit, reference) = units.split_once(" since ").ok_or_else(|| {
            ArCheckError::InvalidTimesteps(format!("'{units}' is not a CF time unit"))
        })?;
        let unit = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "s" => TimeUnit::Seconds,
            "minutes" | "minute" | "min" => TimeUnit::Minutes,
            "hours" | "hour" | "h" => TimeUnit::Hours,
            "days" | "day" | "d" => TimeUnit::Days,
            other => {
                return Err(ArCheckError::InvalidTimesteps(format!(
                    "unsupported CF time unit '{other}'"
                )))
            }
        };
        let reference = reference.trim().trim_end_matches("UTC").trim();
        Ok(Self {
            unit,
            reference: parse_timestamp(reference)?,
        })
    }

    pub fn decode(&self, value: f64) -> Result<NaiveDateTime> {
        if !value.is_finite() {
            return Err(ArCheckError::InvalidTimesteps(format!(
                "time value {value} is not finite"
            )));
        }
        let millis = (value * self.unit.seconds() * 1000.0).round();
        TimeDelta::try_milliseconds(millis as i64)
            .and_then(|delta| self.reference.checked_add_signed(delta))
            .ok_or_else(|| {
                ArCheckError::InvalidTimesteps(format!("time value {value} is out of range"))
            })
    }

    pub fn encode(&self, time: NaiveDateTime) -> f64 {
        let delta = time - self.reference;
        delta.num_milliseconds() as f64 / 1000.0 / self.unit.seconds()
    }

    pub fn decode_all(&self, values: &[f64]) -> Result<Vec<NaiveDateTime>> {
        values.iter().map(|&v| self.decode(v)).collect()
    }
}

impl std::fmt::Display for CfTimeUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} since {}",
            self.unit.as_str(),
            self.reference.format("%Y-%m-%d %H:%M:%S")
        )
    }
}
