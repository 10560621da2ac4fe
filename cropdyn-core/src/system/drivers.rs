//! Externally supplied, time-varying quantities such as weather data.

use crate::errors::{CropError, CropResult};
use crate::store::{FloatValue, Time};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the column holding the time of each row.
pub const DRIVER_TIME: &str = "time";

/// A table of driver values sampled at increasing times.
///
/// Values between rows are linearly interpolated.
/// Requesting a value outside the sampled times is an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drivers {
    times: Vec<Time>,
    columns: Vec<(String, Vec<FloatValue>)>,
}

impl Drivers {
    /// Create a driver table from the sample times.
    pub fn new(times: Vec<Time>) -> CropResult<Self> {
        if times.is_empty() {
            return Err(CropError::InvalidConfig(
                "drivers must contain at least one time".to_string(),
            ));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(CropError::InvalidConfig(
                "driver times must be finite".to_string(),
            ));
        }
        if times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(CropError::InvalidConfig(
                "driver times must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            times,
            columns: vec![],
        })
    }

    /// Add a column of values, one per sample time.
    pub fn with_column(mut self, name: &str, values: Vec<FloatValue>) -> CropResult<Self> {
        if name == DRIVER_TIME {
            return Err(CropError::InvalidConfig(format!(
                "'{}' is reserved for the driver sample times",
                DRIVER_TIME
            )));
        }
        if values.len() != self.times.len() {
            return Err(CropError::InvalidConfig(format!(
                "driver '{}' has {} values but there are {} driver times",
                name,
                values.len(),
                self.times.len()
            )));
        }
        if self.columns.iter().any(|(n, _)| n == name) {
            return Err(CropError::DuplicateOutput {
                quantity: name.to_string(),
                first: "drivers".to_string(),
                second: "drivers".to_string(),
            });
        }
        self.columns.push((name.to_string(), values));
        Ok(self)
    }

    /// Build a driver table from named columns, one of which must be `time`.
    ///
    /// Columns are added in name order.
    pub fn from_columns(mut columns: BTreeMap<String, Vec<FloatValue>>) -> CropResult<Self> {
        let times = columns.remove(DRIVER_TIME).ok_or_else(|| {
            CropError::InvalidConfig(format!("drivers must contain a '{}' column", DRIVER_TIME))
        })?;
        columns
            .into_iter()
            .try_fold(Self::new(times)?, |drivers, (name, values)| {
                drivers.with_column(&name, values)
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn start(&self) -> Time {
        self.times[0]
    }

    pub fn end(&self) -> Time {
        self.times[self.times.len() - 1]
    }

    /// Interpolate every column at `time`, writing the values in column order.
    pub fn interpolate_into(&self, time: Time, values: &mut [FloatValue]) -> CropResult<()> {
        if self.columns.is_empty() {
            return Ok(());
        }
        if !(time >= self.start() && time <= self.end()) {
            return Err(CropError::ExtrapolationNotAllowed {
                quantity: self.columns[0].0.clone(),
                time,
                start: self.start(),
                end: self.end(),
            });
        }

        // Index of the first sample strictly after `time`
        let upper = self.times.partition_point(|t| *t <= time);
        if upper == self.times.len() {
            // Exactly on the final sample
            for (value, (_, column)) in values.iter_mut().zip(&self.columns) {
                *value = column[upper - 1];
            }
            return Ok(());
        }

        let lower = upper - 1;
        let fraction = (time - self.times[lower]) / (self.times[upper] - self.times[lower]);
        for (value, (_, column)) in values.iter_mut().zip(&self.columns) {
            *value = column[lower] + fraction * (column[upper] - column[lower]);
        }
        Ok(())
    }

    /// Interpolate a single column at `time`.
    pub fn value_at(&self, name: &str, time: Time) -> CropResult<FloatValue> {
        let index = self
            .columns
            .iter()
            .position(|(n, _)| n == name)
            .ok_or_else(|| CropError::UnknownQuantity(name.to_string()))?;
        let mut values = vec![0.0; self.columns.len()];
        self.interpolate_into(time, &mut values)?;
        Ok(values[index])
    }
}
