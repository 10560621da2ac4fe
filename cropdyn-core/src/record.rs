//! Time-ordered snapshots of every quantity produced by a run.

use crate::store::{FloatValue, Snapshot, Time};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// The output of a run.
///
/// Each row holds the value of every quantity in the system (state and auxiliary)
/// at one recorded time, in the order given by [`RunRecord::names`].
/// The record is owned by the caller once a solver has finished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    names: Vec<String>,
    times: Vec<Time>,
    rows: Vec<Vec<FloatValue>>,
}

impl RunRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a snapshot taken at `time`.
    ///
    /// The quantity names are taken from the first snapshot.
    /// Snapshots from the same system always share their names.
    pub fn push(&mut self, time: Time, snapshot: Snapshot) {
        if self.names.is_empty() {
            self.names = snapshot.names().to_vec();
        }
        debug_assert_eq!(self.names.len(), snapshot.names().len());
        self.times.push(time);
        self.rows.push(snapshot.into_values());
    }

    /// Move every row of `other` to the end of this record.
    pub fn append(&mut self, mut other: RunRecord) {
        if self.names.is_empty() {
            self.names = std::mem::take(&mut other.names);
        }
        self.times.append(&mut other.times);
        self.rows.append(&mut other.rows);
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn times(&self) -> &[Time] {
        &self.times
    }

    pub fn rows(&self) -> &[Vec<FloatValue>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn last_time(&self) -> Option<Time> {
        self.times.last().copied()
    }

    /// The value of a quantity at the given row.
    pub fn value(&self, name: &str, row: usize) -> Option<FloatValue> {
        let index = self.names.iter().position(|n| n == name)?;
        self.rows.get(row).map(|values| values[index])
    }

    /// All recorded values of a single quantity.
    pub fn column(&self, name: &str) -> Option<Array1<FloatValue>> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|values| values[index]).collect())
    }

    /// The whole record with one row per recorded time and one column per quantity.
    pub fn to_array(&self) -> Array2<FloatValue> {
        Array2::from_shape_fn((self.rows.len(), self.names.len()), |(i, j)| self.rows[i][j])
    }
}
