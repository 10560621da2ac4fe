//! Type definitions for the system module.

use crate::errors::{CropError, CropResult};
use crate::store::{FloatValue, QuantityId, Time};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::resolve::M;

/// The values of the state quantities, in state order.
pub type StateVector = DVector<FloatValue>;

/// Name of the quantity that always holds the simulated time.
pub const TIME: &str = "time";

/// The closed interval of simulated time covered by a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: Time,
    pub end: Time,
}

impl TimeSpan {
    pub fn new(start: Time, end: Time) -> CropResult<Self> {
        if !start.is_finite() || !end.is_finite() {
            return Err(CropError::InvalidConfig(format!(
                "time span [{}, {}] must be finite",
                start, end
            )));
        }
        if end < start {
            return Err(CropError::InvalidConfig(format!(
                "time span end ({}) is before its start ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> Time {
        self.end - self.start
    }
}

/// A direct module bound to the store indices of its inputs and outputs.
#[derive(Debug)]
pub(crate) struct BoundModule {
    pub module: M,
    pub inputs: Vec<QuantityId>,
    pub outputs: Vec<QuantityId>,
}

/// A derivative module bound to its inputs and to the positions of the
/// state quantities whose rates it produces.
#[derive(Debug)]
pub(crate) struct BoundDerivative {
    pub module: M,
    pub inputs: Vec<QuantityId>,
    pub rates: Vec<usize>,
}
