//! Numerical strategies for advancing a dynamical system through time.
//!
//! Every solver records the full set of quantities at `t0 + k * step_size`,
//! with the final point clamped to the end of the time span.
//! Fixed-step solvers take exactly one step per output interval, while adaptive solvers
//! take as many internal steps as their error control requires and land exactly
//! on each output time.

mod adaptive;
mod auto;
mod euler;
mod registry;
mod rk4;
mod rkck54;
mod rosenbrock;

use crate::errors::{CropError, CropResult};
use crate::record::RunRecord;
use crate::store::{FloatValue, Time};
use crate::system::{DynamicalSystem, StateVector, TimeSpan};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub use auto::Auto;
pub use euler::Euler;
pub use registry::{SolverConstructor, SolverRegistry};
pub use rk4::Rk4;
pub use rkck54::Rkck54;
pub use rosenbrock::Rosenbrock;

/// Settings shared by all solvers.
///
/// The tolerances and the step budget are only used by adaptive solvers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Fixed step size, and the spacing of the recorded output for adaptive solvers
    pub step_size: Time,
    pub rtol: FloatValue,
    pub atol: FloatValue,
    /// Maximum number of attempted steps per output interval
    pub max_steps: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            step_size: 1.0,
            rtol: 1e-4,
            atol: 1e-4,
            max_steps: 200,
        }
    }
}

impl SolverConfig {
    pub fn with_step_size(step_size: Time) -> Self {
        Self {
            step_size,
            ..Default::default()
        }
    }

    /// Read a configuration from a TOML table, using defaults for missing keys.
    pub fn from_toml(source: &str) -> CropResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| CropError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CropResult<()> {
        let positive = [
            ("step_size", self.step_size),
            ("rtol", self.rtol),
            ("atol", self.atol),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(CropError::InvalidConfig(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.max_steps == 0 {
            return Err(CropError::InvalidConfig(
                "max_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A strategy for integrating a dynamical system over a time span.
pub trait SystemSolver: Debug + Send + Sync {
    /// The name the solver is registered under
    fn name(&self) -> &str;

    /// Whether the solver evaluates the system at times chosen by its error control
    fn is_adaptive(&self) -> bool;

    /// Integrate from `initial_state` over `span`, appending to `record`.
    ///
    /// Returns the name of the method that advanced the system, which differs from
    /// [`SystemSolver::name`] when the solver hands the run to another method.
    /// On failure `record` holds every point recorded before the error.
    fn integrate_into(
        &self,
        system: &mut DynamicalSystem,
        initial_state: &StateVector,
        span: TimeSpan,
        record: &mut RunRecord,
    ) -> CropResult<&str>;

    /// Integrate a system from its initial state over its time span.
    fn integrate(&self, system: &mut DynamicalSystem) -> CropResult<RunRecord> {
        let mut record = RunRecord::new();
        let initial_state = system.initial_state().clone();
        let span = system.time_span();
        self.integrate_into(system, &initial_state, span, &mut record)?;
        Ok(record)
    }
}

/// Number of steps of size `step_size` needed to cover `duration`.
///
/// Ratios within rounding error of a whole number are not rounded up.
/// Fails if the number of steps can not be counted.
pub(crate) fn step_count(duration: Time, step_size: Time) -> CropResult<usize> {
    if duration <= 0.0 {
        return Ok(0);
    }
    let ratio = duration / step_size;
    if !ratio.is_finite() || ratio >= usize::MAX as FloatValue {
        return Err(CropError::InvalidConfig(format!(
            "step_size {:e} is too small for a time span of {}",
            step_size, duration
        )));
    }
    let nearest = ratio.round();
    if (ratio - nearest).abs() <= 1e-9 * nearest.max(1.0) {
        Ok(nearest.max(1.0) as usize)
    } else {
        Ok(ratio.ceil() as usize)
    }
}

/// The times at which a run is recorded, generated as they are needed.
pub(crate) fn output_times(
    span: TimeSpan,
    step_size: Time,
) -> CropResult<impl Iterator<Item = Time>> {
    let n = step_count(span.duration(), step_size)?;
    Ok((0..n)
        .map(move |k| span.start + k as Time * step_size)
        .chain(std::iter::once(span.end)))
}

/// Time of the stage at fraction `c` of the step from `time` to `end`.
///
/// Never passes `end`, and the stage at `c = 1` is exactly `end`.
pub(crate) fn stage_time(time: Time, end: Time, c: FloatValue) -> Time {
    if c >= 1.0 {
        end
    } else {
        (time + c * (end - time)).min(end)
    }
}

/// Record every quantity for the given state.
pub(crate) fn record_state(
    system: &mut DynamicalSystem,
    record: &mut RunRecord,
    state: &StateVector,
    time: Time,
) -> CropResult<()> {
    let snapshot = system.snapshot(state, time)?;
    record.push(time, snapshot);
    Ok(())
}

/// Advance one step from `time` to `end`.
type FixedStep =
    fn(&mut DynamicalSystem, &StateVector, Time, Time) -> CropResult<StateVector>;

/// Run a fixed-step method, taking exactly one step per output interval.
pub(crate) fn integrate_fixed(
    system: &mut DynamicalSystem,
    initial_state: &StateVector,
    span: TimeSpan,
    step_size: Time,
    record: &mut RunRecord,
    step: FixedStep,
) -> CropResult<()> {
    let mut times = output_times(span, step_size)?;
    let mut time = times.next().unwrap_or(span.start);
    let mut state = initial_state.clone();
    record_state(system, record, &state, time)?;

    for next in times {
        state = step(system, &state, time, next)?;
        record_state(system, record, &state, next)?;
        time = next;
    }
    Ok(())
}
