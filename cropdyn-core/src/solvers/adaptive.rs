//! Step size control shared by the adaptive solvers.

use super::{output_times, record_state, SolverConfig};
use crate::errors::{CropError, CropResult};
use crate::record::RunRecord;
use crate::store::{FloatValue, Time};
use crate::system::{DynamicalSystem, StateVector, TimeSpan};
use log::debug;

const SAFETY: FloatValue = 0.9;
const MAX_GROWTH: FloatValue = 5.0;
const MIN_SHRINK: FloatValue = 0.2;

/// A single attempted step of an embedded method.
pub(crate) struct Attempt {
    pub state: StateVector,
    /// Estimate of the local error of `state`
    pub error: StateVector,
}

/// An embedded method that proposes a step along with an error estimate.
pub(crate) trait EmbeddedMethod {
    fn name(&self) -> &str;

    /// Exponent used to grow the step after an accepted step
    fn accept_exponent(&self) -> FloatValue;

    /// Exponent used to shrink the step after a rejected step
    fn reject_exponent(&self) -> FloatValue;

    /// Attempt a step from `time` to `end`.
    ///
    /// The system must not be evaluated after `end`.
    /// Returns `None` if the step could not be formed at all, which is treated as a rejection.
    fn attempt(
        &self,
        system: &mut DynamicalSystem,
        state: &StateVector,
        time: Time,
        end: Time,
    ) -> CropResult<Option<Attempt>>;
}

/// Scaled maximum norm of the error estimate.
///
/// A value of at most 1 means the step meets the tolerances.
pub(crate) fn error_norm(
    error: &StateVector,
    state: &StateVector,
    new_state: &StateVector,
    config: &SolverConfig,
) -> FloatValue {
    if error.iter().chain(new_state.iter()).any(|v| !v.is_finite()) {
        return FloatValue::INFINITY;
    }
    error
        .iter()
        .zip(state.iter().zip(new_state.iter()))
        .map(|(e, (y, y_new))| e.abs() / (config.atol + config.rtol * y.abs().max(y_new.abs())))
        .fold(0.0, FloatValue::max)
}

/// Smallest step that still advances `time`.
fn min_step(time: Time) -> Time {
    16.0 * FloatValue::EPSILON * time.abs().max(1.0)
}

/// Integrate with step size control, landing exactly on every output time.
pub(crate) fn integrate_adaptive(
    method: &impl EmbeddedMethod,
    config: &SolverConfig,
    system: &mut DynamicalSystem,
    initial_state: &StateVector,
    span: TimeSpan,
    record: &mut RunRecord,
) -> CropResult<()> {
    let mut times = output_times(span, config.step_size)?;
    let mut time = times.next().unwrap_or(span.start);
    let mut state = initial_state.clone();
    record_state(system, record, &state, time)?;

    let mut step_size = config.step_size;
    for target in times {
        let mut steps = 0;

        while time < target {
            if steps >= config.max_steps {
                return Err(CropError::MaxStepsExceeded {
                    solver: method.name().to_string(),
                    time,
                    evaluations: system.call_count(),
                    max_steps: config.max_steps,
                });
            }
            steps += 1;

            let remaining = target - time;
            let lands = step_size >= remaining;
            let trial = if lands { remaining } else { step_size };
            if !lands && trial < min_step(time) {
                return Err(CropError::StepSizeUnderflow {
                    solver: method.name().to_string(),
                    time,
                    step_size: trial,
                    evaluations: system.call_count(),
                });
            }

            let end = if lands {
                target
            } else {
                (time + trial).min(target)
            };
            let attempt = method.attempt(system, &state, time, end)?;
            let error = attempt
                .as_ref()
                .map(|a| error_norm(&a.error, &state, &a.state, config))
                .unwrap_or(FloatValue::INFINITY);

            match attempt {
                Some(attempt) if error <= 1.0 => {
                    time = end;
                    state = attempt.state;

                    let factor = if error == 0.0 {
                        MAX_GROWTH
                    } else {
                        (SAFETY * error.powf(-method.accept_exponent())).min(MAX_GROWTH)
                    };
                    // A step shortened to land on an output time does not limit the next one
                    let proposed = trial * factor;
                    step_size = if lands {
                        proposed.max(step_size)
                    } else {
                        proposed
                    };
                }
                _ => {
                    let factor = (SAFETY * error.powf(-method.reject_exponent())).max(MIN_SHRINK);
                    step_size = trial * factor.min(1.0);
                    debug!(
                        "{} rejected step at t={} with h={:e} (error {:e}), retrying with h={:e}",
                        method.name(),
                        time,
                        trial,
                        error,
                        step_size
                    );
                }
            }
        }
        time = target;
        record_state(system, record, &state, target)?;
    }
    Ok(())
}
