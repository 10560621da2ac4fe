use super::{Euler, Rosenbrock, SolverConfig, SystemSolver};
use crate::errors::CropResult;
use crate::record::RunRecord;
use crate::system::{DynamicalSystem, StateVector, TimeSpan};
use log::warn;

/// Picks a solver based on the system being integrated.
///
/// Systems that can be evaluated at arbitrary times are integrated with [`Rosenbrock`].
/// If it exhausts its step budget or can not shrink its step any further,
/// the run is restarted from the initial state with [`Euler`].
/// Systems containing fixed-step modules go straight to [`Euler`].
/// Errors raised by modules are never retried.
///
/// [`SystemSolver::integrate_into`] returns the name of the method that produced the record.
#[derive(Debug, Clone)]
pub struct Auto {
    config: SolverConfig,
}

impl Auto {
    pub const NAME: &'static str = "auto";

    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl SystemSolver for Auto {
    fn name(&self) -> &str {
        Self::NAME
    }

    /// The choice of method is made per system, so the composite counts as fixed-step.
    fn is_adaptive(&self) -> bool {
        false
    }

    fn integrate_into(
        &self,
        system: &mut DynamicalSystem,
        initial_state: &StateVector,
        span: TimeSpan,
        record: &mut RunRecord,
    ) -> CropResult<&str> {
        if system.is_adaptive_compatible() {
            let mut attempt = RunRecord::new();
            match Rosenbrock::new(self.config).integrate_into(
                system,
                initial_state,
                span,
                &mut attempt,
            ) {
                Ok(_) => {
                    record.append(attempt);
                    return Ok(Rosenbrock::NAME);
                }
                Err(err) if err.is_step_control_failure() => {
                    warn!("{}. Restarting with {}", err, Euler::NAME);
                }
                Err(err) => {
                    record.append(attempt);
                    return Err(err);
                }
            }
        }
        Euler::new(self.config).integrate_into(system, initial_state, span, record)?;
        Ok(Euler::NAME)
    }
}
