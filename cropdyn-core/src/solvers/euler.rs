use super::{integrate_fixed, SolverConfig, SystemSolver};
use crate::errors::CropResult;
use crate::record::RunRecord;
use crate::store::Time;
use crate::system::{DynamicalSystem, StateVector, TimeSpan};

/// Forward Euler with a fixed step size.
///
/// Takes exactly one evaluation per step and is valid for every system,
/// which makes it the fallback whenever an adaptive solver can not be used.
#[derive(Debug, Clone)]
pub struct Euler {
    config: SolverConfig,
}

impl Euler {
    pub const NAME: &'static str = "euler";

    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

fn euler_step(
    system: &mut DynamicalSystem,
    state: &StateVector,
    time: Time,
    end: Time,
) -> CropResult<StateVector> {
    let rates = system.derivatives(state, time)?;
    Ok(state + rates * (end - time))
}

impl SystemSolver for Euler {
    fn name(&self) -> &str {
        Self::NAME
    }

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
        integrate_fixed(
            system,
            initial_state,
            span,
            self.config.step_size,
            record,
            euler_step,
        )?;
        Ok(Self::NAME)
    }
}
