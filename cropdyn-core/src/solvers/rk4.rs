use super::{integrate_fixed, stage_time, SolverConfig, SystemSolver};
use crate::errors::CropResult;
use crate::record::RunRecord;
use crate::store::Time;
use crate::system::{DynamicalSystem, StateVector, TimeSpan};

/// The classical fourth order Runge-Kutta method with a fixed step size.
///
/// Each step takes four evaluations of the system.
#[derive(Debug, Clone)]
pub struct Rk4 {
    config: SolverConfig,
}

impl Rk4 {
    pub const NAME: &'static str = "rk4";

    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

fn rk4_step(
    system: &mut DynamicalSystem,
    state: &StateVector,
    time: Time,
    end: Time,
) -> CropResult<StateVector> {
    let step_size = end - time;
    let half = step_size / 2.0;
    let midpoint = stage_time(time, end, 0.5);
    let k1 = system.derivatives(state, time)?;
    let k2 = system.derivatives(&(state + &k1 * half), midpoint)?;
    let k3 = system.derivatives(&(state + &k2 * half), midpoint)?;
    let k4 = system.derivatives(&(state + &k3 * step_size), end)?;

    Ok(state + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (step_size / 6.0))
}

impl SystemSolver for Rk4 {
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
            rk4_step,
        )?;
        Ok(Self::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_modules::{constant_rate_system, decay_system};
    use crate::solvers::Euler;
    use is_close::is_close;

    #[test]
    fn evaluation_count() {
        let mut system = constant_rate_system(1.0, 3.0).unwrap();
        let record = Rk4::new(SolverConfig::with_step_size(0.5))
            .integrate(&mut system)
            .unwrap();
        assert_eq!(system.call_count(), 24);
        assert_eq!(record.len(), 7);
    }

    #[test]
    fn constant_rate_matches_closed_form() {
        let config = SolverConfig::with_step_size(0.25);
        let mut system = constant_rate_system(0.8, 3.0).unwrap();
        let rk4 = Rk4::new(config).integrate(&mut system).unwrap();
        let euler = Euler::new(config).integrate(&mut system).unwrap();

        for (i, time) in rk4.times().iter().enumerate() {
            let expected = 20.0 + 0.8 * time;
            assert!(is_close!(rk4.value("T", i).unwrap(), expected));
            assert!(is_close!(euler.value("T", i).unwrap(), expected));
        }
    }

    #[test]
    fn decay_is_accurate() {
        let mut system = decay_system(1.0, 1.0).unwrap();
        let record = Rk4::new(SolverConfig::with_step_size(0.1))
            .integrate(&mut system)
            .unwrap();
        let x = record.value("x", record.len() - 1).unwrap();
        assert!((x - (-1.0f64).exp()).abs() < 1e-6);
    }
}
