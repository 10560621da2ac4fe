use super::adaptive::{integrate_adaptive, Attempt, EmbeddedMethod};
use super::{stage_time, SolverConfig, SystemSolver};
use crate::errors::CropResult;
use crate::record::RunRecord;
use crate::store::{FloatValue, Time};
use crate::system::{DynamicalSystem, StateVector, TimeSpan};
use nalgebra::DMatrix;

/// Linearly implicit Rosenbrock method using the 2(3) pair of Shampine and Reichelt.
///
/// The Jacobian and the time derivative of the system are approximated by forward
/// finite differences, so each attempted step takes `n + 4` evaluations for `n` states.
/// The method is L-stable, which makes it suitable for stiff systems where an explicit
/// method would be forced into very small steps.
#[derive(Debug, Clone)]
pub struct Rosenbrock {
    config: SolverConfig,
}

impl Rosenbrock {
    pub const NAME: &'static str = "rosenbrock";

    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

/// Perturbation used for a finite difference with respect to `value`.
fn increment(value: FloatValue) -> FloatValue {
    FloatValue::EPSILON.sqrt() * value.abs().max(1.0)
}

/// Forward difference approximation of the Jacobian of the derivatives.
fn jacobian(
    system: &mut DynamicalSystem,
    state: &StateVector,
    time: Time,
    rates: &StateVector,
) -> CropResult<DMatrix<FloatValue>> {
    let n = state.len();
    let mut jacobian = DMatrix::zeros(n, n);
    for j in 0..n {
        let delta = increment(state[j]);
        let mut perturbed = state.clone();
        perturbed[j] += delta;
        let column = (system.derivatives(&perturbed, time)? - rates) / delta;
        jacobian.set_column(j, &column);
    }
    Ok(jacobian)
}

impl EmbeddedMethod for Rosenbrock {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accept_exponent(&self) -> FloatValue {
        1.0 / 3.0
    }

    fn reject_exponent(&self) -> FloatValue {
        1.0 / 3.0
    }

    fn attempt(
        &self,
        system: &mut DynamicalSystem,
        state: &StateVector,
        time: Time,
        end: Time,
    ) -> CropResult<Option<Attempt>> {
        let d = 1.0 / (2.0 + std::f64::consts::SQRT_2);
        let e32 = 6.0 + std::f64::consts::SQRT_2;
        let h = end - time;
        let n = state.len();

        let f0 = system.derivatives(state, time)?;
        if n == 0 {
            return Ok(Some(Attempt {
                state: state.clone(),
                error: f0,
            }));
        }

        // Stay inside the step so drivers are never extrapolated
        let perturbed_time = (time + increment(time)).min(end);
        let dt = perturbed_time - time;
        let dfdt = (system.derivatives(state, perturbed_time)? - &f0) / dt;
        let jac = jacobian(system, state, time, &f0)?;

        let w = DMatrix::<FloatValue>::identity(n, n) - jac * (h * d);
        let lu = w.lu();
        if !lu.is_invertible() {
            return Ok(None);
        }
        let solve = |rhs: StateVector| lu.solve(&rhs);

        let Some(k1) = solve(&f0 + &dfdt * (h * d)) else {
            return Ok(None);
        };
        let midpoint = stage_time(time, end, 0.5);
        let f1 = system.derivatives(&(state + &k1 * (0.5 * h)), midpoint)?;
        let Some(k2) = solve(&f1 - &k1).map(|k| k + &k1) else {
            return Ok(None);
        };
        let new_state = state + &k2 * h;
        let f2 = system.derivatives(&new_state, end)?;
        let Some(k3) =
            solve(f2 - (&k2 - &f1) * e32 - (&k1 - &f0) * 2.0 + &dfdt * (h * d))
        else {
            return Ok(None);
        };

        let error = (k1 - k2 * 2.0 + k3) * (h / 6.0);
        Ok(Some(Attempt {
            state: new_state,
            error,
        }))
    }
}

impl SystemSolver for Rosenbrock {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn is_adaptive(&self) -> bool {
        true
    }

    fn integrate_into(
        &self,
        system: &mut DynamicalSystem,
        initial_state: &StateVector,
        span: TimeSpan,
        record: &mut RunRecord,
    ) -> CropResult<&str> {
        integrate_adaptive(self, &self.config, system, initial_state, span, record)?;
        Ok(Self::NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_modules::{constant_rate_system, decay_system, stiff_system};
    use crate::solvers::Rkck54;

    fn config() -> SolverConfig {
        SolverConfig {
            step_size: 0.5,
            rtol: 1e-5,
            atol: 1e-7,
            max_steps: 500,
        }
    }

    #[test]
    fn constant_rate() {
        let mut system = constant_rate_system(1.0, 3.0).unwrap();
        let record = Rosenbrock::new(SolverConfig::with_step_size(1.0))
            .integrate(&mut system)
            .unwrap();

        let temperature = record.column("T").unwrap();
        for (value, expected) in temperature.iter().zip([20.0, 21.0, 22.0, 23.0]) {
            assert!((value - expected).abs() < 1e-9);
        }
        // One state, so each step takes five evaluations
        assert_eq!(system.call_count(), 15);
    }

    #[test]
    fn decay_within_tolerance() {
        let mut system = decay_system(2.0, 3.0).unwrap();
        let record = Rosenbrock::new(config()).integrate(&mut system).unwrap();

        for (i, time) in record.times().iter().enumerate() {
            let expected = (-2.0 * time).exp();
            let value = record.value("x", i).unwrap();
            assert!(
                (value - expected).abs() < 1e-3,
                "t={} x={} expected={}",
                time,
                value,
                expected
            );
        }
    }

    #[test]
    fn stiff_system_is_cheaper_than_explicit() {
        let mut system = stiff_system(2.0).unwrap();
        let implicit = Rosenbrock::new(config()).integrate(&mut system).unwrap();
        let implicit_evaluations = system.call_count();

        system.reset_call_count();
        let explicit = Rkck54::new(config()).integrate(&mut system).unwrap();
        let explicit_evaluations = system.call_count();

        assert!(implicit_evaluations < explicit_evaluations);

        // y2 = e^-t (1 + 1/999) - e^-1000t / 999
        let expected = (-2.0f64).exp() * (1.0 + 1.0 / 999.0);
        let last = implicit.len() - 1;
        assert!((implicit.value("y2", last).unwrap() - expected).abs() < 1e-3);
        assert!((explicit.value("y2", explicit.len() - 1).unwrap() - expected).abs() < 1e-3);
        assert!(implicit.value("y1", last).unwrap().abs() < 1e-3);
    }
}
