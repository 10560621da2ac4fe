use super::adaptive::{integrate_adaptive, Attempt, EmbeddedMethod};
use super::{stage_time, SolverConfig, SystemSolver};
use crate::errors::CropResult;
use crate::record::RunRecord;
use crate::store::{FloatValue, Time};
use crate::system::{DynamicalSystem, StateVector, TimeSpan};

// Cash-Karp tableau
const C: [FloatValue; 6] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 3.0 / 5.0, 1.0, 7.0 / 8.0];
const A: [[FloatValue; 5]; 6] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [3.0 / 10.0, -9.0 / 10.0, 6.0 / 5.0, 0.0, 0.0],
    [-11.0 / 54.0, 5.0 / 2.0, -70.0 / 27.0, 35.0 / 27.0, 0.0],
    [
        1631.0 / 55296.0,
        175.0 / 512.0,
        575.0 / 13824.0,
        44275.0 / 110592.0,
        253.0 / 4096.0,
    ],
];
/// Fifth order weights
const B5: [FloatValue; 6] = [
    37.0 / 378.0,
    0.0,
    250.0 / 621.0,
    125.0 / 594.0,
    0.0,
    512.0 / 1771.0,
];
/// Embedded fourth order weights
const B4: [FloatValue; 6] = [
    2825.0 / 27648.0,
    0.0,
    18575.0 / 48384.0,
    13525.0 / 55296.0,
    277.0 / 14336.0,
    1.0 / 4.0,
];

/// Adaptive explicit Runge-Kutta method using the Cash-Karp 5(4) pair.
///
/// The fifth order solution is propagated and the difference to the embedded
/// fourth order solution is used as the error estimate.
/// Each attempted step takes six evaluations of the system.
#[derive(Debug, Clone)]
pub struct Rkck54 {
    config: SolverConfig,
}

impl Rkck54 {
    pub const NAME: &'static str = "rkck54";

    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl EmbeddedMethod for Rkck54 {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn accept_exponent(&self) -> FloatValue {
        1.0 / 5.0
    }

    fn reject_exponent(&self) -> FloatValue {
        1.0 / 4.0
    }

    fn attempt(
        &self,
        system: &mut DynamicalSystem,
        state: &StateVector,
        time: Time,
        end: Time,
    ) -> CropResult<Option<Attempt>> {
        let step_size = end - time;
        let mut stages: Vec<StateVector> = Vec::with_capacity(6);
        for (c, a) in C.iter().zip(A.iter()) {
            let mut stage_state = state.clone();
            for (k, a_ij) in stages.iter().zip(a.iter()) {
                if *a_ij != 0.0 {
                    stage_state += k * (step_size * a_ij);
                }
            }
            stages.push(system.derivatives(&stage_state, stage_time(time, end, *c))?);
        }

        let mut new_state = state.clone();
        let mut error = StateVector::zeros(state.len());
        for (k, (b5, b4)) in stages.iter().zip(B5.iter().zip(B4.iter())) {
            new_state += k * (step_size * b5);
            error += k * (step_size * (b5 - b4));
        }

        Ok(Some(Attempt {
            state: new_state,
            error,
        }))
    }
}

impl SystemSolver for Rkck54 {
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
