//! Runs a solver over a dynamical system and reports what happened.

use crate::errors::CropResult;
use crate::record::RunRecord;
use crate::solvers::{Euler, SolverConfig, SolverRegistry, SystemSolver};
use crate::system::DynamicalSystem;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// Summary of the most recent call to [`Integrator::integrate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationReport {
    /// The solver the integrator was created with
    pub requested_solver: String,
    /// The method that produced the record.
    ///
    /// A solver that delegates reports the method it handed the run to.
    /// If the run failed this is the solver that was invoked.
    pub solver_used: String,
    /// Whether the run was completed by [`Euler`] in place of the requested method
    pub fell_back: bool,
    /// Number of evaluations of the system during the run
    pub evaluations: usize,
    /// Number of recorded time points
    pub points: usize,
    pub completed: bool,
}

/// Drives a dynamical system through time with a named solver.
///
/// An adaptive solver can not be used with a system containing fixed-step modules.
/// In that case the integrator falls back to [`Euler`] with the same configuration,
/// logs a warning and notes the substitution in its report.
#[derive(Debug)]
pub struct Integrator {
    requested: String,
    solver: Box<dyn SystemSolver>,
    config: SolverConfig,
    integrate_called: bool,
    report: Option<IntegrationReport>,
    partial: Option<RunRecord>,
}

impl Integrator {
    /// Look up the solver immediately so that an unknown name fails before any evaluation.
    pub fn new(registry: &SolverRegistry, name: &str, config: SolverConfig) -> CropResult<Self> {
        let solver = registry.create(name, config)?;
        Ok(Self {
            requested: name.to_string(),
            solver,
            config,
            integrate_called: false,
            report: None,
            partial: None,
        })
    }

    /// Integrate the system from its initial state over its time span.
    ///
    /// Returns every quantity at every recorded time.
    /// On failure the points recorded before the error are available from
    /// [`Integrator::partial_record`].
    pub fn integrate(&mut self, system: &mut DynamicalSystem) -> CropResult<RunRecord> {
        if self.integrate_called {
            info!(
                "Integrator for '{}' is running again; discarding the previous report",
                self.requested
            );
        }
        self.report = None;
        self.partial = None;

        let fallback;
        let incompatible = self.solver.is_adaptive() && !system.is_adaptive_compatible();
        let solver: &dyn SystemSolver = if incompatible {
            warn!(
                "Solver '{}' requires a system that can be evaluated at any time, \
                 but at least one module requires fixed steps. Using '{}' instead",
                self.requested,
                Euler::NAME
            );
            fallback = Euler::new(self.config);
            &fallback
        } else {
            self.solver.as_ref()
        };

        let span = system.time_span();
        let initial_state = system.initial_state().clone();
        system.reset_call_count();
        info!(
            "Integrating {} states over [{}, {}] with '{}'",
            initial_state.len(),
            span.start,
            span.end,
            solver.name()
        );

        let mut record = RunRecord::new();
        let result = solver
            .integrate_into(system, &initial_state, span, &mut record)
            .map(str::to_string);
        self.integrate_called = true;

        let solver_used = match &result {
            Ok(method) => method.clone(),
            Err(_) => solver.name().to_string(),
        };
        if solver_used != solver.name() {
            info!("Solver '{}' handed the run to '{}'", solver.name(), solver_used);
        }
        let report = IntegrationReport {
            requested_solver: self.requested.clone(),
            fell_back: solver_used == Euler::NAME && self.solver.name() != Euler::NAME,
            solver_used,
            evaluations: system.call_count(),
            points: record.len(),
            completed: result.is_ok(),
        };
        info!(
            "Integration with '{}' {} after {} evaluations and {} points",
            report.solver_used,
            if report.completed { "finished" } else { "failed" },
            report.evaluations,
            report.points
        );
        self.report = Some(report);

        match result {
            Ok(_) => Ok(record),
            Err(err) => {
                self.partial = Some(record);
                Err(err)
            }
        }
    }

    /// Whether [`Integrator::integrate`] has been called on this integrator.
    pub fn has_integrated(&self) -> bool {
        self.integrate_called
    }

    pub fn report(&self) -> Option<&IntegrationReport> {
        self.report.as_ref()
    }

    /// Points recorded before the most recent run failed.
    pub fn partial_record(&self) -> Option<&RunRecord> {
        self.partial.as_ref()
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }
}
