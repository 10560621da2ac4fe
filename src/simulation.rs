//! Simulations described by a TOML document.
//!
//! ```toml
//! [solver]
//! name = "euler"
//! step_size = 1.0
//!
//! [time]
//! start = 0.0
//! end = 3.0
//!
//! [initial_values]
//! TTc = 0.0
//!
//! [parameters]
//! tbase = 10.0
//!
//! [drivers]
//! time = [0.0, 3.0]
//! temp = [22.0, 34.0]
//!
//! [[modules]]
//! type = "ThermalTimeLinear"
//! ```
//!
//! Modules are deserialised by their type name, so any module implementing
//! [`Module`] with `#[typetag::serde]` can be used.

use cropdyn_core::errors::{CropError, CropResult};
use cropdyn_core::integrator::{IntegrationReport, Integrator};
use cropdyn_core::module::Module;
use cropdyn_core::record::RunRecord;
use cropdyn_core::solvers::{Auto, SolverConfig, SolverRegistry};
use cropdyn_core::store::{FloatValue, Time};
use cropdyn_core::system::{Drivers, DynamicalSystem, SystemBuilder, TimeSpan};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_solver_name() -> String {
    Auto::NAME.to_string()
}

/// The solver to run and its settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    #[serde(default = "default_solver_name")]
    pub name: String,
    #[serde(flatten)]
    pub config: SolverConfig,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            name: default_solver_name(),
            config: SolverConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSettings {
    pub start: Time,
    pub end: Time,
}

/// Everything needed to build and run a dynamical system.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub solver: SolverSettings,
    /// Defaults to the range of the drivers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<TimeSettings>,
    #[serde(default)]
    pub initial_values: BTreeMap<String, FloatValue>,
    #[serde(default)]
    pub parameters: BTreeMap<String, FloatValue>,
    /// Columns of driver values, one of which must be `time`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drivers: Option<BTreeMap<String, Vec<FloatValue>>>,
    #[serde(default)]
    pub modules: Vec<Arc<dyn Module>>,
}

impl SimulationConfig {
    pub fn from_toml(source: &str) -> CropResult<Self> {
        toml::from_str(source).map_err(|e| CropError::InvalidConfig(e.to_string()))
    }

    pub fn to_toml(&self) -> CropResult<String> {
        toml::to_string(self).map_err(|e| CropError::InvalidConfig(e.to_string()))
    }

    /// Resolve the modules into a dynamical system.
    pub fn build_system(&self) -> CropResult<DynamicalSystem> {
        let mut builder = SystemBuilder::new();
        builder
            .with_modules(self.modules.iter().cloned())
            .with_initial_values(self.initial_values.iter().map(|(k, v)| (k, *v)))
            .with_parameters(self.parameters.iter().map(|(k, v)| (k, *v)));

        if let Some(columns) = &self.drivers {
            builder.with_drivers(Drivers::from_columns(columns.clone())?);
        }
        if let Some(time) = self.time {
            builder.with_time_span(TimeSpan::new(time.start, time.end)?);
        }
        builder.build()
    }

    /// Build and run the simulation with the built in solvers.
    pub fn run(&self) -> CropResult<(RunRecord, IntegrationReport)> {
        self.run_with(&SolverRegistry::with_defaults())
    }

    /// Build and run the simulation, looking the solver up in `registry`.
    ///
    /// The solver is resolved before the system is built, so an unknown solver
    /// name fails without evaluating any module.
    pub fn run_with(&self, registry: &SolverRegistry) -> CropResult<(RunRecord, IntegrationReport)> {
        let mut integrator = Integrator::new(registry, &self.solver.name, self.solver.config)?;
        let mut system = self.build_system()?;
        info!(
            "Running {} modules in the order {:?}",
            self.modules.len(),
            system.evaluation_order()
        );

        let record = integrator.integrate(&mut system)?;
        let report = integrator
            .report()
            .cloned()
            .ok_or_else(|| CropError::Error("integration finished without a report".to_string()))?;
        Ok((record, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SimulationConfig::from_toml("").unwrap();
        assert_eq!(config.solver.name, "auto");
        assert_eq!(config.solver.config, SolverConfig::default());
        assert!(config.time.is_none());
        assert!(config.modules.is_empty());
    }

    #[test]
    fn solver_settings() {
        let config = SimulationConfig::from_toml(
            r#"
            [solver]
            name = "rk4"
            step_size = 0.5
            max_steps = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.solver.name, "rk4");
        assert_eq!(config.solver.config.step_size, 0.5);
        assert_eq!(config.solver.config.max_steps, 10);
        assert_eq!(config.solver.config.rtol, SolverConfig::default().rtol);
    }

    #[test]
    fn invalid_documents() {
        assert!(matches!(
            SimulationConfig::from_toml("[[modules]]\ntype = \"NotAModule\""),
            Err(CropError::InvalidConfig(_))
        ));
        assert!(matches!(
            SimulationConfig::from_toml("[initial_values]\nx = \"one\""),
            Err(CropError::InvalidConfig(_))
        ));
    }

    #[test]
    fn time_span_is_required_without_drivers() {
        let config = SimulationConfig::from_toml("[initial_values]\nx = 1.0").unwrap();
        assert!(matches!(
            config.build_system(),
            Err(CropError::InvalidConfig(_))
        ));
    }
}
