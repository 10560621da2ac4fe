//! Composable crop growth simulations
//!
//! A simulation couples stateless modules into a dynamical system whose evaluation order
//! is resolved from the quantities each module reads and writes.
//! The system is then integrated through time with a solver chosen by name.
//!
//! The building blocks live in `cropdyn-core` and the module library in `cropdyn-modules`;
//! both are re-exported here along with a TOML driven [`SimulationConfig`].

pub mod simulation;

pub use cropdyn_core::{errors, integrator, module, record, solvers, store, system, ModuleIO};
pub use cropdyn_modules::{library, modules};
pub use simulation::{SimulationConfig, SolverSettings, TimeSettings};
