//! A dynamical system couples a set of modules with the quantities they operate on.
//!
//! Modules are resolved into a dependency graph once, when the system is built.
//! Every module input must be produced by another module or supplied as an initial value,
//! a parameter or a driver. If an input can not be satisfied the build step fails.
//!
//! Once built, the system calculates the derivative of its state at any simulated time.
//! Direct modules are evaluated first in dependency order, followed by the derivative
//! modules whose rates make up the derivative vector handed to a solver.

mod builder;
mod drivers;
mod resolve;
mod runtime;
mod types;

#[cfg(test)]
mod tests;

// Public re-exports
pub use builder::SystemBuilder;
pub use drivers::{Drivers, DRIVER_TIME};
pub use resolve::{MGraph, M};
pub use runtime::DynamicalSystem;
pub use types::{StateVector, TimeSpan, TIME};
