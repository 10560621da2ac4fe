//! Modules are the units of computation that make up a dynamical system.
//!
//! A module declares the quantities it reads and the quantities it writes.
//! Direct modules write auxiliary quantities into the store, while derivative modules
//! write the rate of change of state quantities which is then consumed by a solver.
//!
//! Modules are stateless. Everything a module needs must be declared as an input,
//! including its parameters, so that the same module can be shared between systems.
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use thiserror::Error;

use crate::store::FloatValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Produces auxiliary quantities from the current quantities
    Direct,
    /// Produces the rate of change of state quantities
    Derivative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityRole {
    /// A quantity read by the module
    Input,
    /// A quantity written by the module
    ///
    /// For derivative modules this names the state quantity whose rate is produced.
    Output,
}

/// Declaration of a single quantity used by a module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuantityDefinition {
    pub name: String,
    pub unit: String,
    pub role: QuantityRole,
}

impl QuantityDefinition {
    pub fn new(name: &str, unit: &str, role: QuantityRole) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            role,
        }
    }

    pub fn input(name: &str, unit: &str) -> Self {
        Self::new(name, unit, QuantityRole::Input)
    }

    pub fn output(name: &str, unit: &str) -> Self {
        Self::new(name, unit, QuantityRole::Output)
    }
}

/// Failure raised by a module while evaluating.
///
/// These are never clamped away by the framework.
/// The dynamical system attaches the module name, simulated time and evaluation count.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModuleError {
    #[error("input '{quantity}' is not finite ({value})")]
    NonFiniteInput { quantity: String, value: FloatValue },

    #[error("output '{quantity}' is not finite ({value})")]
    NonFiniteOutput { quantity: String, value: FloatValue },

    #[error("input '{quantity}' is out of its domain ({value}): {expected}")]
    OutOfDomain {
        quantity: String,
        value: FloatValue,
        expected: String,
    },

    #[error("expected {expected} input values, got {found}")]
    WrongInputCount { expected: usize, found: usize },

    #[error("expected {expected} canopy layers, got {found}")]
    WrongLayerCount { expected: usize, found: usize },
}

impl ModuleError {
    pub fn out_of_domain(quantity: &str, value: FloatValue, expected: &str) -> Self {
        ModuleError::OutOfDomain {
            quantity: quantity.to_string(),
            value,
            expected: expected.to_string(),
        }
    }
}

/// Convenience type for `Result<T, ModuleError>`.
pub type ModuleResult<T> = Result<T, ModuleError>;

/// A unit of computation over named quantities.
///
/// The definitions of a module are structural: they may depend on how the module was
/// configured (e.g. a number of canopy layers) but never on the values in the store.
/// This allows the evaluation order to be resolved once when a system is built.
#[typetag::serde(tag = "type")]
pub trait Module: Debug + Send + Sync {
    /// Human readable identifier used in error messages and graph output
    fn name(&self) -> &str;

    fn kind(&self) -> ModuleKind;

    /// Inputs followed by outputs, each in declaration order
    fn definitions(&self) -> Vec<QuantityDefinition>;

    /// Evaluate the module.
    ///
    /// `inputs` holds the current value of each input in declaration order.
    /// The module must write every output, in declaration order, into `outputs`.
    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()>;

    /// Whether this module is only valid with a fixed time step
    ///
    /// Discrete models, such as those built around daily updates, can not be
    /// evaluated at arbitrary times by an adaptive solver.
    fn requires_fixed_step(&self) -> bool {
        false
    }

    fn inputs(&self) -> Vec<QuantityDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.role == QuantityRole::Input)
            .collect()
    }

    fn outputs(&self) -> Vec<QuantityDefinition> {
        self.definitions()
            .into_iter()
            .filter(|d| d.role == QuantityRole::Output)
            .collect()
    }

    fn input_names(&self) -> Vec<String> {
        self.inputs().into_iter().map(|d| d.name).collect()
    }

    fn output_names(&self) -> Vec<String> {
        self.outputs().into_iter().map(|d| d.name).collect()
    }
}

/// Check that a value is finite before using it as a module input.
pub fn finite_input(quantity: &str, value: FloatValue) -> ModuleResult<FloatValue> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ModuleError::NonFiniteInput {
            quantity: quantity.to_string(),
            value,
        })
    }
}

/// Check that the number of input values matches the number of declared inputs.
pub fn check_input_count(values: &[FloatValue], expected: usize) -> ModuleResult<()> {
    if values.len() == expected {
        Ok(())
    } else {
        Err(ModuleError::WrongInputCount {
            expected,
            found: values.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finite_input_rejects_nan_and_inf() {
        assert_eq!(finite_input("x", 1.5), Ok(1.5));
        assert!(matches!(
            finite_input("x", f64::NAN),
            Err(ModuleError::NonFiniteInput { .. })
        ));
        assert!(matches!(
            finite_input("x", f64::INFINITY),
            Err(ModuleError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn input_count() {
        assert!(check_input_count(&[1.0, 2.0], 2).is_ok());
        assert_eq!(
            check_input_count(&[1.0], 2),
            Err(ModuleError::WrongInputCount {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn error_messages_name_the_quantity() {
        let err = ModuleError::out_of_domain("temp", -300.0, "must be above absolute zero");
        assert_eq!(
            err.to_string(),
            "input 'temp' is out of its domain (-300): must be above absolute zero"
        );
    }
}
