use crate::errors::CropResult;
use crate::module::{
    check_input_count, Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition,
};
use crate::store::FloatValue;
use crate::system::{Drivers, DynamicalSystem, SystemBuilder, TimeSpan};
use crate::ModuleIO;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// ConstantRate - the simplest derivative module
// ============================================================================

/// dT/dt = rate
#[derive(Debug, Serialize, Deserialize, ModuleIO)]
#[module(name = "constant_rate")]
#[inputs(
    rate { unit = "K / hr" },
)]
#[outputs(
    temperature { name = "T", unit = "K" },
)]
pub(crate) struct ConstantRate {}

#[typetag::serde]
impl Module for ConstantRate {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Derivative
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        Self::generated_definitions()
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        let inputs = ConstantRateInputs::from_values(inputs)?;
        ConstantRateOutputs {
            temperature: inputs.rate,
        }
        .write_to(outputs);
        Ok(())
    }
}

// ============================================================================
// ExponentialDecay - dx/dt = -k x
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ModuleIO)]
#[module(name = "exponential_decay")]
#[inputs(
    x { unit = "kg" },
    k { name = "decay_rate", unit = "1 / hr" },
)]
#[outputs(
    x { unit = "kg" },
)]
pub(crate) struct ExponentialDecay {}

#[typetag::serde]
impl Module for ExponentialDecay {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Derivative
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        Self::generated_definitions()
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        let inputs = ExponentialDecayInputs::from_values(inputs)?;
        ExponentialDecayOutputs {
            x: -inputs.k * inputs.x,
        }
        .write_to(outputs);
        Ok(())
    }
}

// ============================================================================
// StiffPair - a fast and a slow mode
// ============================================================================

/// y1' = -1000 y1, y2' = y1 - y2
#[derive(Debug, Serialize, Deserialize, ModuleIO)]
#[module(name = "stiff_pair")]
#[inputs(y1, y2)]
#[outputs(y1, y2)]
pub(crate) struct StiffPair {}

#[typetag::serde]
impl Module for StiffPair {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Derivative
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        Self::generated_definitions()
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        let inputs = StiffPairInputs::from_values(inputs)?;
        StiffPairOutputs {
            y1: -1000.0 * inputs.y1,
            y2: inputs.y1 - inputs.y2,
        }
        .write_to(outputs);
        Ok(())
    }
}

// ============================================================================
// DailyGrowth - only valid with a fixed time step
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ModuleIO)]
#[module(name = "daily_growth")]
#[inputs(
    growth_rate { unit = "kg / hr" },
)]
#[outputs(
    biomass { unit = "kg" },
)]
pub(crate) struct DailyGrowth {}

#[typetag::serde]
impl Module for DailyGrowth {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Derivative
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        Self::generated_definitions()
    }

    fn requires_fixed_step(&self) -> bool {
        true
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        let inputs = DailyGrowthInputs::from_values(inputs)?;
        DailyGrowthOutputs {
            biomass: inputs.growth_rate,
        }
        .write_to(outputs);
        Ok(())
    }
}

// ============================================================================
// SquareRoot - a direct module with a restricted domain
// ============================================================================

#[derive(Debug, Serialize, Deserialize, ModuleIO)]
#[module(name = "square_root")]
#[inputs(x)]
#[outputs(
    root { name = "sqrt_x" },
)]
pub(crate) struct SquareRoot {}

#[typetag::serde]
impl Module for SquareRoot {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Direct
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        Self::generated_definitions()
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        let inputs = SquareRootInputs::from_values(inputs)?;
        if inputs.x < 0.0 {
            return Err(ModuleError::out_of_domain("x", inputs.x, "must not be negative"));
        }
        SquareRootOutputs {
            root: inputs.x.sqrt(),
        }
        .write_to(outputs);
        Ok(())
    }
}

// ============================================================================
// Linear - a configurable module for building arbitrary graphs
// ============================================================================

/// Writes `factor` times the sum of its inputs to every output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Linear {
    pub name: String,
    pub kind: ModuleKind,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub factor: FloatValue,
}

impl Linear {
    pub fn direct(name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self::new(name, ModuleKind::Direct, inputs, outputs, 1.0)
    }

    pub fn derivative(name: &str, inputs: &[&str], outputs: &[&str]) -> Self {
        Self::new(name, ModuleKind::Derivative, inputs, outputs, 1.0)
    }

    pub fn new(
        name: &str,
        kind: ModuleKind,
        inputs: &[&str],
        outputs: &[&str],
        factor: FloatValue,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            factor,
        }
    }
}

#[typetag::serde]
impl Module for Linear {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        self.inputs
            .iter()
            .map(|name| QuantityDefinition::input(name, ""))
            .chain(
                self.outputs
                    .iter()
                    .map(|name| QuantityDefinition::output(name, "")),
            )
            .collect()
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        check_input_count(inputs, self.inputs.len())?;
        let value = self.factor * inputs.iter().sum::<FloatValue>();
        outputs.iter_mut().for_each(|output| *output = value);
        Ok(())
    }
}

// ============================================================================
// Ready made systems
// ============================================================================

/// T starts at 20 and rises by `rate` per hour.
pub(crate) fn constant_rate_system(rate: FloatValue, end: FloatValue) -> CropResult<DynamicalSystem> {
    SystemBuilder::new()
        .with_module(Arc::new(ConstantRate {}))
        .with_initial_value("T", 20.0)
        .with_parameter("rate", rate)
        .with_time_span(TimeSpan::new(0.0, end)?)
        .build()
}

/// x starts at 1 and decays at rate `k`.
pub(crate) fn decay_system(k: FloatValue, end: FloatValue) -> CropResult<DynamicalSystem> {
    SystemBuilder::new()
        .with_module(Arc::new(ExponentialDecay {}))
        .with_initial_value("x", 1.0)
        .with_parameter("decay_rate", k)
        .with_time_span(TimeSpan::new(0.0, end)?)
        .build()
}

pub(crate) fn stiff_system(end: FloatValue) -> CropResult<DynamicalSystem> {
    SystemBuilder::new()
        .with_module(Arc::new(StiffPair {}))
        .with_initial_value("y1", 1.0)
        .with_initial_value("y2", 1.0)
        .with_time_span(TimeSpan::new(0.0, end)?)
        .build()
}

/// dT/dt follows the `temp` driver, with the run covering the driver times.
pub(crate) fn driven_system(
    times: Vec<FloatValue>,
    temp: Vec<FloatValue>,
) -> CropResult<DynamicalSystem> {
    SystemBuilder::new()
        .with_module(Arc::new(Linear::derivative("warming", &["temp"], &["T"])))
        .with_initial_value("T", 0.0)
        .with_drivers(Drivers::new(times)?.with_column("temp", temp)?)
        .build()
}

/// A decaying system that also contains a fixed-step module.
pub(crate) fn fixed_step_system(end: FloatValue) -> CropResult<DynamicalSystem> {
    SystemBuilder::new()
        .with_module(Arc::new(ExponentialDecay {}))
        .with_module(Arc::new(DailyGrowth {}))
        .with_initial_value("x", 1.0)
        .with_initial_value("biomass", 0.0)
        .with_parameter("decay_rate", 0.5)
        .with_parameter("growth_rate", 2.0)
        .with_time_span(TimeSpan::new(0.0, end)?)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::QuantityRole;

    #[test]
    fn derived_definitions() {
        let definitions = ExponentialDecay {}.definitions();
        assert_eq!(definitions.len(), 3);

        assert_eq!(definitions[0].name, "x");
        assert_eq!(definitions[0].unit, "kg");
        assert_eq!(definitions[0].role, QuantityRole::Input);

        assert_eq!(definitions[1].name, "decay_rate");
        assert_eq!(definitions[1].unit, "1 / hr");

        assert_eq!(definitions[2].name, "x");
        assert_eq!(definitions[2].role, QuantityRole::Output);
    }

    #[test]
    fn definitions_without_an_instance() {
        assert_eq!(SquareRoot::NAME, "square_root");
        let outputs = SquareRoot::output_definitions();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "sqrt_x");
        assert_eq!(outputs[0].unit, "");
    }

    #[test]
    fn generated_inputs_validate_values() {
        assert_eq!(
            ExponentialDecayInputs::from_values(&[2.0, 0.5]).unwrap(),
            ExponentialDecayInputs { x: 2.0, k: 0.5 }
        );
        assert_eq!(
            ExponentialDecayInputs::from_values(&[2.0]),
            Err(ModuleError::WrongInputCount {
                expected: 2,
                found: 1
            })
        );
        match ExponentialDecayInputs::from_values(&[f64::NAN, 0.5]) {
            Err(ModuleError::NonFiniteInput { quantity, .. }) => assert_eq!(quantity, "x"),
            other => panic!("Expected NonFiniteInput, got {:?}", other),
        }
    }

    #[test]
    fn generated_outputs_are_written_in_order() {
        let mut outputs = [0.0; 2];
        StiffPairOutputs { y1: 1.0, y2: 2.0 }.write_to(&mut outputs);
        assert_eq!(outputs, [1.0, 2.0]);
    }

    #[test]
    fn domain_errors() {
        let mut outputs = [0.0];
        assert!(SquareRoot {}.evaluate(&[4.0], &mut outputs).is_ok());
        assert_eq!(outputs[0], 2.0);
        assert!(matches!(
            SquareRoot {}.evaluate(&[-1.0], &mut outputs),
            Err(ModuleError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn serialise_module() {
        let module: Box<dyn Module> = Box::new(Linear::direct("double", &["a"], &["b"]));
        let serialised = serde_json::to_string(&module).unwrap();
        assert_eq!(
            serialised,
            r#"{"type":"Linear","name":"double","kind":"Direct","inputs":["a"],"outputs":["b"],"factor":1.0}"#
        );

        let deserialised: Box<dyn Module> = serde_json::from_str(&serialised).unwrap();
        assert_eq!(deserialised.name(), "double");
        assert_eq!(deserialised.input_names(), vec!["a".to_string()]);
    }
}
