//! Linear thermal time accumulation

use cropdyn_core::module::{Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition};
use cropdyn_core::store::FloatValue;
use cropdyn_core::ModuleIO;
use serde::{Deserialize, Serialize};

/// Rate of thermal time accumulation using a single base temperature
///
/// Development proceeds linearly once the air temperature exceeds the base temperature:
/// $$ \frac{dTT_c}{dt} = \frac{\max(T - T_{base}, 0)}{24} $$
///
/// Where:
/// - $TT_c$ is the accumulated thermal time (degrees C * day)
/// - $T$ is the air temperature (degrees C)
/// - $T_{base}$ is the base temperature (degrees C)
///
/// The daily rate is divided by 24 since time derivatives are specified per hour.
/// This model tends to overestimate development at high temperatures.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "thermal_time_linear")]
#[inputs(
    temp { unit = "degrees C" },
    tbase { unit = "degrees C" },
)]
#[outputs(
    ttc { name = "TTc", unit = "degrees C * day / hr" },
)]
pub struct ThermalTimeLinear {}

impl ThermalTimeLinear {
    pub fn new() -> Self {
        Self {}
    }

    /// Hourly rate of thermal time accumulation
    pub fn calculate_rate(temp: FloatValue, tbase: FloatValue) -> FloatValue {
        let rate_per_day = if temp <= tbase { 0.0 } else { temp - tbase };
        rate_per_day / 24.0
    }
}

#[typetag::serde]
impl Module for ThermalTimeLinear {
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
        let inputs = ThermalTimeLinearInputs::from_values(inputs)?;
        ThermalTimeLinearOutputs {
            ttc: Self::calculate_rate(inputs.temp, inputs.tbase),
        }
        .write_to(outputs);
        Ok(())
    }
}
