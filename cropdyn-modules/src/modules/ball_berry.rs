//! Ball-Berry model of stomatal conductance

use cropdyn_core::module::{Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition};
use cropdyn_core::store::FloatValue;
use cropdyn_core::ModuleIO;
use serde::{Deserialize, Serialize};

/// Ratio of the diffusivities of water vapor and CO2 in air
const DIFFUSIVITY_RATIO: FloatValue = 1.37;

/// Saturation water vapor pressure (Pa) using the Tetens equation
pub fn saturation_vapor_pressure(temperature: FloatValue) -> FloatValue {
    610.78 * (17.27 * temperature / (temperature + 237.3)).exp()
}

/// Stomatal conductance to water vapor from net assimilation
///
/// $$ g_s = b_0 + b_1 \frac{A_n h_s}{C_s} $$
///
/// Where:
/// - $A_n$ is the net CO2 assimilation rate (mol / m^2 / s)
/// - $C_s = C_a - 1.37 A_n / g_{bw}$ is the CO2 mole fraction at the leaf surface (mol / mol)
/// - $h_s$ is the relative humidity at the leaf surface, found by carrying the ambient
///   vapor pressure to the saturation vapor pressure at leaf temperature
/// - $b_0$ and $b_1$ are the intercept and slope of the model
///
/// When the leaf is respiring ($A_n \le 0$) the conductance is $b_0$.
/// The conductance is reported in mmol / m^2 / s.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "ball_berry")]
#[inputs(
    net_assimilation_rate { unit = "mol / m^2 / s" },
    catm { name = "Catm", unit = "mol / mol" },
    rh { unit = "Pa / Pa" },
    b0 { unit = "mol / m^2 / s" },
    b1 { unit = "dimensionless" },
    gbw { unit = "mol / m^2 / s" },
    leaf_temperature { unit = "degrees C" },
    temp { unit = "degrees C" },
)]
#[outputs(
    leaf_stomatal_conductance { unit = "mmol / m^2 / s" },
)]
pub struct BallBerry {}

impl BallBerry {
    pub fn new() -> Self {
        Self {}
    }

    /// Conductance in mol / m^2 / s
    pub fn calculate_conductance(inputs: &BallBerryInputs) -> ModuleResult<FloatValue> {
        if inputs.gbw <= 0.0 {
            return Err(ModuleError::out_of_domain(
                "gbw",
                inputs.gbw,
                "boundary layer conductance must be positive",
            ));
        }

        let surface_co2 =
            inputs.catm - DIFFUSIVITY_RATIO * inputs.net_assimilation_rate / inputs.gbw;
        if surface_co2 <= 0.0 {
            return Err(ModuleError::out_of_domain(
                "Catm",
                inputs.catm,
                "CO2 at the leaf surface must remain positive",
            ));
        }

        if inputs.net_assimilation_rate <= 0.0 {
            return Ok(inputs.b0);
        }

        let vapor_pressure = inputs.rh * saturation_vapor_pressure(inputs.temp);
        let surface_humidity = (vapor_pressure / saturation_vapor_pressure(inputs.leaf_temperature))
            .clamp(0.0, 1.0);

        Ok(inputs.b0 + inputs.b1 * inputs.net_assimilation_rate * surface_humidity / surface_co2)
    }
}

#[typetag::serde]
impl Module for BallBerry {
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
        let inputs = BallBerryInputs::from_values(inputs)?;
        BallBerryOutputs {
            leaf_stomatal_conductance: Self::calculate_conductance(&inputs)? * 1e3,
        }
        .write_to(outputs);
        Ok(())
    }
}
