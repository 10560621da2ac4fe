//! Leaf temperature from the Penman-Monteith energy balance

use cropdyn_core::module::{Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition};
use cropdyn_core::store::FloatValue;
use cropdyn_core::ModuleIO;
use serde::{Deserialize, Serialize};

/// Molar volume of air at about 20 degrees C and 100 kPa (m^3 / mol)
const MOLAR_VOLUME_OF_AIR: FloatValue = 24.39e-3;

const ABSOLUTE_ZERO: FloatValue = -273.15;

/// Leaf temperature from the difference between absorbed energy and latent heat loss
///
/// $$ \Delta T = \frac{R_n (1/g_a + 1/g_c) - \lambda D}{\lambda (s + \gamma (1 + g_a / g_c))} $$
///
/// Where:
/// - $R_n$ is the net irradiance absorbed by the leaf (W / m^2)
/// - $g_a$ is the leaf boundary layer conductance (m / s)
/// - $g_c$ is the stomatal conductance converted to m / s
/// - $\lambda$ is the latent heat of vaporization of water (J / kg)
/// - $D$ is the vapor density deficit (kg / m^3)
/// - $s$ is the slope of the saturation vapor density curve (kg / m^3 / K)
/// - $\gamma$ is the psychrometric parameter (kg / m^3 / K)
///
/// The leaf temperature is the air temperature plus $\Delta T$.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "penman_monteith_leaf_temperature")]
#[inputs(
    slope_water_vapor { unit = "kg / m^3 / K" },
    psychrometric_parameter { unit = "kg / m^3 / K" },
    latent_heat_vaporization_of_water { unit = "J / kg" },
    leaf_boundary_layer_conductance { unit = "m / s" },
    leaf_stomatal_conductance { unit = "mmol / m^2 / s" },
    leaf_net_irradiance { unit = "W / m^2" },
    vapor_density_deficit { unit = "kg / m^3" },
    temp { unit = "degrees C" },
)]
#[outputs(
    leaf_temperature { unit = "degrees C" },
)]
pub struct PenmanMonteithLeafTemperature {}

impl PenmanMonteithLeafTemperature {
    pub fn new() -> Self {
        Self {}
    }

    /// Difference between leaf and air temperature (K)
    pub fn temperature_difference(
        inputs: &PenmanMonteithLeafTemperatureInputs,
    ) -> ModuleResult<FloatValue> {
        let ga = inputs.leaf_boundary_layer_conductance;
        if ga <= 0.0 {
            return Err(ModuleError::out_of_domain(
                "leaf_boundary_layer_conductance",
                ga,
                "must be positive",
            ));
        }
        if inputs.leaf_stomatal_conductance <= 0.0 {
            return Err(ModuleError::out_of_domain(
                "leaf_stomatal_conductance",
                inputs.leaf_stomatal_conductance,
                "must be positive",
            ));
        }
        let gc = inputs.leaf_stomatal_conductance * 1e-3 * MOLAR_VOLUME_OF_AIR;
        let lhv = inputs.latent_heat_vaporization_of_water;

        Ok(
            (inputs.leaf_net_irradiance * (1.0 / ga + 1.0 / gc)
                - lhv * inputs.vapor_density_deficit)
                / (lhv
                    * (inputs.slope_water_vapor
                        + inputs.psychrometric_parameter * (1.0 + ga / gc))),
        )
    }
}

#[typetag::serde]
impl Module for PenmanMonteithLeafTemperature {
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
        let inputs = PenmanMonteithLeafTemperatureInputs::from_values(inputs)?;
        if inputs.temp < ABSOLUTE_ZERO {
            return Err(ModuleError::out_of_domain(
                "temp",
                inputs.temp,
                "must be above absolute zero",
            ));
        }
        PenmanMonteithLeafTemperatureOutputs {
            leaf_temperature: inputs.temp + Self::temperature_difference(&inputs)?,
        }
        .write_to(outputs);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PenmanMonteithLeafTemperatureInputs {
        PenmanMonteithLeafTemperatureInputs {
            slope_water_vapor: 1.45e-3,
            psychrometric_parameter: 4.9e-4,
            latent_heat_vaporization_of_water: 2.44e6,
            leaf_boundary_layer_conductance: 0.05,
            leaf_stomatal_conductance: 400.0,
            leaf_net_irradiance: 300.0,
            vapor_density_deficit: 0.01,
            temp: 25.0,
        }
    }

    #[test]
    fn temperature_difference() {
        let i = inputs();
        let gc = 400.0 * 1e-3 * 24.39e-3;
        let expected = (300.0 * (1.0 / 0.05 + 1.0 / gc) - 2.44e6 * 0.01)
            / (2.44e6 * (1.45e-3 + 4.9e-4 * (1.0 + 0.05 / gc)));
        let delta = PenmanMonteithLeafTemperature::temperature_difference(&i).unwrap();
        assert!((delta - expected).abs() < 1e-12);
    }

    #[test]
    fn transpiration_cools_the_leaf() {
        let mut i = inputs();
        i.leaf_net_irradiance = 0.0;
        assert!(PenmanMonteithLeafTemperature::temperature_difference(&i).unwrap() < 0.0);
    }

    #[test]
    fn evaluate_adds_air_temperature() {
        let i = inputs();
        let values = [
            i.slope_water_vapor,
            i.psychrometric_parameter,
            i.latent_heat_vaporization_of_water,
            i.leaf_boundary_layer_conductance,
            i.leaf_stomatal_conductance,
            i.leaf_net_irradiance,
            i.vapor_density_deficit,
            i.temp,
        ];
        let mut outputs = [0.0];
        PenmanMonteithLeafTemperature::new()
            .evaluate(&values, &mut outputs)
            .unwrap();
        let delta = PenmanMonteithLeafTemperature::temperature_difference(&i).unwrap();
        assert!((outputs[0] - (25.0 + delta)).abs() < 1e-12);
    }

    #[test]
    fn rejects_non_physical_inputs() {
        let mut i = inputs();
        i.leaf_stomatal_conductance = 0.0;
        assert!(PenmanMonteithLeafTemperature::temperature_difference(&i).is_err());

        let mut i = inputs();
        i.leaf_boundary_layer_conductance = -0.01;
        assert!(PenmanMonteithLeafTemperature::temperature_difference(&i).is_err());

        let values = [1.45e-3, 4.9e-4, 2.44e6, 0.05, 400.0, 300.0, 0.01, -300.0];
        let mut outputs = [0.0];
        assert!(matches!(
            PenmanMonteithLeafTemperature::new().evaluate(&values, &mut outputs),
            Err(ModuleError::OutOfDomain { quantity, .. }) if quantity == "temp"
        ));
    }
}
