//! Partitioning of sunlight into direct and diffuse components

use cropdyn_core::module::{Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition};
use cropdyn_core::store::FloatValue;
use cropdyn_core::ModuleIO;
use serde::{Deserialize, Serialize};

/// Atmospheric pressure at sea level (Pa)
pub const SEA_LEVEL_PRESSURE: FloatValue = 101325.0;

/// Transmittances and fractions of direct and diffuse light above the canopy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightPartition {
    pub direct_transmittance: FloatValue,
    pub diffuse_transmittance: FloatValue,
    pub direct_fraction: FloatValue,
    pub diffuse_fraction: FloatValue,
}

/// Light macro environment
///
/// Calculates how much sunlight is scattered out of the direct beam by the atmosphere,
/// following chapter 11 of Campbell and Norman (1998).
///
/// $$ \tau_{direct} = \tau^{(P / P_0) / \cos\theta} $$
/// $$ \tau_{diffuse} = s (1 - \tau_{direct}) \cos\theta $$
///
/// Where:
/// - $\theta$ is the solar zenith angle
/// - $\tau$ is the transmittance of a small volume of atmosphere
/// - $P / P_0$ is the ratio of local to sea level pressure
/// - $s$ is the atmospheric scattering factor
///
/// When the sun is at or below the horizon all light is diffuse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "light_macro_environment")]
#[inputs(
    cosine_zenith_angle { unit = "dimensionless" },
    atmospheric_pressure { unit = "Pa" },
    atmospheric_transmittance { unit = "dimensionless" },
    atmospheric_scattering { unit = "dimensionless" },
)]
#[outputs(
    direct_transmittance { name = "irradiance_direct_transmittance", unit = "dimensionless" },
    diffuse_transmittance { name = "irradiance_diffuse_transmittance", unit = "dimensionless" },
    direct_fraction { name = "irradiance_direct_fraction", unit = "dimensionless" },
    diffuse_fraction { name = "irradiance_diffuse_fraction", unit = "dimensionless" },
)]
pub struct LightMacroEnvironment {}

impl LightMacroEnvironment {
    pub fn new() -> Self {
        Self {}
    }

    pub fn partition(
        cosine_zenith_angle: FloatValue,
        atmospheric_pressure: FloatValue,
        atmospheric_transmittance: FloatValue,
        atmospheric_scattering: FloatValue,
    ) -> LightPartition {
        let pressure_ratio = atmospheric_pressure / SEA_LEVEL_PRESSURE;

        let (direct_transmittance, diffuse_transmittance) = if cosine_zenith_angle <= 0.0 {
            (0.0, 1.0)
        } else {
            let direct = atmospheric_transmittance.powf(pressure_ratio / cosine_zenith_angle);
            let diffuse = atmospheric_scattering * (1.0 - direct) * cosine_zenith_angle;
            (direct, diffuse)
        };

        let direct_fraction = direct_transmittance / (direct_transmittance + diffuse_transmittance);

        LightPartition {
            direct_transmittance,
            diffuse_transmittance,
            direct_fraction,
            diffuse_fraction: 1.0 - direct_fraction,
        }
    }
}

#[typetag::serde]
impl Module for LightMacroEnvironment {
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
        let inputs = LightMacroEnvironmentInputs::from_values(inputs)?;
        if inputs.atmospheric_pressure <= 0.0 {
            return Err(ModuleError::out_of_domain(
                "atmospheric_pressure",
                inputs.atmospheric_pressure,
                "must be positive",
            ));
        }
        let light = Self::partition(
            inputs.cosine_zenith_angle,
            inputs.atmospheric_pressure,
            inputs.atmospheric_transmittance,
            inputs.atmospheric_scattering,
        );
        LightMacroEnvironmentOutputs {
            direct_transmittance: light.direct_transmittance,
            diffuse_transmittance: light.diffuse_transmittance,
            direct_fraction: light.direct_fraction,
            diffuse_fraction: light.diffuse_fraction,
        }
        .write_to(outputs);
        Ok(())
    }
}
