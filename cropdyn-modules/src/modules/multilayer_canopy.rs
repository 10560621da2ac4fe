//! A canopy split into layers, each holding a sunlit and a shaded leaf class
//!
//! The canopy is assembled from two strategies:
//! - a [`CanopyLightModel`] that describes the light environment of every layer
//! - a [`LeafPhotosynthesis`] model that converts the light reaching a leaf into assimilation
//!
//! Quantities that differ between leaf classes and layers are named from a class prefix,
//! a base name and a layer suffix, e.g. `sunlit_incident_par_layer_0`.
//! Layer 0 is at the top of the canopy.

use cropdyn_core::errors::{CropError, CropResult};
use cropdyn_core::module::{
    check_input_count, Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition,
};
use cropdyn_core::store::FloatValue;
use cropdyn_core::ModuleIO;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Number of layers used by [`MultilayerCanopy::ten_layer`]
pub const TEN_LAYERS: usize = 10;

const CANOPY_ASSIMILATION: &str = "canopy_assimilation_rate";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafClass {
    Sunlit,
    Shaded,
}

impl LeafClass {
    pub const ALL: [LeafClass; 2] = [LeafClass::Sunlit, LeafClass::Shaded];

    pub fn prefix(&self) -> &'static str {
        match self {
            LeafClass::Sunlit => "sunlit",
            LeafClass::Shaded => "shaded",
        }
    }
}

/// Base names of the quantities written for every leaf class and layer, with units
const LAYER_QUANTITIES: [(&str, &str); 3] = [
    ("incident_par", "micromol / m^2 / s"),
    ("fraction", "dimensionless"),
    ("assimilation", "micromol / m^2 / s"),
];

/// Name of a quantity belonging to one leaf class in one layer
pub fn layer_quantity_name(class: LeafClass, base: &str, layer: usize) -> String {
    format!("{}_{}_layer_{}", class.prefix(), base, layer)
}

/// Light reaching one leaf class in a layer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LeafEnvironment {
    /// PAR incident on the leaf surface (micromol / m^2 / s)
    pub incident_par: FloatValue,
    /// Fraction of the leaves in the layer that belong to this class
    pub fraction: FloatValue,
}

/// Light environment of a single canopy layer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanopyLayer {
    /// Leaf area held by the layer (m^2 leaf / m^2 ground)
    pub leaf_area: FloatValue,
    pub sunlit: LeafEnvironment,
    pub shaded: LeafEnvironment,
}

impl CanopyLayer {
    pub fn class(&self, class: LeafClass) -> &LeafEnvironment {
        match class {
            LeafClass::Sunlit => &self.sunlit,
            LeafClass::Shaded => &self.shaded,
        }
    }
}

/// Describes how light is distributed through the canopy.
#[typetag::serde(tag = "model")]
pub trait CanopyLightModel: Debug + Send + Sync {
    fn inputs(&self) -> Vec<QuantityDefinition>;

    /// Light environment of each layer, from the top of the canopy down
    ///
    /// `inputs` holds the values of [`CanopyLightModel::inputs`] in declaration order.
    fn layers(&self, inputs: &[FloatValue], nlayers: usize) -> ModuleResult<Vec<CanopyLayer>>;
}

/// Converts the light incident on a leaf into net assimilation.
#[typetag::serde(tag = "model")]
pub trait LeafPhotosynthesis: Debug + Send + Sync {
    fn inputs(&self) -> Vec<QuantityDefinition>;

    /// Net assimilation (micromol / m^2 leaf / s) of a leaf receiving `incident_par`
    fn assimilation(&self, incident_par: FloatValue, inputs: &[FloatValue])
        -> ModuleResult<FloatValue>;
}

/// Sunlit and shaded leaves under Beer's law attenuation
///
/// Each layer is represented by the cumulative leaf area index at its centre,
/// $L_i = LAI (i + 0.5) / n$. For leaves with a spherical angle distribution:
///
/// $$ k_b = \frac{0.5}{\cos\theta} $$
/// $$ f_{sunlit} = e^{-k_b L_i} $$
/// $$ I_{shaded} = I_{diffuse} e^{-k_d L_i} $$
/// $$ I_{sunlit} = I_{shaded} + k_b I_{direct} $$
///
/// Where $I_{direct}$ and $I_{diffuse}$ are the PAR above the canopy on a horizontal surface.
/// When the sun is at or below the horizon every leaf is shaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "sunlit_shaded_light")]
#[inputs(
    par_incident_direct { unit = "micromol / m^2 / s" },
    par_incident_diffuse { unit = "micromol / m^2 / s" },
    lai { unit = "m^2 / m^2" },
    cosine_zenith_angle { unit = "dimensionless" },
    kd { unit = "dimensionless" },
)]
pub struct SunlitShadedLight {}

#[typetag::serde]
impl CanopyLightModel for SunlitShadedLight {
    fn inputs(&self) -> Vec<QuantityDefinition> {
        Self::input_definitions()
    }

    fn layers(&self, inputs: &[FloatValue], nlayers: usize) -> ModuleResult<Vec<CanopyLayer>> {
        let inputs = SunlitShadedLightInputs::from_values(inputs)?;
        if inputs.lai < 0.0 {
            return Err(ModuleError::out_of_domain("lai", inputs.lai, "must not be negative"));
        }
        if inputs.kd < 0.0 {
            return Err(ModuleError::out_of_domain("kd", inputs.kd, "must not be negative"));
        }

        let sun_up = inputs.cosine_zenith_angle > 0.0;
        let kb = if sun_up {
            0.5 / inputs.cosine_zenith_angle
        } else {
            0.0
        };
        let leaf_area = inputs.lai / nlayers as FloatValue;

        Ok((0..nlayers)
            .map(|i| {
                let cumulative_lai = leaf_area * (i as FloatValue + 0.5);
                let sunlit_fraction = if sun_up {
                    (-kb * cumulative_lai).exp()
                } else {
                    0.0
                };
                let shaded_par = inputs.par_incident_diffuse * (-inputs.kd * cumulative_lai).exp();

                CanopyLayer {
                    leaf_area,
                    sunlit: LeafEnvironment {
                        incident_par: shaded_par + kb * inputs.par_incident_direct,
                        fraction: sunlit_fraction,
                    },
                    shaded: LeafEnvironment {
                        incident_par: shaded_par,
                        fraction: 1.0 - sunlit_fraction,
                    },
                }
            })
            .collect())
    }
}

/// Light response as a rectangular hyperbola
///
/// $$ A = \frac{\alpha I A_{max}}{\alpha I + A_{max}} - R_d $$
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "rectangular_hyperbola_leaf")]
#[inputs(
    quantum_efficiency { unit = "mol / mol" },
    max_assimilation_rate { unit = "micromol / m^2 / s" },
    dark_respiration { unit = "micromol / m^2 / s" },
)]
pub struct RectangularHyperbolaLeaf {}

impl RectangularHyperbolaLeaf {
    pub fn gross_assimilation(
        incident_par: FloatValue,
        quantum_efficiency: FloatValue,
        max_assimilation_rate: FloatValue,
    ) -> FloatValue {
        let light_limited = quantum_efficiency * incident_par;
        let denominator = light_limited + max_assimilation_rate;
        if denominator == 0.0 {
            0.0
        } else {
            light_limited * max_assimilation_rate / denominator
        }
    }
}

#[typetag::serde]
impl LeafPhotosynthesis for RectangularHyperbolaLeaf {
    fn inputs(&self) -> Vec<QuantityDefinition> {
        Self::input_definitions()
    }

    fn assimilation(
        &self,
        incident_par: FloatValue,
        inputs: &[FloatValue],
    ) -> ModuleResult<FloatValue> {
        let inputs = RectangularHyperbolaLeafInputs::from_values(inputs)?;
        if inputs.max_assimilation_rate < 0.0 {
            return Err(ModuleError::out_of_domain(
                "max_assimilation_rate",
                inputs.max_assimilation_rate,
                "must not be negative",
            ));
        }
        Ok(Self::gross_assimilation(
            incident_par,
            inputs.quantum_efficiency,
            inputs.max_assimilation_rate,
        ) - inputs.dark_respiration)
    }
}

/// Photosynthesis of a canopy with any number of layers
///
/// For every leaf class and layer the incident PAR, the fraction of leaves in the class
/// and their net assimilation are written. The canopy total weights the assimilation of
/// each class by its fraction and the leaf area of the layer:
///
/// $$ A_{canopy} = \sum_i L_i \left( f_{sunlit,i} A_{sunlit,i} + f_{shaded,i} A_{shaded,i} \right) $$
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "CanopyFields")]
pub struct MultilayerCanopy {
    name: String,
    nlayers: usize,
    light: Box<dyn CanopyLightModel>,
    leaf: Box<dyn LeafPhotosynthesis>,
}

/// A [`MultilayerCanopy`] as written in a configuration, before validation
#[derive(Deserialize)]
struct CanopyFields {
    name: String,
    nlayers: usize,
    light: Box<dyn CanopyLightModel>,
    leaf: Box<dyn LeafPhotosynthesis>,
}

impl TryFrom<CanopyFields> for MultilayerCanopy {
    type Error = CropError;

    fn try_from(fields: CanopyFields) -> CropResult<Self> {
        Self::new(&fields.name, fields.nlayers, fields.light, fields.leaf)
    }
}

impl MultilayerCanopy {
    pub fn new(
        name: &str,
        nlayers: usize,
        light: Box<dyn CanopyLightModel>,
        leaf: Box<dyn LeafPhotosynthesis>,
    ) -> CropResult<Self> {
        if nlayers == 0 {
            return Err(CropError::InvalidConfig(format!(
                "canopy '{}' must have at least one layer",
                name
            )));
        }
        Ok(Self {
            name: name.to_string(),
            nlayers,
            light,
            leaf,
        })
    }

    /// Ten layers of sunlit and shaded leaves with a rectangular hyperbola light response
    pub fn ten_layer() -> Self {
        Self {
            name: "ten_layer_canopy".to_string(),
            nlayers: TEN_LAYERS,
            light: Box::new(SunlitShadedLight {}),
            leaf: Box::new(RectangularHyperbolaLeaf {}),
        }
    }

    pub fn nlayers(&self) -> usize {
        self.nlayers
    }

    fn layer_outputs(&self) -> impl Iterator<Item = (LeafClass, usize, usize)> + '_ {
        LeafClass::ALL.into_iter().flat_map(move |class| {
            (0..LAYER_QUANTITIES.len())
                .flat_map(move |quantity| (0..self.nlayers).map(move |layer| (class, quantity, layer)))
        })
    }
}

#[typetag::serde]
impl Module for MultilayerCanopy {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ModuleKind {
        ModuleKind::Direct
    }

    fn definitions(&self) -> Vec<QuantityDefinition> {
        let mut definitions = self.light.inputs();
        definitions.extend(self.leaf.inputs());
        definitions.extend(self.layer_outputs().map(|(class, quantity, layer)| {
            let (base, unit) = LAYER_QUANTITIES[quantity];
            QuantityDefinition::output(&layer_quantity_name(class, base, layer), unit)
        }));
        definitions.push(QuantityDefinition::output(
            CANOPY_ASSIMILATION,
            "micromol / m^2 / s",
        ));
        definitions
    }

    fn evaluate(&self, inputs: &[FloatValue], outputs: &mut [FloatValue]) -> ModuleResult<()> {
        let n_light = self.light.inputs().len();
        check_input_count(inputs, n_light + self.leaf.inputs().len())?;
        let (light_inputs, leaf_inputs) = inputs.split_at(n_light);

        let layers = self.light.layers(light_inputs, self.nlayers)?;
        if layers.len() != self.nlayers {
            return Err(ModuleError::WrongLayerCount {
                expected: self.nlayers,
                found: layers.len(),
            });
        }
        let mut assimilation = Vec::with_capacity(layers.len());
        for layer in &layers {
            assimilation.push([
                self.leaf.assimilation(layer.sunlit.incident_par, leaf_inputs)?,
                self.leaf.assimilation(layer.shaded.incident_par, leaf_inputs)?,
            ]);
        }

        for (slot, (class, quantity, layer)) in outputs.iter_mut().zip(self.layer_outputs()) {
            let environment = layers[layer].class(class);
            *slot = match quantity {
                0 => environment.incident_par,
                1 => environment.fraction,
                _ => assimilation[layer][class as usize],
            };
        }

        let canopy_total: FloatValue = layers
            .iter()
            .zip(&assimilation)
            .map(|(layer, a)| {
                layer.leaf_area * (layer.sunlit.fraction * a[0] + layer.shaded.fraction * a[1])
            })
            .sum();
        if let Some(last) = outputs.last_mut() {
            *last = canopy_total;
        }
        Ok(())
    }
}
