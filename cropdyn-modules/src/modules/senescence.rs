//! Logistic senescence coefficients for each plant organ

use cropdyn_core::module::{Module, ModuleError, ModuleKind, ModuleResult, QuantityDefinition};
use cropdyn_core::store::FloatValue;
use cropdyn_core::ModuleIO;
use serde::{Deserialize, Serialize};

/// Fraction of each organ that senesces per hour, as a function of development
///
/// Each organ follows its own logistic curve in the development index:
/// $$ k_{sene} = \frac{r_{sene}}{1 + e^{\alpha + \beta \cdot DVI}} $$
///
/// Where:
/// - $DVI$ is the development index (dimensionless)
/// - $r_{sene}$ is the maximum senescence rate of the organ (1 / hr)
/// - $\alpha$ and $\beta$ set the onset and steepness of senescence
///
/// With a positive $\beta$ the coefficient decreases with development,
/// so a negative $\beta$ is needed for senescence to increase late in the season.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ModuleIO)]
#[module(name = "senescence_coefficient_logistic")]
#[inputs(
    dvi { name = "DVI" },
    alpha_stem { name = "alphaSeneStem" },
    alpha_leaf { name = "alphaSeneLeaf" },
    beta_stem { name = "betaSeneStem" },
    beta_leaf { name = "betaSeneLeaf" },
    rate_leaf { name = "rateSeneLeaf", unit = "1 / hr" },
    rate_stem { name = "rateSeneStem", unit = "1 / hr" },
    alpha_root { name = "alphaSeneRoot" },
    alpha_rhizome { name = "alphaSeneRhizome" },
    beta_root { name = "betaSeneRoot" },
    beta_rhizome { name = "betaSeneRhizome" },
    rate_root { name = "rateSeneRoot", unit = "1 / hr" },
    rate_rhizome { name = "rateSeneRhizome", unit = "1 / hr" },
)]
#[outputs(
    k_stem { name = "kSeneStem", unit = "1 / hr" },
    k_leaf { name = "kSeneLeaf", unit = "1 / hr" },
    k_root { name = "kSeneRoot", unit = "1 / hr" },
    k_rhizome { name = "kSeneRhizome", unit = "1 / hr" },
)]
pub struct SenescenceCoefficientLogistic {}

impl SenescenceCoefficientLogistic {
    pub fn new() -> Self {
        Self {}
    }

    pub fn coefficient(
        dvi: FloatValue,
        alpha: FloatValue,
        beta: FloatValue,
        rate: FloatValue,
    ) -> FloatValue {
        rate / (1.0 + (alpha + beta * dvi).exp())
    }
}

#[typetag::serde]
impl Module for SenescenceCoefficientLogistic {
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
        let i = SenescenceCoefficientLogisticInputs::from_values(inputs)?;
        SenescenceCoefficientLogisticOutputs {
            k_stem: Self::coefficient(i.dvi, i.alpha_stem, i.beta_stem, i.rate_stem),
            k_leaf: Self::coefficient(i.dvi, i.alpha_leaf, i.beta_leaf, i.rate_leaf),
            k_root: Self::coefficient(i.dvi, i.alpha_root, i.beta_root, i.rate_root),
            k_rhizome: Self::coefficient(i.dvi, i.alpha_rhizome, i.beta_rhizome, i.rate_rhizome),
        }
        .write_to(outputs);
        Ok(())
    }
}
