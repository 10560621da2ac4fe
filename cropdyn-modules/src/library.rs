//! Lookup of modules by name.

use crate::modules::{
    BallBerry, LightMacroEnvironment, MultilayerCanopy, PenmanMonteithLeafTemperature,
    SenescenceCoefficientLogistic, ThermalTimeLinear,
};
use cropdyn_core::errors::{CropError, CropResult};
use cropdyn_core::module::{Module, QuantityDefinition};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Creates a module with its default configuration.
pub type ModuleConstructor = fn() -> Arc<dyn Module>;

/// A table of modules that can be created by name.
///
/// The inputs and outputs of a module can be queried without the caller
/// constructing the module.
#[derive(Debug, Clone, Default)]
pub struct ModuleLibrary {
    constructors: BTreeMap<String, ModuleConstructor>,
}

impl ModuleLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every module shipped with this crate.
    pub fn standard() -> Self {
        let modules: [(&str, ModuleConstructor); 6] = [
            (BallBerry::NAME, || Arc::new(BallBerry::new())),
            (LightMacroEnvironment::NAME, || {
                Arc::new(LightMacroEnvironment::new())
            }),
            (PenmanMonteithLeafTemperature::NAME, || {
                Arc::new(PenmanMonteithLeafTemperature::new())
            }),
            (SenescenceCoefficientLogistic::NAME, || {
                Arc::new(SenescenceCoefficientLogistic::new())
            }),
            ("ten_layer_canopy", || Arc::new(MultilayerCanopy::ten_layer())),
            (ThermalTimeLinear::NAME, || Arc::new(ThermalTimeLinear::new())),
        ];
        Self {
            constructors: modules
                .into_iter()
                .map(|(name, constructor)| (name.to_string(), constructor))
                .collect(),
        }
    }

    /// Add a module under a new name, replacing any existing entry.
    pub fn insert(&mut self, name: &str, constructor: ModuleConstructor) {
        if self
            .constructors
            .insert(name.to_string(), constructor)
            .is_some()
        {
            debug!("Replaced module '{}' in the library", name);
        }
    }

    pub fn create(&self, name: &str) -> CropResult<Arc<dyn Module>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| CropError::UnknownModule {
                name: name.to_string(),
            })
    }

    pub fn inputs(&self, name: &str) -> CropResult<Vec<QuantityDefinition>> {
        Ok(self.create(name)?.inputs())
    }

    pub fn outputs(&self, name: &str) -> CropResult<Vec<QuantityDefinition>> {
        Ok(self.create(name)?.outputs())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Library names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cropdyn_core::module::ModuleKind;
    use serde::Deserialize;

    #[test]
    fn standard_modules() {
        let library = ModuleLibrary::standard();
        assert_eq!(
            library.names(),
            vec![
                "ball_berry",
                "light_macro_environment",
                "penman_monteith_leaf_temperature",
                "senescence_coefficient_logistic",
                "ten_layer_canopy",
                "thermal_time_linear",
            ]
        );
        for name in library.names() {
            assert_eq!(library.create(&name).unwrap().name(), name);
        }
    }

    #[test]
    fn query_without_constructing() {
        let library = ModuleLibrary::standard();
        let inputs: Vec<String> = library
            .inputs("thermal_time_linear")
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(inputs, vec!["temp", "tbase"]);

        let outputs = library.outputs("ball_berry").unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].name, "leaf_stomatal_conductance");
        assert_eq!(outputs[0].unit, "mmol / m^2 / s");
    }

    #[test]
    fn unknown_module() {
        let library = ModuleLibrary::standard();
        match library.create("does_not_exist") {
            Err(CropError::UnknownModule { name }) => assert_eq!(name, "does_not_exist"),
            other => panic!("Expected UnknownModule, got {:?}", other),
        }
        assert!(library.inputs("does_not_exist").is_err());
        assert!(!library.contains("does_not_exist"));
    }

    #[test]
    fn custom_entries() {
        let mut library = ModuleLibrary::new();
        assert!(library.names().is_empty());

        library.insert("thermal_time", || Arc::new(ThermalTimeLinear::new()));
        let module = library.create("thermal_time").unwrap();
        assert_eq!(module.kind(), ModuleKind::Derivative);
        assert!(library.contains("thermal_time"));
    }

    #[test]
    fn modules_from_toml() {
        #[derive(Deserialize)]
        struct Document {
            modules: Vec<Box<dyn Module>>,
        }

        let document: Document = toml::from_str(
            r#"
            [[modules]]
            type = "BallBerry"

            [[modules]]
            type = "MultilayerCanopy"
            name = "three_layer_canopy"
            nlayers = 3
            light = { model = "SunlitShadedLight" }
            leaf = { model = "RectangularHyperbolaLeaf" }
            "#,
        )
        .unwrap();

        assert_eq!(document.modules[0].name(), "ball_berry");
        assert_eq!(document.modules[1].name(), "three_layer_canopy");
        assert_eq!(document.modules[1].outputs().len(), 2 * 3 * 3 + 1);
    }
}
