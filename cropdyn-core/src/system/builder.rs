//! System builder for constructing dynamical systems from modules.

use crate::errors::{CropError, CropResult};
use crate::module::Module;
use crate::store::{FloatValue, QuantityId, QuantityStore};
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;

use super::drivers::Drivers;
use super::resolve::{resolve, ExternalQuantity, M};
use super::runtime::DynamicalSystem;
use super::types::{BoundDerivative, BoundModule, StateVector, TimeSpan, TIME};

const SOURCE_INITIAL_VALUES: &str = "initial values";
const SOURCE_PARAMETERS: &str = "parameters";
const SOURCE_DRIVERS: &str = "drivers";
const SOURCE_TIME: &str = "simulated time";

/// Build a new dynamical system from a set of modules.
///
/// The builder resolves the dependencies between modules, validates that every input
/// can be satisfied and binds each module to the quantities it reads and writes.
/// All of this happens once, before any time stepping begins.
#[derive(Debug, Default)]
pub struct SystemBuilder {
    modules: Vec<M>,
    initial_values: Vec<(String, FloatValue)>,
    parameters: Vec<(String, FloatValue)>,
    drivers: Option<Drivers>,
    time_span: Option<TimeSpan>,
}

// Every name is unique once the graph has been resolved, so this only fails on a bug.
fn define(store: &mut QuantityStore, name: &str, value: FloatValue) -> CropResult<QuantityId> {
    store
        .define(name, value)
        .ok_or_else(|| CropError::Error(format!("quantity '{}' was defined twice", name)))
}

fn bind(store: &QuantityStore, names: Vec<String>) -> CropResult<Vec<QuantityId>> {
    names.iter().map(|name| store.id(name)).collect()
}

fn upsert(values: &mut Vec<(String, FloatValue)>, name: &str, value: FloatValue) {
    match values.iter_mut().find(|(n, _)| n == name) {
        Some(existing) => existing.1 = value,
        None => values.push((name.to_string(), value)),
    }
}

impl SystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module with the builder.
    ///
    /// Registration order is used to break ties in the evaluation order.
    pub fn with_module(&mut self, module: Arc<dyn Module>) -> &mut Self {
        self.modules.push(module);
        self
    }

    pub fn with_modules(&mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) -> &mut Self {
        self.modules.extend(modules);
        self
    }

    /// Adds a state quantity and its value at the start of the run.
    ///
    /// State quantities are integrated over time and appear in the state vector
    /// in the order they were added. Setting the same quantity twice replaces its value.
    pub fn with_initial_value(&mut self, name: &str, value: FloatValue) -> &mut Self {
        upsert(&mut self.initial_values, name, value);
        self
    }

    pub fn with_initial_values<K: AsRef<str>>(
        &mut self,
        values: impl IntoIterator<Item = (K, FloatValue)>,
    ) -> &mut Self {
        for (name, value) in values {
            upsert(&mut self.initial_values, name.as_ref(), value);
        }
        self
    }

    /// Adds a quantity that is constant for the whole run.
    pub fn with_parameter(&mut self, name: &str, value: FloatValue) -> &mut Self {
        upsert(&mut self.parameters, name, value);
        self
    }

    pub fn with_parameters<K: AsRef<str>>(
        &mut self,
        values: impl IntoIterator<Item = (K, FloatValue)>,
    ) -> &mut Self {
        for (name, value) in values {
            upsert(&mut self.parameters, name.as_ref(), value);
        }
        self
    }

    /// Supply time-varying quantities.
    ///
    /// If no time span is given, the run covers the full range of the drivers.
    pub fn with_drivers(&mut self, drivers: Drivers) -> &mut Self {
        self.drivers = Some(drivers);
        self
    }

    pub fn with_time_span(&mut self, time_span: TimeSpan) -> &mut Self {
        self.time_span = Some(time_span);
        self
    }

    fn externals(&self) -> Vec<ExternalQuantity> {
        let initial = self
            .initial_values
            .iter()
            .map(|(name, _)| (name.as_str(), SOURCE_INITIAL_VALUES));
        let parameters = self
            .parameters
            .iter()
            .map(|(name, _)| (name.as_str(), SOURCE_PARAMETERS));
        let drivers = self
            .drivers
            .iter()
            .flat_map(|d| d.names())
            .map(|name| (name, SOURCE_DRIVERS));

        std::iter::once((TIME, SOURCE_TIME))
            .chain(initial)
            .chain(parameters)
            .chain(drivers)
            .map(|(name, source)| ExternalQuantity {
                name: name.to_string(),
                source,
            })
            .collect()
    }

    fn resolve_time_span(&self) -> CropResult<TimeSpan> {
        let span = match (self.time_span, &self.drivers) {
            (Some(span), _) => span,
            (None, Some(drivers)) => TimeSpan::new(drivers.start(), drivers.end())?,
            (None, None) => {
                return Err(CropError::InvalidConfig(
                    "a time span is required when no drivers are supplied".to_string(),
                ))
            }
        };

        if let Some(drivers) = &self.drivers {
            if !drivers.is_empty() && (span.start < drivers.start() || span.end > drivers.end())
            {
                let quantity = drivers.names().next().unwrap_or(TIME).to_string();
                let time = if span.start < drivers.start() {
                    span.start
                } else {
                    span.end
                };
                return Err(CropError::ExtrapolationNotAllowed {
                    quantity,
                    time,
                    start: drivers.start(),
                    end: drivers.end(),
                });
            }
        }
        Ok(span)
    }

    /// Resolves the module graph and creates a concrete system.
    ///
    /// Returns an error if an input can not be satisfied, if the modules depend on each
    /// other cyclically or if a quantity would have more than one producer.
    pub fn build(&self) -> CropResult<DynamicalSystem> {
        let externals = self.externals();
        let states: HashSet<String> = self
            .initial_values
            .iter()
            .map(|(name, _)| name.clone())
            .collect();

        let resolved = resolve(&self.modules, &externals, &states)?;
        let time_span = self.resolve_time_span()?;

        let mut store = QuantityStore::new();
        let state_ids = self
            .initial_values
            .iter()
            .map(|(name, value)| define(&mut store, name, *value))
            .collect::<CropResult<Vec<QuantityId>>>()?;
        for (name, value) in &self.parameters {
            define(&mut store, name, *value)?;
        }
        let driver_ids = match &self.drivers {
            Some(drivers) => drivers
                .names()
                .map(|name| define(&mut store, name, FloatValue::NAN))
                .collect::<CropResult<Vec<QuantityId>>>()?,
            None => vec![],
        };
        let time_id = define(&mut store, TIME, time_span.start)?;

        // Module outputs are unknown until the first evaluation
        for &index in &resolved.direct_order {
            for output in self.modules[index].output_names() {
                define(&mut store, &output, FloatValue::NAN)?;
            }
        }

        let direct = resolved
            .direct_order
            .iter()
            .map(|&index| -> CropResult<BoundModule> {
                let module = self.modules[index].clone();
                Ok(BoundModule {
                    inputs: bind(&store, module.input_names())?,
                    outputs: bind(&store, module.output_names())?,
                    module,
                })
            })
            .collect::<CropResult<Vec<_>>>()?;

        let derivative = resolved
            .derivative_order
            .iter()
            .map(|&index| -> CropResult<BoundDerivative> {
                let module = self.modules[index].clone();
                let rates = module
                    .output_names()
                    .iter()
                    .map(|name| {
                        self.initial_values
                            .iter()
                            .position(|(state, _)| state == name)
                            .ok_or_else(|| CropError::UnknownStateQuantity {
                                module: module.name().to_string(),
                                quantity: name.clone(),
                            })
                    })
                    .collect::<CropResult<Vec<usize>>>()?;
                Ok(BoundDerivative {
                    inputs: bind(&store, module.input_names())?,
                    rates,
                    module,
                })
            })
            .collect::<CropResult<Vec<_>>>()?;

        let adaptive_compatible = !self.modules.iter().any(|m| m.requires_fixed_step());
        let initial_state = StateVector::from_iterator(
            self.initial_values.len(),
            self.initial_values.iter().map(|(_, value)| *value),
        );

        debug!(
            "Built system with {} states, {} direct and {} derivative modules",
            state_ids.len(),
            direct.len(),
            derivative.len()
        );

        Ok(DynamicalSystem::new(
            resolved.graph,
            store,
            direct,
            derivative,
            state_ids,
            initial_state,
            self.drivers.clone(),
            driver_ids,
            time_id,
            time_span,
            adaptive_compatible,
        ))
    }
}
