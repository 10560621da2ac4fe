//! Dynamical system struct and evaluation of the module graph.

use crate::errors::{CropError, CropResult};
use crate::module::ModuleError;
use crate::store::{FloatValue, QuantityId, QuantityStore, Snapshot, Time};
use petgraph::dot::{Config, Dot};

use super::drivers::Drivers;
use super::resolve::{MGraph, M};
use super::types::{BoundDerivative, BoundModule, StateVector, TimeSpan};

/// A resolved set of modules that produces the derivative of its state at any simulated time.
///
/// The system owns its quantity store.
/// Every call to [`DynamicalSystem::derivatives`] writes the state, the simulated time
/// and the interpolated drivers into the store, evaluates the direct modules in dependency
/// order and then gathers the rates produced by the derivative modules.
///
/// For example, a leaf temperature module may require the stomatal conductance as an input.
/// If the system also contains a conductance module, the conductance is computed first on
/// every evaluation. If not, the conductance must be supplied as a parameter or driver.
#[derive(Debug)]
pub struct DynamicalSystem {
    /// A directed graph with modules as nodes and the edges labelled with the quantities
    /// passed between them.
    graph: MGraph,
    store: QuantityStore,
    /// Direct modules in evaluation order
    direct: Vec<BoundModule>,
    derivative: Vec<BoundDerivative>,
    state_ids: Vec<QuantityId>,
    initial_state: StateVector,
    drivers: Option<Drivers>,
    driver_ids: Vec<QuantityId>,
    driver_values: Vec<FloatValue>,
    time_id: QuantityId,
    time_span: TimeSpan,
    /// Number of calls to `derivatives` since the counter was last reset
    ncalls: usize,
    adaptive_compatible: bool,
    input_buffer: Vec<FloatValue>,
    output_buffer: Vec<FloatValue>,
}

/// Evaluate a single module against the store.
///
/// The outputs are left in `outputs` for the caller to scatter.
#[allow(clippy::too_many_arguments)]
fn evaluate_module(
    module: &M,
    input_ids: &[QuantityId],
    n_outputs: usize,
    store: &QuantityStore,
    inputs: &mut Vec<FloatValue>,
    outputs: &mut Vec<FloatValue>,
    time: Time,
    evaluations: usize,
) -> CropResult<()> {
    inputs.clear();
    inputs.extend(input_ids.iter().map(|id| store.value(*id)));
    outputs.clear();
    outputs.resize(n_outputs, FloatValue::NAN);

    let wrap = |source: ModuleError| CropError::Computation {
        module: module.name().to_string(),
        time,
        evaluations,
        source,
    };

    module.evaluate(inputs, outputs).map_err(wrap)?;

    if let Some(position) = outputs.iter().position(|v| !v.is_finite()) {
        let quantity = module
            .output_names()
            .get(position)
            .cloned()
            .unwrap_or_else(|| format!("output {}", position));
        return Err(wrap(ModuleError::NonFiniteOutput {
            quantity,
            value: outputs[position],
        }));
    }
    Ok(())
}

impl DynamicalSystem {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        graph: MGraph,
        store: QuantityStore,
        direct: Vec<BoundModule>,
        derivative: Vec<BoundDerivative>,
        state_ids: Vec<QuantityId>,
        initial_state: StateVector,
        drivers: Option<Drivers>,
        driver_ids: Vec<QuantityId>,
        time_id: QuantityId,
        time_span: TimeSpan,
        adaptive_compatible: bool,
    ) -> Self {
        let driver_values = vec![FloatValue::NAN; driver_ids.len()];
        Self {
            graph,
            store,
            direct,
            derivative,
            state_ids,
            initial_state,
            drivers,
            driver_ids,
            driver_values,
            time_id,
            time_span,
            ncalls: 0,
            adaptive_compatible,
            input_buffer: vec![],
            output_buffer: vec![],
        }
    }

    /// Write the state, the simulated time and the drivers into the store.
    fn load(&mut self, state: &StateVector, time: Time) -> CropResult<()> {
        if state.len() != self.state_ids.len() {
            return Err(CropError::Error(format!(
                "expected a state vector of length {}, got {}",
                self.state_ids.len(),
                state.len()
            )));
        }
        for (id, value) in self.state_ids.iter().zip(state.iter()) {
            self.store.set_value(*id, *value);
        }
        self.store.set_value(self.time_id, time);

        if let Some(drivers) = &self.drivers {
            drivers.interpolate_into(time, &mut self.driver_values)?;
            for (id, value) in self.driver_ids.iter().zip(&self.driver_values) {
                self.store.set_value(*id, *value);
            }
        }
        Ok(())
    }

    /// Run every direct module in dependency order.
    fn run_direct(&mut self, time: Time) -> CropResult<()> {
        for bound in &self.direct {
            evaluate_module(
                &bound.module,
                &bound.inputs,
                bound.outputs.len(),
                &self.store,
                &mut self.input_buffer,
                &mut self.output_buffer,
                time,
                self.ncalls,
            )?;
            for (id, value) in bound.outputs.iter().zip(&self.output_buffer) {
                self.store.set_value(*id, *value);
            }
        }
        Ok(())
    }

    /// Calculate the derivative of the state at the given simulated time.
    ///
    /// Each call counts as one evaluation, including calls that fail.
    pub fn derivatives(&mut self, state: &StateVector, time: Time) -> CropResult<StateVector> {
        self.ncalls += 1;
        self.load(state, time)?;
        self.run_direct(time)?;

        // States without a derivative module do not change
        let mut rates = StateVector::zeros(self.state_ids.len());
        for bound in &self.derivative {
            evaluate_module(
                &bound.module,
                &bound.inputs,
                bound.rates.len(),
                &self.store,
                &mut self.input_buffer,
                &mut self.output_buffer,
                time,
                self.ncalls,
            )?;
            for (position, value) in bound.rates.iter().zip(&self.output_buffer) {
                rates[*position] = *value;
            }
        }
        Ok(rates)
    }

    /// Refresh every quantity in the store for the given state and time.
    ///
    /// Unlike [`DynamicalSystem::derivatives`] this is not counted as an evaluation.
    /// Solvers use it so that recorded auxiliary quantities match the recorded state.
    pub fn update(&mut self, state: &StateVector, time: Time) -> CropResult<()> {
        self.load(state, time)?;
        self.run_direct(time)
    }

    /// Update the store and take a copy of every quantity.
    pub fn snapshot(&mut self, state: &StateVector, time: Time) -> CropResult<Snapshot> {
        self.update(state, time)?;
        Ok(self.store.snapshot())
    }

    pub fn reset_call_count(&mut self) {
        self.ncalls = 0;
    }

    /// Number of evaluations since the last reset.
    pub fn call_count(&self) -> usize {
        self.ncalls
    }

    /// Whether an adaptive solver may evaluate this system at arbitrary times.
    pub fn is_adaptive_compatible(&self) -> bool {
        self.adaptive_compatible
    }

    pub fn initial_state(&self) -> &StateVector {
        &self.initial_state
    }

    pub fn state_names(&self) -> Vec<String> {
        self.state_ids
            .iter()
            .map(|id| self.store.names()[id.index()].clone())
            .collect()
    }

    /// Names of the modules in the order they are evaluated.
    ///
    /// Direct modules come first, followed by the derivative modules.
    pub fn evaluation_order(&self) -> Vec<String> {
        self.direct
            .iter()
            .map(|b| &b.module)
            .chain(self.derivative.iter().map(|b| &b.module))
            .map(|m| m.name().to_string())
            .collect()
    }

    pub fn time_span(&self) -> TimeSpan {
        self.time_span
    }

    pub fn store(&self) -> &QuantityStore {
        &self.store
    }

    /// Create a diagram that represents the module graph.
    ///
    /// Useful for debugging.
    pub fn as_dot(&self) -> Dot<'_, &MGraph> {
        Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = {:?}", er.weight()),
            &|_, (_, module)| format!("label = {:?}", module.name()),
        )
    }
}
