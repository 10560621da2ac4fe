//! Resolution of the module dependency graph.

use crate::errors::{CropError, CropResult};
use crate::module::{Module, ModuleKind};
use petgraph::algo::tarjan_scc;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

/// Type alias for a module wrapped in an Arc for shared ownership.
pub type M = Arc<dyn Module>;

/// Type alias for the module dependency graph.
///
/// Edges run from the producer of a quantity to each module that reads it
/// and are labelled with the quantity name.
pub type MGraph = Graph<M, String>;

/// Where the value of a quantity comes from during an evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Producer {
    /// Initial values, parameters, drivers or the simulated time
    External(&'static str),
    /// The direct module at this registration index
    Module(usize),
}

/// A quantity that is available before any module runs.
#[derive(Debug, Clone)]
pub(crate) struct ExternalQuantity {
    pub name: String,
    pub source: &'static str,
}

/// The result of resolving a set of modules.
#[derive(Debug)]
pub(crate) struct ResolvedGraph {
    pub graph: MGraph,
    /// Direct modules (by registration index) in evaluation order
    pub direct_order: Vec<usize>,
    /// Derivative modules (by registration index) in evaluation order
    pub derivative_order: Vec<usize>,
}

fn producer_label(producer: Producer, modules: &[M]) -> String {
    match producer {
        Producer::External(source) => source.to_string(),
        Producer::Module(index) => modules[index].name().to_string(),
    }
}

/// Build the dependency graph and compute a deterministic evaluation order.
///
/// `externals` are the quantities that exist before any module is evaluated.
/// `states` are the names of the quantities that are integrated over time.
///
/// Ties in the topological order are broken by registration order so that
/// repeated runs evaluate modules in the same sequence.
pub(crate) fn resolve(
    modules: &[M],
    externals: &[ExternalQuantity],
    states: &HashSet<String>,
) -> CropResult<ResolvedGraph> {
    let mut producers: HashMap<String, Producer> = HashMap::new();
    for external in externals {
        if let Some(existing) = producers.insert(
            external.name.clone(),
            Producer::External(external.source),
        ) {
            return Err(CropError::DuplicateOutput {
                quantity: external.name.clone(),
                first: producer_label(existing, modules),
                second: external.source.to_string(),
            });
        }
    }

    let mut graph: MGraph = Graph::new();
    let nodes: Vec<NodeIndex> = modules.iter().map(|m| graph.add_node(m.clone())).collect();

    // Register every producer before linking consumers, so that modules
    // may be registered in any order.
    let mut rate_producers: HashMap<String, usize> = HashMap::new();
    for (index, module) in modules.iter().enumerate() {
        let inputs = module.input_names();
        for output in module.output_names() {
            match module.kind() {
                ModuleKind::Direct => {
                    if inputs.contains(&output) {
                        return Err(CropError::CyclicDependency {
                            modules: vec![module.name().to_string()],
                        });
                    }
                    if let Some(existing) = producers.get(&output) {
                        return Err(CropError::DuplicateOutput {
                            quantity: output.clone(),
                            first: producer_label(*existing, modules),
                            second: module.name().to_string(),
                        });
                    }
                    producers.insert(output, Producer::Module(index));
                }
                ModuleKind::Derivative => {
                    if !states.contains(&output) {
                        return Err(CropError::UnknownStateQuantity {
                            module: module.name().to_string(),
                            quantity: output,
                        });
                    }
                    if let Some(existing) = rate_producers.get(&output) {
                        return Err(CropError::DuplicateOutput {
                            quantity: output.clone(),
                            first: modules[*existing].name().to_string(),
                            second: module.name().to_string(),
                        });
                    }
                    rate_producers.insert(output, index);
                }
            }
        }
    }

    for (index, module) in modules.iter().enumerate() {
        for input in module.input_names() {
            match producers.get(&input) {
                None => {
                    return Err(CropError::MissingInput {
                        module: module.name().to_string(),
                        quantity: input,
                    })
                }
                Some(Producer::External(_)) => {}
                Some(Producer::Module(producer)) => {
                    graph.add_edge(nodes[*producer], nodes[index], input);
                }
            }
        }
    }

    let order = topological_order(&graph).ok_or_else(|| CropError::CyclicDependency {
        modules: find_cycle(&graph),
    })?;

    let (direct_order, derivative_order): (Vec<usize>, Vec<usize>) = order
        .into_iter()
        .partition(|index| modules[*index].kind() == ModuleKind::Direct);

    Ok(ResolvedGraph {
        graph,
        direct_order,
        derivative_order,
    })
}

/// Kahn's algorithm, always taking the lowest available node index next.
///
/// Returns `None` if the graph contains a cycle.
fn topological_order(graph: &MGraph) -> Option<Vec<usize>> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.edges_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<usize>> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);
        for edge in graph.edges_directed(NodeIndex::new(index), Direction::Outgoing) {
            let target = edge.target().index();
            in_degree[target] -= 1;
            if in_degree[target] == 0 {
                ready.push(Reverse(target));
            }
        }
    }

    if order.len() == graph.node_count() {
        Some(order)
    } else {
        None
    }
}

/// Names of the modules forming the first cycle, in registration order.
fn find_cycle(graph: &MGraph) -> Vec<String> {
    let mut cycles: Vec<Vec<NodeIndex>> = tarjan_scc(graph)
        .into_iter()
        .filter(|component| component.len() > 1)
        .map(|mut component| {
            component.sort();
            component
        })
        .collect();
    cycles.sort();

    cycles
        .first()
        .map(|cycle| cycle.iter().map(|n| graph[*n].name().to_string()).collect())
        .unwrap_or_default()
}
