use super::{Auto, Euler, Rk4, Rkck54, Rosenbrock, SolverConfig, SystemSolver};
use crate::errors::{CropError, CropResult};
use std::collections::BTreeMap;

/// Creates a solver from its configuration.
pub type SolverConstructor = fn(SolverConfig) -> Box<dyn SystemSolver>;

/// A table of solvers that can be selected by name.
///
/// The registry starts empty; [`SolverRegistry::with_defaults`] adds the built in solvers.
/// Lookups never substitute a default for an unknown name.
#[derive(Debug, Clone, Default)]
pub struct SolverRegistry {
    constructors: BTreeMap<String, SolverConstructor>,
}

impl SolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry containing `euler`, `rk4`, `rkck54`, `rosenbrock` and `auto`.
    pub fn with_defaults() -> Self {
        let defaults: [(&str, SolverConstructor); 5] = [
            (Euler::NAME, |config| Box::new(Euler::new(config))),
            (Rk4::NAME, |config| Box::new(Rk4::new(config))),
            (Rkck54::NAME, |config| Box::new(Rkck54::new(config))),
            (Rosenbrock::NAME, |config| Box::new(Rosenbrock::new(config))),
            (Auto::NAME, |config| Box::new(Auto::new(config))),
        ];
        Self {
            constructors: defaults
                .into_iter()
                .map(|(name, constructor)| (name.to_string(), constructor))
                .collect(),
        }
    }

    /// Add a solver under a new name.
    ///
    /// Existing entries are never replaced.
    pub fn register(&mut self, name: &str, constructor: SolverConstructor) -> CropResult<()> {
        if self.constructors.contains_key(name) {
            return Err(CropError::DuplicateSolver(name.to_string()));
        }
        self.constructors.insert(name.to_string(), constructor);
        Ok(())
    }

    /// Construct the solver registered under `name`.
    pub fn create(&self, name: &str, config: SolverConfig) -> CropResult<Box<dyn SystemSolver>> {
        let constructor = self
            .constructors
            .get(name)
            .ok_or_else(|| CropError::UnknownSolver {
                name: name.to_string(),
                available: self.names(),
            })?;
        config.validate()?;
        Ok(constructor(config))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }
}
