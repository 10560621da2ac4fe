pub mod errors;
#[cfg(test)]
mod example_modules;
pub mod integrator;
pub mod module;
pub mod record;
pub mod solvers;
pub mod store;
pub mod system;

// Re-export derive macro for convenience
pub use cropdyn_macros::ModuleIO;
