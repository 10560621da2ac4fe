//! Crop growth modules for use with `cropdyn-core`
//!
//! Each module is a stateless function of named quantities.
//! Modules can be constructed directly or looked up by name through the [`library::ModuleLibrary`].
pub mod library;
pub mod modules;
