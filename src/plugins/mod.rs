//! Plugin system
//!
//! Plugins are compiled in and listed in a [`PluginCatalog`]; the
//! [`PluginManager`] selects them from configuration and drives their
//! lifecycle.

pub mod catalog;
pub mod hello;
pub mod manager;
pub mod trait_def;

pub use catalog::{PluginCatalog, PluginFactory};
pub use manager::{LifecycleOptions, PluginManager};
pub use trait_def::{Plugin, PluginContext, SharedContext};
