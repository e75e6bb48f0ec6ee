//! Admin dashboard surfaces contributed by plugins

pub mod registry;

pub use registry::{DashboardRegistrar, DashboardRegistry};
