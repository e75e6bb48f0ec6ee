//! Domain entities - Core business objects with no external dependencies

pub mod event;
pub mod plugin;
pub mod tab;

pub use event::Event;
pub use plugin::{LifecycleStage, PluginState, PluginSummary};
pub use tab::{DashboardTab, ResolvedTab, TabMetadata, DEFAULT_TAB_ORDER};
