//! Plugin trait and the context handed to every hook

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::application::dashboard::{DashboardRegistrar, DashboardRegistry};
use crate::application::errors::BotError;
use crate::application::events::EventRouter;
use crate::application::services::supervisor::{ShutdownSignal, TaskSupervisor};
use crate::domain::traits::{RouteRegistrar, Store, Transport};
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::NamespacedStore;

/// Core plugin trait that all plugins must implement
///
/// Every hook is optional. Hooks run in a fixed order: `register` for all
/// plugins, then `register_routes` for all, then `on_startup` for all. On
/// shutdown `on_shutdown` runs in reverse startup order.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Stable identifier, also the default storage namespace
    fn key(&self) -> &str;

    /// Human-readable name
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn version(&self) -> &str {
        "0.1.0"
    }

    /// Loaded when no allow-list is configured
    fn enabled_by_default(&self) -> bool {
        true
    }

    /// Subscribe to events, add transport listeners and dashboard tabs
    async fn register(&self, _ctx: &PluginContext) -> Result<(), BotError> {
        Ok(())
    }

    /// Add admin HTTP routes
    async fn register_routes(&self, _ctx: &PluginContext) -> Result<(), BotError> {
        Ok(())
    }

    /// Asynchronous initialisation, e.g. spawning background pollers
    async fn on_startup(&self, _ctx: &PluginContext) -> Result<(), BotError> {
        Ok(())
    }

    async fn on_shutdown(&self, _ctx: &PluginContext) -> Result<(), BotError> {
        Ok(())
    }
}

/// Collaborator handles built once per process
pub struct SharedContext {
    pub config: Arc<Config>,
    pub storage: Arc<dyn Store>,
    pub events: Arc<EventRouter>,
    pub dashboard: Arc<DashboardRegistry>,
    pub transport: Arc<dyn Transport>,
    pub routes: Arc<dyn RouteRegistrar>,
    pub tasks: Arc<TaskSupervisor>,
}

/// One plugin's view of the shared context
///
/// The handles are shared; the view only carries the owning plugin key.
#[derive(Clone)]
pub struct PluginContext {
    key: String,
    shared: Arc<SharedContext>,
}

impl PluginContext {
    pub fn new(key: impl Into<String>, shared: Arc<SharedContext>) -> Self {
        Self {
            key: key.into(),
            shared,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Raw store; callers pick the namespace
    pub fn storage(&self) -> &Arc<dyn Store> {
        &self.shared.storage
    }

    /// Store bound to this plugin's own namespace
    pub fn store(&self) -> NamespacedStore {
        NamespacedStore::new(Arc::clone(&self.shared.storage), self.key.clone())
    }

    pub fn events(&self) -> &Arc<EventRouter> {
        &self.shared.events
    }

    pub fn dashboard(&self) -> DashboardRegistrar<'_> {
        self.shared.dashboard.for_owner(&self.key)
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.shared.transport
    }

    pub fn routes(&self) -> &dyn RouteRegistrar {
        self.shared.routes.as_ref()
    }

    /// Run background work under supervision; it is stopped at shutdown
    pub fn spawn<F>(&self, name: &str, task: F)
    where
        F: Future<Output = Result<(), BotError>> + Send + 'static,
    {
        self.shared.tasks.spawn(&self.key, name, task);
    }

    /// Resolves once the host starts shutting down
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shared.tasks.signal()
    }

    /// Span every log line of this plugin should live in
    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("plugin", key = %self.key)
    }
}
