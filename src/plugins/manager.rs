//! Plugin manager - handles plugin lifecycle
//!
//! `Discovered → Registered → RoutesBound → Started → Stopped`. Each stage
//! runs for every eligible plugin before the next stage begins. A plugin
//! whose hook fails is marked `Failed` and skipped from then on.

use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

use super::catalog::{filter_enabled, DiscoveredPlugin, PluginCatalog};
use super::trait_def::{Plugin, PluginContext, SharedContext};
use crate::application::errors::{BotError, ConfigError, PluginError};
use crate::domain::entities::{LifecycleStage, PluginState, PluginSummary};

/// Timing knobs for the lifecycle
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Upper bound for each shutdown hook
    pub hook_timeout: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            hook_timeout: Duration::from_secs(5),
        }
    }
}

struct ManagedPlugin {
    plugin: Box<dyn Plugin>,
    source: String,
    state: PluginState,
    ctx: PluginContext,
}

impl ManagedPlugin {
    fn key(&self) -> &str {
        self.plugin.key()
    }

    fn summary(&self) -> PluginSummary {
        PluginSummary {
            key: self.plugin.key().to_string(),
            name: self.plugin.name().to_string(),
            description: self.plugin.description().to_string(),
            version: self.plugin.version().to_string(),
            source: self.source.clone(),
            state: self.state,
        }
    }
}

/// Shared, read-only snapshot of plugin states for admin views
pub type PluginBoard = Arc<RwLock<Vec<PluginSummary>>>;

/// Manages all plugins for the bot
pub struct PluginManager {
    plugins: Vec<ManagedPlugin>,
    started: Vec<usize>,
    shared: Arc<SharedContext>,
    options: LifecycleOptions,
    board: PluginBoard,
}

impl PluginManager {
    pub fn new(shared: Arc<SharedContext>, options: LifecycleOptions) -> Self {
        Self {
            plugins: Vec::new(),
            started: Vec::new(),
            shared,
            options,
            board: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Discover and filter plugins. Nothing is registered on error.
    pub fn load(
        &mut self,
        catalog: &PluginCatalog,
        sources: &[String],
        enabled: &[String],
    ) -> Result<usize, ConfigError> {
        let discovered = catalog.discover(sources)?;
        let included = filter_enabled(discovered, enabled)?;

        for DiscoveredPlugin { source, unit, plugin } in included {
            info!(
                "Loaded plugin {} ({}) from {}/{}",
                plugin.key(),
                plugin.name(),
                source,
                unit
            );
            let ctx = PluginContext::new(plugin.key(), Arc::clone(&self.shared));
            self.plugins.push(ManagedPlugin {
                plugin,
                source,
                state: PluginState::Discovered,
                ctx,
            });
        }

        self.refresh_board();
        Ok(self.plugins.len())
    }

    /// Run `Register`, `RoutesBound` and `Started` in order.
    ///
    /// Only configuration problems abort; hook failures are isolated to
    /// the plugin that raised them. Namespace collisions are checked after
    /// every stage that may register dashboard surfaces.
    pub async fn start(&mut self) -> Result<(), ConfigError> {
        self.register_all().await?;
        self.bind_routes().await;
        self.shared.dashboard.check_collisions()?;
        self.startup().await;
        Ok(())
    }

    pub async fn register_all(&mut self) -> Result<(), ConfigError> {
        for i in 0..self.plugins.len() {
            self.run_stage(i, LifecycleStage::Register).await;
        }
        self.refresh_board();
        self.shared.dashboard.check_collisions()
    }

    pub async fn bind_routes(&mut self) {
        for i in 0..self.plugins.len() {
            self.run_stage(i, LifecycleStage::RoutesBound).await;
        }
        self.refresh_board();
    }

    pub async fn startup(&mut self) {
        for i in 0..self.plugins.len() {
            if self.run_stage(i, LifecycleStage::Started).await {
                self.started.push(i);
            }
        }
        self.refresh_board();

        let failed = self.plugins.iter().filter(|p| p.state.is_failed()).count();
        info!(
            "Plugin startup complete: {} started, {} failed",
            self.started.len(),
            failed
        );
    }

    /// Run shutdown hooks in reverse startup order, each bounded by the
    /// hook timeout. A slow or failing hook never holds up the others.
    pub async fn shutdown(&mut self) {
        let timeout = self.options.hook_timeout;
        let started = std::mem::take(&mut self.started);

        for &i in started.iter().rev() {
            let managed = &mut self.plugins[i];
            let key = managed.key().to_string();
            debug!("Shutting down plugin {}", key);

            let hook = managed.plugin.on_shutdown(&managed.ctx);
            let outcome = tokio::time::timeout(timeout, hook.instrument(managed.ctx.span())).await;

            let next = match outcome {
                Ok(Ok(())) => PluginState::Stopped,
                Ok(Err(e)) => {
                    error!("{}", hook_error(&key, LifecycleStage::Stopped, &e));
                    PluginState::Failed(LifecycleStage::Stopped)
                }
                Err(_) => {
                    warn!(
                        "{}; abandoning it",
                        PluginError::Timeout {
                            key: key.clone(),
                            stage: LifecycleStage::Stopped,
                            timeout,
                        }
                    );
                    PluginState::Failed(LifecycleStage::Stopped)
                }
            };
            if let Err(e) = transition(managed, next) {
                error!("{}", e);
            }
        }

        self.refresh_board();
    }

    /// Run one hook for plugin `i` if it is eligible. Returns true on success.
    async fn run_stage(&mut self, i: usize, stage: LifecycleStage) -> bool {
        let managed = &mut self.plugins[i];
        let (eligible, reached) = match stage {
            LifecycleStage::Register => (PluginState::Discovered, PluginState::Registered),
            LifecycleStage::RoutesBound => (PluginState::Registered, PluginState::RoutesBound),
            LifecycleStage::Started => (PluginState::RoutesBound, PluginState::Started),
            LifecycleStage::Stopped => return false,
        };
        if managed.state != eligible {
            return false;
        }

        let key = managed.key().to_string();
        debug!("Running {} hook of plugin {}", stage, key);
        let span = managed.ctx.span();
        let result = {
            let ctx = &managed.ctx;
            let plugin = &managed.plugin;
            match stage {
                LifecycleStage::Register => plugin.register(ctx).instrument(span).await,
                LifecycleStage::RoutesBound => plugin.register_routes(ctx).instrument(span).await,
                _ => plugin.on_startup(ctx).instrument(span).await,
            }
        };

        let (next, ok) = match result {
            Ok(()) => (reached, true),
            Err(e) => {
                error!("{}", hook_error(&key, stage, &e));
                (PluginState::Failed(stage), false)
            }
        };
        match transition(managed, next) {
            Ok(()) => ok,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }

    fn refresh_board(&self) {
        let summaries = self.plugins();
        let mut board = self.board.write().unwrap_or_else(|p| p.into_inner());
        *board = summaries;
    }

    /// Plugin information for listing, in load order
    pub fn plugins(&self) -> Vec<PluginSummary> {
        self.plugins.iter().map(ManagedPlugin::summary).collect()
    }

    /// Live view of plugin states, shared with admin handlers
    pub fn board(&self) -> PluginBoard {
        Arc::clone(&self.board)
    }

    pub fn state(&self, key: &str) -> Option<PluginState> {
        self.plugins.iter().find(|p| p.key() == key).map(|p| p.state)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

fn hook_error(key: &str, stage: LifecycleStage, error: &BotError) -> PluginError {
    PluginError::Hook {
        key: key.to_string(),
        stage,
        message: error.to_string(),
    }
}

fn transition(managed: &mut ManagedPlugin, next: PluginState) -> Result<(), PluginError> {
    if !managed.state.can_advance_to(next) {
        return Err(PluginError::InvalidTransition {
            key: managed.key().to_string(),
            from: managed.state.to_string(),
            to: next.to_string(),
        });
    }
    managed.state = next;
    Ok(())
}
