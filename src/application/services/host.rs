//! Bot host - builds the collaborators and drives the plugin lifecycle
//!
//! Startup: storage, then plugin registration, routes and startup hooks,
//! then the transport. Shutdown walks the same path backwards.

use serde_json::json;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::dashboard::DashboardRegistry;
use crate::application::errors::BotError;
use crate::application::events::EventRouter;
use crate::application::services::supervisor::TaskSupervisor;
use crate::domain::entities::{PluginSummary, TabMetadata};
use crate::domain::traits::{route_fn, Method, RouteRegistrar, RouteRequest, RouteResponse, Store, Transport};
use crate::infrastructure::adapters::RouteTable;
use crate::infrastructure::config::Config;
use crate::infrastructure::storage::StorageBackend;
use crate::plugins::catalog::PluginCatalog;
use crate::plugins::manager::{LifecycleOptions, PluginBoard, PluginManager};
use crate::plugins::trait_def::SharedContext;

/// Owner recorded for the host's own dashboard namespace
pub const HOST_OWNER: &str = "host";

pub struct BotHost {
    shared: Arc<SharedContext>,
    manager: PluginManager,
    routes: Arc<RouteTable>,
    ready: Arc<AtomicBool>,
}

impl BotHost {
    /// Connect storage, wire collaborators and load the configured plugins.
    ///
    /// Every error here is fatal: nothing has been registered yet.
    pub async fn build(
        config: Config,
        catalog: &PluginCatalog,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, BotError> {
        config.validate()?;

        let backend = StorageBackend::resolve(&config.storage)?;
        let storage = backend.connect(&config.storage.retry()).await?;
        info!(
            "Storage backend: {} (durable: {})",
            storage.backend_name(),
            storage.is_durable()
        );

        let config = Arc::new(config);
        let routes = Arc::new(RouteTable::new());
        let shared = Arc::new(SharedContext {
            config: Arc::clone(&config),
            storage,
            events: Arc::new(EventRouter::new()),
            dashboard: Arc::new(DashboardRegistry::new()),
            transport,
            routes: Arc::clone(&routes) as Arc<dyn RouteRegistrar>,
            tasks: Arc::new(TaskSupervisor::new()),
        });

        let options = LifecycleOptions {
            hook_timeout: config.lifecycle.hook_timeout(),
        };
        let mut manager = PluginManager::new(Arc::clone(&shared), options);
        let ready = Arc::new(AtomicBool::new(false));

        register_host_surfaces(&shared, &routes, manager.board(), &ready)?;

        let count = manager.load(catalog, &config.plugins.sources, &config.plugins.enabled)?;
        info!("{} plugin(s) selected for loading", count);

        Ok(Self {
            shared,
            manager,
            routes,
            ready,
        })
    }

    /// Run the plugin lifecycle up to `Started`, then connect the transport
    pub async fn start(&mut self) -> Result<(), BotError> {
        self.manager.start().await?;
        self.shared.transport.start().await?;
        self.ready.store(true, Ordering::SeqCst);
        info!(
            "{} is ready via {} transport",
            self.shared.config.bot.name,
            self.shared.transport.name()
        );
        Ok(())
    }

    /// Stop intake, drain work in flight, then stop plugins and storage
    pub async fn shutdown(&mut self) {
        info!("Shutting down...");
        self.ready.store(false, Ordering::SeqCst);
        self.shared.transport.stop().await;
        self.routes.close();

        let lifecycle = &self.shared.config.lifecycle;
        if !self.shared.events.drain(lifecycle.drain_grace()).await {
            warn!(
                "{} event dispatch(es) still running after {:?}",
                self.shared.events.in_flight(),
                lifecycle.drain_grace()
            );
        }

        let aborted = self.shared.tasks.shutdown(lifecycle.task_grace()).await;
        if aborted > 0 {
            warn!("Aborted {} background task(s)", aborted);
        }

        self.manager.shutdown().await;

        if let Err(e) = self.shared.storage.close().await {
            warn!("Failed to close storage: {}", e);
        }
        info!("Shutdown complete");
    }

    /// Start, wait for `signal`, then shut down.
    ///
    /// A failed start still runs shutdown so started plugins get their hook.
    pub async fn run_until<F>(&mut self, signal: F) -> Result<(), BotError>
    where
        F: Future<Output = ()>,
    {
        if let Err(e) = self.start().await {
            self.shutdown().await;
            return Err(e);
        }
        signal.await;
        self.shutdown().await;
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn plugins(&self) -> Vec<PluginSummary> {
        self.manager.plugins()
    }

    pub fn manager(&self) -> &PluginManager {
        &self.manager
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn events(&self) -> &Arc<EventRouter> {
        &self.shared.events
    }

    pub fn dashboard(&self) -> &Arc<DashboardRegistry> {
        &self.shared.dashboard
    }

    pub fn storage(&self) -> &Arc<dyn Store> {
        &self.shared.storage
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }
}

/// Health check, admin index and the overview tab owned by the host
fn register_host_surfaces(
    shared: &Arc<SharedContext>,
    routes: &RouteTable,
    board: PluginBoard,
    ready: &Arc<AtomicBool>,
) -> Result<(), BotError> {
    let dashboard = shared.dashboard.for_owner(HOST_OWNER);
    dashboard.register_tab(
        "host",
        "overview",
        TabMetadata::new("Overview", "main.html")
            .with_description("Loaded plugins and host status")
            .with_icon("home")
            .with_order(0),
    )?;

    let template_root = &shared.config.dashboard.template_root;
    if template_root.is_dir() {
        dashboard.add_template_dir("host", template_root)?;
    } else {
        warn!(
            "Dashboard template root {} not found; host pages will not render",
            template_root.display()
        );
    }

    let ready_flag = Arc::clone(ready);
    routes.add_route(
        Method::Get,
        "/health",
        route_fn(move |_req: RouteRequest| {
            let ok = ready_flag.load(Ordering::SeqCst);
            async move {
                let response = RouteResponse::json(json!({ "ok": ok }));
                Ok(if ok { response } else { response.with_status(503) })
            }
        }),
    )?;

    let registry = Arc::clone(&shared.dashboard);
    routes.add_route(
        Method::Get,
        "/admin",
        route_fn(move |_req: RouteRequest| {
            let tabs = registry.tabs();
            async move {
                let active = tabs.first().map(|t| t.slug());
                Ok(RouteResponse::json(json!({ "tabs": tabs, "active": active })))
            }
        }),
    )?;

    let events = Arc::clone(&shared.events);
    let storage = Arc::clone(&shared.storage);
    routes.add_route(
        Method::Get,
        "/admin/tabs/host/overview",
        route_fn(move |_req: RouteRequest| {
            let plugins = board.read().map(|b| b.clone()).unwrap_or_default();
            let body = json!({
                "plugins": plugins,
                "topics": events.topics(),
                "storage": {
                    "backend": storage.backend_name(),
                    "durable": storage.is_durable(),
                },
            });
            async move { Ok(RouteResponse::json(body)) }
        }),
    )?;

    Ok(())
}
