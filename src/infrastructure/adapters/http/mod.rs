//! In-process route table standing in for the HTTP server
//!
//! Plugins register routes here during the routes stage. The server in
//! front of it (or a test) calls [`RouteTable::dispatch`].

use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::application::errors::BotError;
use crate::domain::traits::{Method, RouteHandler, RouteRegistrar, RouteRequest, RouteResponse};

pub struct RouteTable {
    routes: RwLock<BTreeMap<(Method, String), Arc<dyn RouteHandler>>>,
    accepting: AtomicBool,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(BTreeMap::new()),
            accepting: AtomicBool::new(true),
        }
    }

    /// Registered routes, sorted by method then path
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.routes
            .read()
            .map(|r| r.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stop serving; later requests get 503
    pub fn close(&self) {
        self.accepting.store(false, Ordering::SeqCst);
    }

    pub async fn dispatch(
        &self,
        method: Method,
        request: RouteRequest,
    ) -> Result<RouteResponse, BotError> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Ok(RouteResponse::json(json!({"detail": "Shutting down"})).with_status(503));
        }

        let handler = self
            .routes
            .read()
            .map_err(|_| BotError::Route("Lock poisoned".to_string()))?
            .get(&(method, request.path.clone()))
            .cloned();

        match handler {
            Some(handler) => handler.call(request).await,
            None => Ok(RouteResponse::json(json!({"detail": "Not found"})).with_status(404)),
        }
    }
}

impl RouteRegistrar for RouteTable {
    fn add_route(
        &self,
        method: Method,
        path: &str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<(), BotError> {
        if !path.starts_with('/') {
            return Err(BotError::Route(format!("Route path must start with '/': {}", path)));
        }

        let mut routes = self
            .routes
            .write()
            .map_err(|_| BotError::Route("Lock poisoned".to_string()))?;
        let key = (method, path.to_string());
        if routes.contains_key(&key) {
            return Err(BotError::Route(format!("Route {} {} already registered", method, path)));
        }
        tracing::debug!("Route added: {} {}", method, path);
        routes.insert(key, handler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::traits::route_fn;

    #[tokio::test]
    async fn test_dispatch_to_registered_route() {
        let table = RouteTable::new();
        table
            .add_route(
                Method::Post,
                "/admin/echo",
                route_fn(|req: RouteRequest| async move {
                    Ok(RouteResponse::json(json!({"name": req.form.get("name")})))
                }),
            )
            .unwrap();

        let response = table
            .dispatch(Method::Post, RouteRequest::new("/admin/echo").with_form("name", "ada"))
            .await
            .unwrap();
        assert_eq!(response.body, json!({"name": "ada"}));

        let missing = table.dispatch(Method::Get, RouteRequest::new("/admin/echo")).await.unwrap();
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn test_duplicate_and_malformed_routes_rejected() {
        let table = RouteTable::new();
        let handler = route_fn(|_req: RouteRequest| async { Ok(RouteResponse::json(json!({}))) });

        table.add_route(Method::Get, "/health", Arc::clone(&handler)).unwrap();
        assert!(table.add_route(Method::Get, "/health", Arc::clone(&handler)).is_err());
        assert!(table.add_route(Method::Get, "health", Arc::clone(&handler)).is_err());
        table.add_route(Method::Post, "/health", handler).unwrap();
        assert_eq!(table.routes().len(), 2);
    }

    #[tokio::test]
    async fn test_closed_table_refuses_requests() {
        let table = RouteTable::new();
        table
            .add_route(
                Method::Get,
                "/health",
                route_fn(|_req: RouteRequest| async { Ok(RouteResponse::json(json!({"ok": true}))) }),
            )
            .unwrap();
        table.close();
        let response = table.dispatch(Method::Get, RouteRequest::new("/health")).await.unwrap();
        assert_eq!(response.status, 503);
    }
}
