use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::application::errors::BotError;

/// HTTP method of a registered route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request handed to a route handler
#[derive(Debug, Clone, Default)]
pub struct RouteRequest {
    pub path: String,
    pub query: BTreeMap<String, String>,
    pub form: BTreeMap<String, String>,
    pub body: serde_json::Value,
}

impl RouteRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(key.into(), value.into());
        self
    }
}

/// Response produced by a route handler
#[derive(Debug, Clone, PartialEq)]
pub struct RouteResponse {
    pub status: u16,
    pub body: serde_json::Value,
    pub location: Option<String>,
}

impl RouteResponse {
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body,
            location: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// 303 See Other, the post-redirect-get answer for admin forms
    pub fn redirect(location: impl Into<String>) -> Self {
        Self {
            status: 303,
            body: serde_json::Value::Null,
            location: Some(location.into()),
        }
    }
}

/// Route handler; the core never looks inside requests or responses
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn call(&self, request: RouteRequest) -> Result<RouteResponse, BotError>;
}

struct FnRoute<F>(F);

#[async_trait]
impl<F, Fut> RouteHandler for FnRoute<F>
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RouteResponse, BotError>> + Send + 'static,
{
    async fn call(&self, request: RouteRequest) -> Result<RouteResponse, BotError> {
        (self.0)(request).await
    }
}

/// Wrap an async closure as a route handler
pub fn route_fn<F, Fut>(f: F) -> Arc<dyn RouteHandler>
where
    F: Fn(RouteRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RouteResponse, BotError>> + Send + 'static,
{
    Arc::new(FnRoute(f))
}

/// Route registration API exposed by the HTTP collaborator
pub trait RouteRegistrar: Send + Sync {
    fn add_route(
        &self,
        method: Method,
        path: &str,
        handler: Arc<dyn RouteHandler>,
    ) -> Result<(), BotError>;
}
