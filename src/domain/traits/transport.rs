use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use crate::application::errors::BotError;

/// Listener for inbound platform events
#[async_trait]
pub trait TransportListener: Send + Sync {
    async fn on_event(&self, event: Value) -> Result<(), BotError>;
}

struct FnListener<F>(F);

#[async_trait]
impl<F, Fut> TransportListener for FnListener<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    async fn on_event(&self, event: Value) -> Result<(), BotError> {
        (self.0)(event).await
    }
}

/// Wrap an async closure as a transport listener
pub fn listener_fn<F, Fut>(f: F) -> Arc<dyn TransportListener>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BotError>> + Send + 'static,
{
    Arc::new(FnListener(f))
}

/// A message posted through the transport
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutgoingMessage {
    pub channel: String,
    pub text: String,
    /// Reply inside this thread instead of the channel
    pub thread_ts: Option<String>,
    /// Also surface a threaded reply in the channel
    pub broadcast: bool,
}

impl OutgoingMessage {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn in_thread(mut self, thread_ts: Option<String>) -> Self {
        self.thread_ts = thread_ts;
        self
    }

    pub fn with_broadcast(mut self, broadcast: bool) -> Self {
        self.broadcast = broadcast;
        self
    }
}

/// Transport trait - abstraction for the chat platform connection
///
/// The core only registers listeners; event delivery, reconnects and the
/// wire protocol belong to the implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;

    /// Register a listener for one platform event type
    fn on(&self, event_type: &str, listener: Arc<dyn TransportListener>);

    /// Post a message, returning the platform message id
    async fn send_message(&self, message: OutgoingMessage) -> Result<String, BotError>;

    /// Begin delivering events; returns once the listener loop is running
    async fn start(&self) -> Result<(), BotError>;

    /// Stop delivering events
    async fn stop(&self);
}
