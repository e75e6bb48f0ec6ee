//! Console transport for development/testing
//!
//! Every stdin line becomes a `message` event. Replies are printed.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

use crate::application::errors::BotError;
use crate::domain::traits::{OutgoingMessage, Transport, TransportListener};

type Listeners = RwLock<HashMap<String, Vec<Arc<dyn TransportListener>>>>;

/// Console transport for local development
pub struct ConsoleTransport {
    listeners: Arc<Listeners>,
    read_stdin: bool,
    reader: Mutex<Option<JoinHandle<()>>>,
    sent: AtomicU64,
    outbox: Mutex<Vec<OutgoingMessage>>,
}

impl Default for ConsoleTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleTransport {
    /// Transport fed from stdin
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(HashMap::new())),
            read_stdin: true,
            reader: Mutex::new(None),
            sent: AtomicU64::new(0),
            outbox: Mutex::new(Vec::new()),
        }
    }

    /// Transport that only delivers what is passed to [`emit`](Self::emit)
    pub fn detached() -> Self {
        Self {
            read_stdin: false,
            ..Self::new()
        }
    }

    /// Build the event a typed console line turns into
    pub fn message_event(text: &str) -> Value {
        json!({
            "type": "message",
            "channel": "console",
            "user": "console",
            "text": text,
            "ts": chrono::Utc::now().timestamp_millis().to_string(),
        })
    }

    /// Forward an event to every listener of `event_type`, unchanged
    pub async fn emit(&self, event_type: &str, event: Value) -> usize {
        dispatch(&self.listeners, event_type, event).await
    }

    /// Messages posted so far, oldest first
    pub fn sent_messages(&self) -> Vec<OutgoingMessage> {
        self.outbox.lock().map(|o| o.clone()).unwrap_or_default()
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .read()
            .map(|l| l.get(event_type).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }
}

async fn dispatch(listeners: &Listeners, event_type: &str, event: Value) -> usize {
    let targets: Vec<Arc<dyn TransportListener>> = listeners
        .read()
        .map(|l| l.get(event_type).cloned().unwrap_or_default())
        .unwrap_or_default();

    for listener in &targets {
        if let Err(e) = listener.on_event(event.clone()).await {
            tracing::warn!("Listener for '{}' failed: {}", event_type, e);
        }
    }
    targets.len()
}

#[async_trait]
impl Transport for ConsoleTransport {
    fn name(&self) -> &str {
        "console"
    }

    fn on(&self, event_type: &str, listener: Arc<dyn TransportListener>) {
        let mut listeners = self.listeners.write().unwrap_or_else(|p| p.into_inner());
        listeners
            .entry(event_type.to_string())
            .or_default()
            .push(listener);
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<String, BotError> {
        match &message.thread_ts {
            Some(ts) => println!("[BOT#{} thread {}] {}", message.channel, ts, message.text),
            None => println!("[BOT#{}] {}", message.channel, message.text),
        }
        let id = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        self.outbox
            .lock()
            .map_err(|_| BotError::Transport("Lock poisoned".to_string()))?
            .push(message);
        Ok(format!("console-{}", id))
    }

    async fn start(&self) -> Result<(), BotError> {
        if !self.read_stdin {
            return Ok(());
        }

        let mut reader = self
            .reader
            .lock()
            .map_err(|_| BotError::Transport("Lock poisoned".to_string()))?;
        if reader.is_some() {
            return Ok(());
        }

        let listeners = Arc::clone(&self.listeners);
        *reader = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        dispatch(&listeners, "message", ConsoleTransport::message_event(line)).await;
                    }
                    Ok(None) => {
                        tracing::info!("Console input closed");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read console input: {}", e);
                        break;
                    }
                }
            }
        }));
        tracing::info!("Console transport listening on stdin");
        Ok(())
    }

    async fn stop(&self) {
        let handle = self.reader.lock().ok().and_then(|mut r| r.take());
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Console transport stopped");
        }
    }
}
