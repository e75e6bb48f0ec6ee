//! Application layer errors

use std::time::Duration;
use thiserror::Error;

use crate::domain::entities::LifecycleStage;

/// General bot errors
#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Plugin error: {0}")]
    Plugin(#[from] PluginError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),

    #[error("Dashboard error: {0}")]
    Dashboard(#[from] DashboardError),

    #[error("Route error: {0}")]
    Route(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration errors, all fatal at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Storage descriptor '{0}' is not a durable backend and require-durable is set")]
    UnsupportedStorage(String),

    #[error("Unknown plugin source: {0}")]
    UnknownSource(String),

    #[error("Enabled plugin '{0}' was not discovered")]
    UnknownPlugin(String),

    #[error("Plugin key '{key}' used by {origin} is reserved for the host")]
    ReservedKey { key: String, origin: String },

    #[error("Plugin key '{key}' is provided by both {first} and {second}")]
    DuplicatePlugin {
        key: String,
        first: String,
        second: String,
    },

    #[error("Dashboard namespace '{namespace}' claimed by '{owner}' and '{intruder}'")]
    NamespaceCollision {
        namespace: String,
        owner: String,
        intruder: String,
    },
}

/// Per-plugin lifecycle failures
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin '{key}' failed during {stage}: {message}")]
    Hook {
        key: String,
        stage: LifecycleStage,
        message: String,
    },

    #[error("Plugin '{key}' {stage} hook timed out after {timeout:?}")]
    Timeout {
        key: String,
        stage: LifecycleStage,
        timeout: Duration,
    },

    #[error("Plugin '{key}' cannot move from {from} to {to}")]
    InvalidTransition {
        key: String,
        from: String,
        to: String,
    },
}

/// Event handler failures
#[derive(Error, Debug)]
pub enum EventError {
    #[error("Handler for '{topic}' failed: {message}")]
    Handler { topic: String, message: String },
}

impl EventError {
    pub fn handler(topic: impl Into<String>, message: impl ToString) -> Self {
        EventError::Handler {
            topic: topic.into(),
            message: message.to_string(),
        }
    }
}

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage unavailable after {attempts} attempts: {message}")]
    Unavailable { attempts: u32, message: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// Dashboard registration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("Namespace '{namespace}' already belongs to '{owner}'")]
    NamespaceCollision { namespace: String, owner: String },

    #[error("Tab '{namespace}/{tab_id}' already registered")]
    DuplicateTab { namespace: String, tab_id: String },

    #[error("Template directory {0} does not exist")]
    TemplateDirMissing(String),
}
