//! In-memory storage backend
//!
//! Same semantics as the durable backend, nothing survives the process.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::application::errors::StorageError;
use crate::domain::traits::Store;

/// Volatile store keyed by namespace
#[derive(Default)]
pub struct MemoryStore {
    data: Arc<RwLock<HashMap<String, BTreeMap<String, Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &str {
        "memory"
    }

    fn is_durable(&self) -> bool {
        false
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        if let Some(ns) = data.get_mut(namespace) {
            ns.remove(key);
            if ns.is_empty() {
                data.remove(namespace);
            }
        }
        Ok(())
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .get(namespace)
            .map(|ns| ns.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }
}
