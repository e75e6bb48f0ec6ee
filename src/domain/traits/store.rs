use async_trait::async_trait;
use serde_json::Value;

use crate::application::errors::StorageError;

/// Store trait - namespaced key/value persistence
///
/// Every operation is scoped to the namespace it is given. Plugins use their
/// own key as namespace by convention; the store does not police that.
#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name for logs and the overview tab
    fn backend_name(&self) -> &str;

    /// Whether values survive a process restart
    fn is_durable(&self) -> bool;

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StorageError>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// All entries of a namespace, sorted by key
    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, StorageError>;

    /// Release backend resources
    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
