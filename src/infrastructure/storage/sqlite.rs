//! Durable SQLite storage backend
//!
//! One generic table holds every namespace. rusqlite is blocking, so each call
//! hops onto the blocking pool; the connection mutex serializes writers.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::retry::{with_retry, RetryConfig};
use crate::application::errors::StorageError;
use crate::domain::traits::Store;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, key)
)";

pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
    location: String,
}

impl SqliteStore {
    /// Open the database, retrying with backoff while it is not reachable.
    ///
    /// `None` opens a private in-memory database.
    pub async fn connect(path: Option<PathBuf>, retry: &RetryConfig) -> Result<Self, StorageError> {
        let location = path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| ":memory:".to_string());

        let conn = with_retry(retry, "sqlite connect", || {
            let path = path.clone();
            async move {
                tokio::task::spawn_blocking(move || Self::open(path.as_deref()))
                    .await
                    .map_err(|e| StorageError::Backend(format!("Connect task failed: {}", e)))?
            }
        })
        .await?;

        tracing::info!("SQLite storage ready at {}", location);
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            location,
        })
    }

    fn open(path: Option<&Path>) -> Result<Connection, StorageError> {
        let conn = match path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute(SCHEMA, [])?;
        Ok(conn)
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StorageError::Backend("Lock poisoned".to_string()))?;
            let conn = guard
                .as_ref()
                .ok_or_else(|| StorageError::Backend("Connection closed".to_string()))?;
            f(conn)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("Storage task failed: {}", e)))?
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend_name(&self) -> &str {
        "sqlite"
    }

    fn is_durable(&self) -> bool {
        true
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        let raw = self
            .with_conn(move |conn| {
                Ok(conn
                    .query_row(
                        "SELECT value FROM kv_store WHERE namespace = ?1 AND key = ?2",
                        params![namespace, key],
                        |row| row.get::<_, String>(0),
                    )
                    .optional()?)
            })
            .await?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let raw = serde_json::to_string(&value)?;
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv_store (namespace, key, value, updated_at)
                 VALUES (?1, ?2, ?3, datetime('now'))
                 ON CONFLICT(namespace, key)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![namespace, key, raw],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM kv_store WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )?;
            Ok(())
        })
        .await
    }

    async fn list(&self, namespace: &str) -> Result<Vec<(String, Value)>, StorageError> {
        let namespace = namespace.to_string();
        let rows = self
            .with_conn(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT key, value FROM kv_store WHERE namespace = ?1 ORDER BY key",
                )?;
                let rows = stmt.query_map(params![namespace], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;

                let mut entries = Vec::new();
                for row in rows {
                    entries.push(row?);
                }
                Ok(entries)
            })
            .await?;

        rows.into_iter()
            .map(|(key, raw)| -> Result<(String, Value), StorageError> {
                Ok((key, serde_json::from_str(&raw)?))
            })
            .collect()
    }

    async fn close(&self) -> Result<(), StorageError> {
        let conn = Arc::clone(&self.conn);
        let location = self.location.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Backend("Lock poisoned".to_string()))?;
            if let Some(conn) = guard.take() {
                conn.close().map_err(|(_, e)| StorageError::Backend(e.to_string()))?;
                tracing::debug!("Closed SQLite storage at {}", location);
            }
            Ok(())
        })
        .await
        .map_err(|e| StorageError::Backend(format!("Storage task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_db() -> PathBuf {
        std::env::temp_dir()
            .join(format!("plugbot-test-{}", uuid::Uuid::new_v4()))
            .join("kv.db")
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let path = temp_db();
        let store = SqliteStore::connect(Some(path.clone()), &RetryConfig::no_retry())
            .await
            .unwrap();
        let value = json!({"greeting": "hi", "nested": {"list": [1, 2.5, null, true]}});
        store.set("hello", "settings", value.clone()).await.unwrap();
        store.set("hello", "count", json!(1)).await.unwrap();
        store.set("hello", "count", json!(2)).await.unwrap();
        store.close().await.unwrap();

        let reopened = SqliteStore::connect(Some(path.clone()), &RetryConfig::no_retry())
            .await
            .unwrap();
        assert_eq!(reopened.get("hello", "settings").await.unwrap(), Some(value));
        assert_eq!(reopened.get("hello", "count").await.unwrap(), Some(json!(2)));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_floats_read_back_bit_exact() {
        let store = SqliteStore::connect(None, &RetryConfig::no_retry()).await.unwrap();
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut values = vec![1.0715660391465826e-75, 0.1, 1.0 / 3.0, f64::MIN_POSITIVE, f64::MAX];
        while values.len() < 2_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let value = f64::from_bits(state);
            if value.is_finite() {
                values.push(value);
            }
        }

        for (i, value) in values.iter().enumerate() {
            store.set("floats", &i.to_string(), json!(value)).await.unwrap();
        }
        for (i, value) in values.iter().enumerate() {
            let read = store.get("floats", &i.to_string()).await.unwrap().unwrap();
            let read = read.as_f64().unwrap();
            assert_eq!(read.to_bits(), value.to_bits(), "value {} changed", value);
        }
    }

    #[tokio::test]
    async fn test_list_and_delete_are_namespace_scoped() {
        let store = SqliteStore::connect(None, &RetryConfig::no_retry()).await.unwrap();
        store.set("a", "x", json!(1)).await.unwrap();
        store.set("b", "x", json!(2)).await.unwrap();
        store.set("a", "y", json!(3)).await.unwrap();
        store.delete("b", "x").await.unwrap();

        let keys: Vec<String> = store.list("a").await.unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["x", "y"]);
        assert!(store.list("b").await.unwrap().is_empty());
        assert_eq!(store.get("a", "x").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_unreachable_database_exhausts_retries() {
        let blocker = std::env::temp_dir().join(format!("plugbot-blocker-{}", uuid::Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").unwrap();
        let retry = RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            max_delay: Duration::from_millis(1),
        };

        let result = SqliteStore::connect(Some(blocker.join("kv.db")), &retry).await;
        assert!(matches!(result, Err(StorageError::Unavailable { attempts: 3, .. })));

        let _ = std::fs::remove_file(&blocker);
    }

    #[tokio::test]
    async fn test_calls_after_close_fail_loudly() {
        let store = SqliteStore::connect(None, &RetryConfig::no_retry()).await.unwrap();
        store.close().await.unwrap();
        assert!(matches!(
            store.get("a", "x").await,
            Err(StorageError::Backend(_))
        ));
    }
}
