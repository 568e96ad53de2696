//! Key-value storage behind the document store.
//!
//! A [`StorageBackend`] hands out named keyspaces; every keyspace speaks raw
//! bytes through [`KeyspaceOps`]. [`KeyspaceHandle`] adds JSON (de)serialization
//! on top, and [`DocumentStore`] adds path-addressed documents with merge
//! writes and an atomic read-modify-write.

mod document;
#[cfg(feature = "store-fjall")]
mod fjall;
mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::AppError;

pub use document::DocumentStore;
pub use memory::MemoryBackend;

/// A key-value pair of raw bytes from a prefix scan.
pub type RawKvPair = (Vec<u8>, Vec<u8>);

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait StorageBackend: Send + Sync {
    /// Open (or create) the keyspace called `name`.
    fn keyspace(&self, name: &str) -> Result<(String, Arc<dyn KeyspaceOps>), AppError>;

    /// Flush pending writes to durable storage.
    fn persist(&self) -> BoxFuture<'_, Result<(), AppError>>;
}

pub trait KeyspaceOps: Send + Sync {
    fn insert_raw(&self, key: Vec<u8>, value: Vec<u8>) -> BoxFuture<'_, Result<(), AppError>>;
    fn get_raw(&self, key: Vec<u8>) -> BoxFuture<'_, Result<Option<Vec<u8>>, AppError>>;
    fn remove(&self, key: Vec<u8>) -> BoxFuture<'_, Result<(), AppError>>;
    fn contains_key(&self, key: Vec<u8>) -> BoxFuture<'_, Result<bool, AppError>>;
    /// All pairs whose key starts with `prefix`, in key order.
    fn prefix_iter_raw(&self, prefix: Vec<u8>) -> BoxFuture<'_, Result<Vec<RawKvPair>, AppError>>;
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn StorageBackend>,
}

#[derive(Clone)]
pub struct KeyspaceHandle {
    name: String,
    ops: Arc<dyn KeyspaceOps>,
}

impl Store {
    pub async fn open(config: &StoreConfig) -> Result<Self, AppError> {
        let backend: Box<dyn StorageBackend> = match config.backend {
            #[cfg(feature = "store-fjall")]
            StoreBackend::Fjall => fjall::FjallBackend::open(config)?,
            #[cfg(not(feature = "store-fjall"))]
            StoreBackend::Fjall => {
                return Err(AppError::Config(
                    "store.backend = \"fjall\" requires the store-fjall feature".into(),
                ));
            }
            StoreBackend::Memory => {
                info!("opening in-memory store");
                Box::new(MemoryBackend::new())
            }
        };
        Ok(Self {
            backend: Arc::from(backend),
        })
    }

    /// A fresh, empty in-memory store.
    pub fn memory() -> Self {
        Self {
            backend: Arc::new(MemoryBackend::new()),
        }
    }

    pub fn keyspace(&self, name: &str) -> Result<KeyspaceHandle, AppError> {
        let (name, ops) = self.backend.keyspace(name)?;
        Ok(KeyspaceHandle { name, ops })
    }

    pub async fn persist(&self) -> Result<(), AppError> {
        self.backend.persist().await
    }
}

impl KeyspaceHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn insert<V: Serialize>(
        &self,
        key: impl Into<Vec<u8>>,
        value: &V,
    ) -> Result<(), AppError> {
        let bytes = serde_json::to_vec(value)?;
        self.ops.insert_raw(key.into(), bytes).await
    }

    pub async fn get<V: DeserializeOwned>(
        &self,
        key: impl Into<Vec<u8>>,
    ) -> Result<Option<V>, AppError> {
        match self.ops.get_raw(key.into()).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub async fn remove(&self, key: impl Into<Vec<u8>>) -> Result<(), AppError> {
        self.ops.remove(key.into()).await
    }

    pub async fn contains_key(&self, key: impl Into<Vec<u8>>) -> Result<bool, AppError> {
        self.ops.contains_key(key.into()).await
    }

    /// Iterate all key-value pairs whose key starts with `prefix`.
    pub async fn prefix_iter_raw(
        &self,
        prefix: impl Into<Vec<u8>>,
    ) -> Result<Vec<RawKvPair>, AppError> {
        self.ops.prefix_iter_raw(prefix.into()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let store = Store::memory();
        let ks = store.keyspace("test").unwrap();
        ks.insert("key1", &"hello").await.unwrap();
        let val: Option<String> = ks.get("key1").await.unwrap();
        assert_eq!(val, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = Store::memory();
        let ks = store.keyspace("test").unwrap();
        let val: Option<String> = ks.get("nonexistent").await.unwrap();
        assert_eq!(val, None);
    }

    #[tokio::test]
    async fn remove_deletes_key() {
        let store = Store::memory();
        let ks = store.keyspace("test").unwrap();
        ks.insert("key1", &"hello").await.unwrap();
        ks.remove("key1").await.unwrap();
        assert!(!ks.contains_key("key1").await.unwrap());
    }

    #[tokio::test]
    async fn keyspaces_are_isolated_and_shared_by_name() {
        let store = Store::memory();
        let a = store.keyspace("a").unwrap();
        let b = store.keyspace("b").unwrap();
        a.insert("k", &1).await.unwrap();
        assert_eq!(b.get::<u32>("k").await.unwrap(), None);

        let a_again = store.keyspace("a").unwrap();
        assert_eq!(a_again.get::<u32>("k").await.unwrap(), Some(1));
        assert_eq!(a_again.name(), "a");
    }

    #[tokio::test]
    async fn prefix_iter_raw_is_ordered_and_filtered() {
        let store = Store::memory();
        let ks = store.keyspace("test").unwrap();
        ks.insert("p/b", &2).await.unwrap();
        ks.insert("p/a", &1).await.unwrap();
        ks.insert("q/c", &3).await.unwrap();
        let keys: Vec<Vec<u8>> = ks
            .prefix_iter_raw("p/")
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![b"p/a".to_vec(), b"p/b".to_vec()]);
    }

    #[tokio::test]
    async fn memory_backend_opens_from_config() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..StoreConfig::default()
        };
        let store = Store::open(&config).await.unwrap();
        store.persist().await.unwrap();
        assert!(store.keyspace("docs").is_ok());
    }
}
