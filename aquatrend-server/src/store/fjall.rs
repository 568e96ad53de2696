use std::fmt::Display;
use std::sync::Arc;

use fjall::{KeyspaceCreateOptions, PersistMode};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::AppError;

use super::{BoxFuture, KeyspaceOps, RawKvPair, StorageBackend};

/// Run a blocking fjall call on the blocking pool.
fn off_thread<T, E, F>(op: F) -> BoxFuture<'static, Result<T, AppError>>
where
    T: Send + 'static,
    E: Display + Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    Box::pin(async move {
        tokio::task::spawn_blocking(op)
            .await
            .map_err(|e| AppError::Internal(format!("blocking task panicked: {e}")))?
            .map_err(|e| AppError::Store(e.to_string()))
    })
}

/// Embedded LSM database; one fjall keyspace per store keyspace.
pub struct FjallBackend {
    db: fjall::Database,
}

impl FjallBackend {
    pub fn open(config: &StoreConfig) -> Result<Box<dyn StorageBackend>, AppError> {
        std::fs::create_dir_all(&config.data_dir).map_err(AppError::Io)?;
        info!(path = %config.data_dir.display(), "opening fjall store");

        let db = fjall::Database::builder(&config.data_dir)
            .open()
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok(Box::new(Self { db }))
    }
}

impl StorageBackend for FjallBackend {
    fn keyspace(&self, name: &str) -> Result<(String, Arc<dyn KeyspaceOps>), AppError> {
        let keyspace = self
            .db
            .keyspace(name, KeyspaceCreateOptions::default)
            .map_err(|e| AppError::Store(e.to_string()))?;
        Ok((name.to_string(), Arc::new(FjallKeyspace { keyspace })))
    }

    fn persist(&self) -> BoxFuture<'_, Result<(), AppError>> {
        let db = self.db.clone();
        off_thread(move || db.persist(PersistMode::SyncAll).map(|_| ()))
    }
}

struct FjallKeyspace {
    keyspace: fjall::Keyspace,
}

impl KeyspaceOps for FjallKeyspace {
    fn insert_raw(&self, key: Vec<u8>, value: Vec<u8>) -> BoxFuture<'_, Result<(), AppError>> {
        let ks = self.keyspace.clone();
        off_thread(move || ks.insert(key, value).map(|_| ()))
    }

    fn get_raw(&self, key: Vec<u8>) -> BoxFuture<'_, Result<Option<Vec<u8>>, AppError>> {
        let ks = self.keyspace.clone();
        off_thread(move || ks.get(key).map(|found| found.map(|v| v.to_vec())))
    }

    fn remove(&self, key: Vec<u8>) -> BoxFuture<'_, Result<(), AppError>> {
        let ks = self.keyspace.clone();
        off_thread(move || ks.remove(key).map(|_| ()))
    }

    fn contains_key(&self, key: Vec<u8>) -> BoxFuture<'_, Result<bool, AppError>> {
        let ks = self.keyspace.clone();
        off_thread(move || ks.contains_key(key))
    }

    fn prefix_iter_raw(&self, prefix: Vec<u8>) -> BoxFuture<'_, Result<Vec<RawKvPair>, AppError>> {
        let ks = self.keyspace.clone();
        off_thread(move || {
            ks.prefix(&prefix)
                .map(|guard| guard.into_inner().map(|(k, v)| (k.to_vec(), v.to_vec())))
                .collect::<Result<Vec<RawKvPair>, _>>()
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
