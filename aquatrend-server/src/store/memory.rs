use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use crate::error::AppError;

use super::{BoxFuture, KeyspaceOps, RawKvPair, StorageBackend};

type Tree = BTreeMap<Vec<u8>, Vec<u8>>;

fn poisoned<T>(_: T) -> AppError {
    AppError::Internal("memory store lock poisoned".into())
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// Process-local backend. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryBackend {
    keyspaces: Mutex<HashMap<String, Arc<MemoryKeyspace>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn keyspace(&self, name: &str) -> Result<(String, Arc<dyn KeyspaceOps>), AppError> {
        let mut keyspaces = self.keyspaces.lock().map_err(poisoned)?;
        let ks = keyspaces
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryKeyspace::default()))
            .clone();
        Ok((name.to_string(), ks))
    }

    fn persist(&self) -> BoxFuture<'_, Result<(), AppError>> {
        Box::pin(async { Ok(()) })
    }
}

// ---------------------------------------------------------------------------
// MemoryKeyspace
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryKeyspace {
    tree: Mutex<Tree>,
}

impl MemoryKeyspace {
    fn with_tree<R>(&self, f: impl FnOnce(&mut Tree) -> R) -> Result<R, AppError> {
        let mut tree = self.tree.lock().map_err(poisoned)?;
        Ok(f(&mut tree))
    }
}

impl KeyspaceOps for MemoryKeyspace {
    fn insert_raw(&self, key: Vec<u8>, value: Vec<u8>) -> BoxFuture<'_, Result<(), AppError>> {
        let result = self.with_tree(|tree| {
            tree.insert(key, value);
        });
        Box::pin(async move { result })
    }

    fn get_raw(&self, key: Vec<u8>) -> BoxFuture<'_, Result<Option<Vec<u8>>, AppError>> {
        let result = self.with_tree(|tree| tree.get(&key).cloned());
        Box::pin(async move { result })
    }

    fn remove(&self, key: Vec<u8>) -> BoxFuture<'_, Result<(), AppError>> {
        let result = self.with_tree(|tree| {
            tree.remove(&key);
        });
        Box::pin(async move { result })
    }

    fn contains_key(&self, key: Vec<u8>) -> BoxFuture<'_, Result<bool, AppError>> {
        let result = self.with_tree(|tree| tree.contains_key(&key));
        Box::pin(async move { result })
    }

    fn prefix_iter_raw(&self, prefix: Vec<u8>) -> BoxFuture<'_, Result<Vec<RawKvPair>, AppError>> {
        let result = self.with_tree(|tree| {
            tree.range(prefix.clone()..)
                .take_while(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        });
        Box::pin(async move { result })
    }
}
