use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::AppError;

use super::KeyspaceHandle;

/// Hierarchical documents addressed by slash-separated paths such as
/// `pond-1/hourlyRecords/2024-06-20/hours/07`.
///
/// Every write goes through one async lock, so a merge can never interleave
/// with the read-modify-write of [`DocumentStore::update`]. Reads take no
/// lock.
#[derive(Clone)]
pub struct DocumentStore {
    ks: KeyspaceHandle,
    write_lock: Arc<Mutex<()>>,
}

fn as_object(path: &str, value: Value) -> Result<Map<String, Value>, AppError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "document at {path} must be a JSON object, got {other}"
        ))),
    }
}

impl DocumentStore {
    pub fn new(ks: KeyspaceHandle) -> Self {
        Self {
            ks,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, AppError> {
        self.ks.get(path).await
    }

    pub async fn exists(&self, path: &str) -> Result<bool, AppError> {
        self.ks.contains_key(path).await
    }

    /// Upsert `fields` into the document at `path`.
    ///
    /// Top-level fields present in `fields` overwrite the stored ones
    /// (including explicit nulls); all other stored fields are kept.
    pub async fn set_merge<T: Serialize>(&self, path: &str, fields: &T) -> Result<(), AppError> {
        let fields = as_object(path, serde_json::to_value(fields)?)?;

        let _guard = self.write_lock.lock().await;
        let mut doc = match self.ks.get::<Value>(path).await? {
            Some(existing) => as_object(path, existing)?,
            None => Map::new(),
        };
        doc.extend(fields);
        self.ks.insert(path, &Value::Object(doc)).await
    }

    /// Atomically replace the document at `path` with `f(current)`.
    ///
    /// No other write to this store can land between the read and the
    /// write. Returns the value that was written.
    pub async fn update<T, F>(&self, path: &str, f: F) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(Option<T>) -> T,
    {
        let _guard = self.write_lock.lock().await;
        let current = self.ks.get::<T>(path).await?;
        let next = f(current);
        self.ks.insert(path, &next).await?;
        Ok(next)
    }

    /// Write `doc` only if nothing is stored at `path` yet.
    pub async fn create_if_absent<T: Serialize>(&self, path: &str, doc: &T) -> Result<bool, AppError> {
        let _guard = self.write_lock.lock().await;
        if self.ks.contains_key(path).await? {
            return Ok(false);
        }
        self.ks.insert(path, doc).await?;
        Ok(true)
    }

    pub async fn delete(&self, path: &str) -> Result<(), AppError> {
        let _guard = self.write_lock.lock().await;
        self.ks.remove(path).await
    }

    /// Direct children of the collection at `path`, tagged with their ids
    /// and ordered by id. Deeper descendants are not included.
    pub async fn collection<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Vec<(String, T)>, AppError> {
        let prefix = format!("{path}/");
        let mut docs = Vec::new();
        for (key, value) in self.ks.prefix_iter_raw(prefix.as_bytes()).await? {
            let key = String::from_utf8(key)
                .map_err(|e| AppError::Store(format!("non-utf8 document key: {e}")))?;
            let Some(id) = key.strip_prefix(&prefix) else {
                continue;
            };
            if id.contains('/') {
                continue;
            }
            docs.push((id.to_string(), serde_json::from_slice(&value)?));
        }
        Ok(docs)
    }

    /// Paths of every document below `path`, at any depth, relative to it.
    pub async fn descendant_paths(&self, path: &str) -> Result<Vec<String>, AppError> {
        let prefix = format!("{path}/");
        let mut paths = Vec::new();
        for (key, _) in self.ks.prefix_iter_raw(prefix.as_bytes()).await? {
            if let Ok(key) = String::from_utf8(key)
                && let Some(rest) = key.strip_prefix(&prefix)
            {
                paths.push(rest.to_string());
            }
        }
        Ok(paths)
    }

    /// True when no document exists below `path`.
    pub async fn is_empty(&self, path: &str) -> Result<bool, AppError> {
        Ok(self.descendant_paths(path).await?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;
    use serde::Deserialize;
    use serde_json::json;

    fn docs() -> DocumentStore {
        DocumentStore::new(Store::memory().keyspace("documents").unwrap())
    }

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        n: u32,
    }

    #[tokio::test]
    async fn set_merge_keeps_unmentioned_fields() {
        let docs = docs();
        docs.set_merge("o/a", &json!({ "x": 1, "y": 2 })).await.unwrap();
        docs.set_merge("o/a", &json!({ "y": 3, "z": null })).await.unwrap();
        let doc: Value = docs.get("o/a").await.unwrap().unwrap();
        assert_eq!(doc, json!({ "x": 1, "y": 3, "z": null }));
    }

    #[tokio::test]
    async fn set_merge_rejects_non_objects() {
        let docs = docs();
        assert!(docs.set_merge("o/a", &json!(5)).await.is_err());
    }

    #[tokio::test]
    async fn collection_lists_direct_children_only() {
        let docs = docs();
        docs.set_merge("o/c/1", &json!({ "v": 1 })).await.unwrap();
        docs.set_merge("o/c/2", &json!({ "v": 2 })).await.unwrap();
        docs.set_merge("o/c/2/sub/x", &json!({ "v": 3 })).await.unwrap();
        docs.set_merge("o/cc/9", &json!({ "v": 9 })).await.unwrap();

        let children: Vec<(String, Value)> = docs.collection("o/c").await.unwrap();
        let ids: Vec<&str> = children.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        let all = docs.descendant_paths("o/c").await.unwrap();
        assert_eq!(all, vec!["1", "2", "2/sub/x"]);
        assert!(!docs.is_empty("o/c").await.unwrap());
        assert!(docs.is_empty("o/d").await.unwrap());
    }

    #[tokio::test]
    async fn create_if_absent_never_overwrites() {
        let docs = docs();
        assert!(docs.create_if_absent("o/a", &Counter { n: 1 }).await.unwrap());
        assert!(!docs.create_if_absent("o/a", &Counter { n: 2 }).await.unwrap());
        let doc: Counter = docs.get("o/a").await.unwrap().unwrap();
        assert_eq!(doc, Counter { n: 1 });
    }

    #[tokio::test]
    async fn delete_removes_document() {
        let docs = docs();
        docs.set_merge("o/a", &json!({ "x": 1 })).await.unwrap();
        assert!(docs.exists("o/a").await.unwrap());
        docs.delete("o/a").await.unwrap();
        assert!(!docs.exists("o/a").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_not_lost() {
        let docs = docs();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..50 {
            let docs = docs.clone();
            tasks.spawn(async move {
                docs.update("o/counter", |c: Option<Counter>| Counter {
                    n: c.unwrap_or_default().n + 1,
                })
                .await
                .unwrap();
            });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap();
        }
        let doc: Counter = docs.get("o/counter").await.unwrap().unwrap();
        assert_eq!(doc.n, 50);
    }
}
