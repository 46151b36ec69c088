use crate::domain::model::Identity;
use crate::utils::error::{Result, StorefrontError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Remote JSON tree addressed by slash-separated paths.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// `None` when nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>>;
    async fn set(&self, path: &str, value: Value) -> Result<()>;
    /// Shallow merge of `fields` into the object at `path`.
    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()>;
    async fn remove(&self, path: &str) -> Result<()>;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores the bytes and returns a retrievable URL.
    async fn upload(&self, path: &str, data: &[u8], content_type: &str) -> Result<String>;
    async fn delete(&self, path: &str) -> Result<()>;
}

/// Outbound text channel (e.g. a chat bot webhook).
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Option<Identity>;
}

pub async fn read_typed<T: DeserializeOwned>(store: &dyn RealtimeStore, path: &str) -> Result<Option<T>> {
    match store.get(path).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Reads an object of children and decodes each value. Children that fail to
/// decode are skipped with a warning; the remote tree is shared and loosely typed.
pub async fn read_children<T: DeserializeOwned>(
    store: &dyn RealtimeStore,
    path: &str,
) -> Result<Vec<(String, T)>> {
    let value = match store.get(path).await? {
        Some(value) => value,
        None => return Ok(Vec::new()),
    };

    let entries: Vec<(String, Value)> = match value {
        Value::Object(map) => map.into_iter().collect(),
        // 以陣列形式存放時，索引即為 key
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        other => {
            return Err(StorefrontError::store(
                path,
                format!("expected an object of children, got {}", other),
            ))
        }
    };

    let mut children = Vec::with_capacity(entries.len());
    for (key, raw) in entries {
        match serde_json::from_value::<T>(raw) {
            Ok(item) => children.push((key, item)),
            Err(e) => tracing::warn!("⚠️ Skipping malformed entry {}/{}: {}", path, key, e),
        }
    }
    Ok(children)
}
