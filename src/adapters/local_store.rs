use crate::domain::ports::RealtimeStore;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// JSON tree kept in memory and, when opened from a file, written back after
/// every change. A failed write leaves the in-memory tree untouched. Mirrors the remote store's semantics: writing `null` deletes
/// and empty objects read as absent.
#[derive(Debug)]
pub struct LocalRealtimeStore {
    root: Mutex<Value>,
    file: Option<PathBuf>,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn lookup<'a>(root: &'a Value, segs: &[&str]) -> Option<&'a Value> {
    segs.iter().try_fold(root, |node, seg| match node {
        Value::Object(map) => map.get(*seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn delete(root: &mut Value, segs: &[&str]) {
    let Some((last, parents)) = segs.split_last() else {
        *root = Value::Object(Map::new());
        return;
    };

    let mut node = root;
    for seg in parents {
        match node {
            Value::Object(map) => match map.get_mut(*seg) {
                Some(child) => node = child,
                None => return,
            },
            _ => return,
        }
    }
    if let Value::Object(map) = node {
        map.remove(*last);
    }
}

fn assign(root: &mut Value, segs: &[&str], value: Value) {
    if value.is_null() {
        delete(root, segs);
        return;
    }

    let mut node = root;
    for seg in segs {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(seg.to_string())
                .or_insert_with(|| Value::Object(Map::new())),
            // 上面已確保是物件
            _ => return,
        };
    }
    *node = value;
}

fn is_empty_node(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl LocalRealtimeStore {
    pub fn in_memory() -> Self {
        Self {
            root: Mutex::new(Value::Object(Map::new())),
            file: None,
        }
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            root: Mutex::new(data),
            file: None,
        }
    }

    /// Loads the file if it exists; otherwise starts empty and creates it on first write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let root = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                Value::Object(Map::new())
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            Value::Object(Map::new())
        };

        tracing::debug!("📂 Local store at {}", path.display());
        Ok(Self {
            root: Mutex::new(root),
            file: Some(path),
        })
    }

    /// 先在副本上修改，寫檔成功後才替換記憶體中的樹
    async fn commit<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Value),
    {
        let mut root = self.root.lock().await;
        let mut staged = root.clone();
        change(&mut staged);
        self.persist(&staged).await?;
        *root = staged;
        Ok(())
    }

    async fn persist(&self, root: &Value) -> Result<()> {
        let Some(path) = &self.file else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(root)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

#[async_trait]
impl RealtimeStore for LocalRealtimeStore {
    async fn get(&self, path: &str) -> Result<Option<Value>> {
        let root = self.root.lock().await;
        Ok(lookup(&root, &segments(path))
            .filter(|v| !is_empty_node(v))
            .cloned())
    }

    async fn set(&self, path: &str, value: Value) -> Result<()> {
        self.commit(|root| assign(root, &segments(path), value)).await
    }

    async fn update(&self, path: &str, fields: Map<String, Value>) -> Result<()> {
        let base = segments(path);
        self.commit(|root| {
            for (key, value) in fields {
                // key 可以是多層路徑，例如 "users/u1/lastLogin"
                let mut full = base.clone();
                full.extend(segments(&key));
                assign(root, &full, value);
            }
        })
        .await
    }

    async fn remove(&self, path: &str) -> Result<()> {
        self.commit(|root| delete(root, &segments(path))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_set_get_nested() {
        let store = LocalRealtimeStore::in_memory();
        store.set("orders/A1", json!({"id": "A1"})).await.unwrap();
        store.set("orders/B2/status", json!("Checking")).await.unwrap();

        assert_eq!(store.get("orders/A1/id").await.unwrap(), Some(json!("A1")));
        assert_eq!(store.get("/orders/B2/").await.unwrap(), Some(json!({"status": "Checking"})));
        assert_eq!(store.get("orders/C3").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_merges_and_null_deletes() {
        let store = LocalRealtimeStore::in_memory();
        store
            .set("orders/A1", json!({"status": "Checking", "cancelReason": "x"}))
            .await
            .unwrap();

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("Cancelled"));
        fields.insert("cancelReason".to_string(), Value::Null);
        store.update("orders/A1", fields).await.unwrap();

        assert_eq!(store.get("orders/A1").await.unwrap(), Some(json!({"status": "Cancelled"})));
    }

    #[tokio::test]
    async fn test_remove_and_empty_objects_read_as_absent() {
        let store = LocalRealtimeStore::in_memory();
        store.set("portfolio/p1", json!({"title": "t"})).await.unwrap();
        store.remove("portfolio/p1").await.unwrap();
        assert_eq!(store.get("portfolio").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_memory_unchanged() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        // 父路徑是檔案，建立目錄必定失敗
        let store = LocalRealtimeStore::open(blocker.join("data.json")).unwrap();
        assert!(store.set("orders/A1", json!({"id": "A1"})).await.is_err());
        assert_eq!(store.get("orders/A1").await.unwrap(), None);

        let mut fields = Map::new();
        fields.insert("config/workingHours/start".to_string(), json!("09:00"));
        assert!(store.update("", fields).await.is_err());
        assert_eq!(store.get("config").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_persists_to_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let store = LocalRealtimeStore::open(&path).unwrap();
        store
            .set("config/workingHours", json!({"start": "10:00", "end": "19:00"}))
            .await
            .unwrap();

        let reopened = LocalRealtimeStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("config/workingHours/end").await.unwrap(),
            Some(json!("19:00"))
        );
    }
}
