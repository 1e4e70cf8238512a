//! File-backed JSON store
//!
//! All keys live in a single JSON object file. Loads are tolerant: a
//! missing file starts empty, a corrupt file is logged and abandoned in
//! favor of defaults rather than failing startup.

use super::store::KvStore;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::warn;

pub struct JsonFileStore {
    path: PathBuf,
    entries: RwLock<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, loading whatever valid state exists there
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!(path = %path.display(), "store file is not a JSON object, starting empty");
                    Map::new()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "store file corrupt, starting empty");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    async fn flush(&self, entries: &Map<String, Value>) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(&Value::Object(entries.clone()))?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for JsonFileStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> anyhow::Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value);
        self.flush(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("patrol-store-{}-{}.json", name, patrol_shared::now_ms()))
    }

    #[tokio::test]
    async fn test_survives_process_restart() {
        let path = scratch_path("restart");

        let store = JsonFileStore::open(&path).await;
        store.set("patrol_home", json!({"lat": 48.1, "lng": 11.5})).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).await;
        let home = reopened.get("patrol_home").await.unwrap().unwrap();
        assert_eq!(home["lat"], 48.1);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let path = scratch_path("corrupt");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let store = JsonFileStore::open(&path).await;
        assert_eq!(store.get("patrol_routes").await.unwrap(), None);

        // Still writable afterwards
        store.set("patrol_routes", json!([])).await.unwrap();
        assert!(store.get("patrol_routes").await.unwrap().is_some());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let store = JsonFileStore::open(scratch_path("missing")).await;
        assert_eq!(store.get("patrol_settings").await.unwrap(), None);
    }
}
