//! In-memory object store

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::ObjectStore;
use crate::error::{IngestError, Result};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
}

/// Object store backed by a sorted map; listing order is lexicographic
#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> Result<MutexGuard<'_, BTreeMap<String, StoredObject>>> {
        self.objects
            .lock()
            .map_err(|_| IngestError::Storage("memory store lock poisoned".to_string()))
    }

    /// Seed a text object, replacing any previous content
    pub fn insert_text(&self, key: &str, content: &str) -> Result<()> {
        self.insert_bytes(key, content.as_bytes().to_vec(), "text/plain")
    }

    pub fn insert_bytes(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.objects()?.insert(
            key.to_string(),
            StoredObject {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.objects()?.keys().cloned().collect())
    }

    pub fn content_type(&self, key: &str) -> Result<Option<String>> {
        Ok(self.objects()?.get(key).map(|o| o.content_type.clone()))
    }

    pub fn bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.objects()?.get(key).map(|o| o.data.clone()))
    }
}

#[async_trait]
impl ObjectStore for MemoryStorage {
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects()?.contains_key(key))
    }

    async fn read_text(&self, key: &str) -> Result<String> {
        let data = self
            .bytes(key)?
            .ok_or_else(|| IngestError::Storage(format!("Object not found: {}", key)))?;

        String::from_utf8(data)
            .map_err(|e| IngestError::Parse(format!("{} is not valid UTF-8: {}", key, e)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn write(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.insert_bytes(key, data, content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_list() {
        let store = MemoryStorage::new();
        store
            .write("datos_diarios/2024-06-01/506.json", b"{}".to_vec(), "application/json")
            .await
            .unwrap();
        store.insert_text("datos_historicos/2024-06-01/stops.txt", "stop_id").unwrap();

        assert!(store.exists("datos_diarios/2024-06-01/506.json").await.unwrap());
        assert!(!store.exists("datos_diarios/2024-06-02/506.json").await.unwrap());
        assert_eq!(
            store.read_text("datos_historicos/2024-06-01/stops.txt").await.unwrap(),
            "stop_id"
        );
        assert_eq!(
            store.list("datos_diarios/").await.unwrap(),
            vec!["datos_diarios/2024-06-01/506.json".to_string()]
        );
        assert_eq!(
            store.content_type("datos_diarios/2024-06-01/506.json").unwrap().as_deref(),
            Some("application/json")
        );
    }

    #[tokio::test]
    async fn test_read_missing_is_error() {
        let store = MemoryStorage::new();
        assert!(matches!(
            store.read_text("nope").await,
            Err(IngestError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_read_invalid_utf8_is_parse_error() {
        let store = MemoryStorage::new();
        store.insert_bytes("bad.txt", vec![0xff, 0xfe, 0x00], "text/plain").unwrap();
        assert!(matches!(store.read_text("bad.txt").await, Err(IngestError::Parse(_))));
    }
}
