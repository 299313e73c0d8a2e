//! Persistence collaborator contract.
//!
//! The engine treats storage as an external key-value collaborator:
//! whole documents are saved and loaded by key, file/image blobs live
//! in a side store under their opaque ids. Absence of a key means "new
//! empty document", never an error. The engine's invariants hold on the
//! in-memory structure independent of whether a write has completed.

use crate::error::EngineError;
use crate::export::DocumentExport;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait DataStore {
    fn save_data(&self, key: &str, doc: &DocumentExport) -> Result<(), EngineError>;
    fn load_data(&self, key: &str) -> Result<Option<DocumentExport>, EngineError>;

    fn save_blob(&self, id: &str, data: &[u8]) -> Result<(), EngineError>;
    fn load_blob(&self, id: &str) -> Result<Option<Vec<u8>>, EngineError>;
    fn delete_blob(&self, id: &str) -> Result<(), EngineError>;
    fn list_blobs(&self) -> Result<Vec<String>, EngineError>;
}

/// Keys and blob ids become file names; path separators are refused.
fn validate_key(key: &str) -> Result<(), EngineError> {
    if key.is_empty() || key.starts_with('.') || key.contains('/') || key.contains('\\') {
        return Err(EngineError::Storage(format!(
            "invalid store key '{}'",
            key
        )));
    }
    Ok(())
}

/// JSON files under a root directory: documents as `<key>.json`, blobs
/// under `blobs/<id>`.
pub struct JsonFileStore {
    root: PathBuf,
}

impl JsonFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let root = root.into();
        fs::create_dir_all(root.join("blobs"))
            .map_err(|e| EngineError::Storage(format!("failed to create {:?}: {}", root, e)))?;
        Ok(JsonFileStore { root })
    }

    /// Store under the platform data directory (falls back to `./data`).
    pub fn default_location() -> Result<Self, EngineError> {
        let base = dirs::data_dir()
            .map(|dir| dir.join("orgtree"))
            .unwrap_or_else(|| PathBuf::from("data"));
        JsonFileStore::new(base)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn doc_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", key))
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.root.join("blobs").join(id)
    }
}

impl DataStore for JsonFileStore {
    fn save_data(&self, key: &str, doc: &DocumentExport) -> Result<(), EngineError> {
        validate_key(key)?;
        let json = serde_json::to_string(doc)
            .map_err(|e| EngineError::Storage(format!("failed to serialize '{}': {}", key, e)))?;
        fs::write(self.doc_path(key), json)
            .map_err(|e| EngineError::Storage(format!("failed to write '{}': {}", key, e)))
    }

    fn load_data(&self, key: &str) -> Result<Option<DocumentExport>, EngineError> {
        validate_key(key)?;
        let path = self.doc_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .map_err(|e| EngineError::Storage(format!("failed to read '{}': {}", key, e)))?;
        let doc = serde_json::from_str(&json)
            .map_err(|e| EngineError::Storage(format!("corrupt stored document '{}': {}", key, e)))?;
        Ok(Some(doc))
    }

    fn save_blob(&self, id: &str, data: &[u8]) -> Result<(), EngineError> {
        validate_key(id)?;
        fs::write(self.blob_path(id), data)
            .map_err(|e| EngineError::Storage(format!("failed to write blob '{}': {}", id, e)))
    }

    fn load_blob(&self, id: &str) -> Result<Option<Vec<u8>>, EngineError> {
        validate_key(id)?;
        let path = self.blob_path(id);
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|e| EngineError::Storage(format!("failed to read blob '{}': {}", id, e)))
    }

    fn delete_blob(&self, id: &str) -> Result<(), EngineError> {
        validate_key(id)?;
        let path = self.blob_path(id);
        if path.exists() {
            fs::remove_file(&path).map_err(|e| {
                EngineError::Storage(format!("failed to delete blob '{}': {}", id, e))
            })?;
        }
        Ok(())
    }

    fn list_blobs(&self) -> Result<Vec<String>, EngineError> {
        let entries = fs::read_dir(self.root.join("blobs"))
            .map_err(|e| EngineError::Storage(format!("failed to list blobs: {}", e)))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| EngineError::Storage(format!("failed to list blobs: {}", e)))?;
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, DocumentExport>>,
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl DataStore for MemoryStore {
    fn save_data(&self, key: &str, doc: &DocumentExport) -> Result<(), EngineError> {
        validate_key(key)?;
        self.docs
            .lock()
            .unwrap()
            .insert(key.to_string(), doc.clone());
        Ok(())
    }

    fn load_data(&self, key: &str) -> Result<Option<DocumentExport>, EngineError> {
        validate_key(key)?;
        Ok(self
            .docs
            .lock()
            .unwrap()
            .get(key)
            .cloned())
    }

    fn save_blob(&self, id: &str, data: &[u8]) -> Result<(), EngineError> {
        validate_key(id)?;
        self.blobs
            .lock()
            .unwrap()
            .insert(id.to_string(), data.to_vec());
        Ok(())
    }

    fn load_blob(&self, id: &str) -> Result<Option<Vec<u8>>, EngineError> {
        validate_key(id)?;
        Ok(self
            .blobs
            .lock()
            .unwrap()
            .get(id)
            .cloned())
    }

    fn delete_blob(&self, id: &str) -> Result<(), EngineError> {
        validate_key(id)?;
        self.blobs
            .lock()
            .unwrap()
            .remove(id);
        Ok(())
    }

    fn list_blobs(&self) -> Result<Vec<String>, EngineError> {
        let mut ids: Vec<String> = self
            .blobs
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::export::export_document;

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store")).unwrap();

        // Absence is a fresh document, not an error.
        assert!(store.load_data("tree").unwrap().is_none());

        let export = export_document(&Document::demo());
        store.save_data("tree", &export).unwrap();
        let loaded = store.load_data("tree").unwrap().unwrap();
        assert_eq!(loaded, export);
    }

    #[test]
    fn test_file_store_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("store")).unwrap();

        store.save_blob("img-1", b"pixels").unwrap();
        store.save_blob("file-2", b"bytes").unwrap();
        assert_eq!(store.load_blob("img-1").unwrap().unwrap(), b"pixels");
        assert_eq!(
            store.list_blobs().unwrap(),
            vec!["file-2".to_string(), "img-1".to_string()]
        );
        store.delete_blob("img-1").unwrap();
        assert!(store.load_blob("img-1").unwrap().is_none());
        // Deleting an absent blob is a no-op.
        store.delete_blob("img-1").unwrap();
    }

    #[test]
    fn test_keys_with_separators_rejected() {
        let store = MemoryStore::new();
        let export = export_document(&Document::demo());
        assert!(store.save_data("../escape", &export).is_err());
        assert!(store.save_blob("a/b", b"x").is_err());
        assert!(store.load_data("").is_err());
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        let export = export_document(&Document::demo());
        store.save_data("tree", &export).unwrap();
        assert_eq!(store.load_data("tree").unwrap().unwrap(), export);
        assert!(store.load_data("other").unwrap().is_none());
    }
}
