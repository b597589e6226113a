//! JSON-file document store.
//!
//! One file per collection:
//!
//! ```text
//! {root}/
//! ├── web_chat_sessions.json   { "documents": [ { "id": ..., "data": {...} }, ... ] }
//! ├── web_chat_messages.json
//! └── settings.json
//! ```
//!
//! Every operation reads the collection file, applies the change and writes
//! it back. A process-wide mutex serialises file access; there is no
//! cross-process locking.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::{ensure_object, merge_fields, Document, DocumentStore, Query, StoreError};

/// On-disk shape of a collection file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CollectionFile {
    documents: Vec<Document>,
}

pub struct JsonFileDocumentStore {
    root: PathBuf,
    io: Mutex<()>,
}

impl JsonFileDocumentStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .map_err(|e| StoreError::Unavailable(format!("cannot create {}: {e}", root.display())))?;
        debug!(root = %root.display(), "json document store opened");
        Ok(Self { root, io: Mutex::new(()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.io
            .lock()
            .map_err(|_| StoreError::Unavailable("json store lock poisoned".into()))
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        let valid = !collection.is_empty()
            && collection
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::Unavailable(format!("invalid collection name: {collection:?}")));
        }
        Ok(self.root.join(format!("{collection}.json")))
    }

    fn read_collection(&self, collection: &str) -> Result<CollectionFile, StoreError> {
        let path = self.collection_path(collection)?;
        if !path.exists() {
            return Ok(CollectionFile::default());
        }
        let data = fs::read_to_string(&path)
            .map_err(|e| StoreError::Unavailable(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&data)
            .map_err(|e| StoreError::Unavailable(format!("malformed {}: {e}", path.display())))
    }

    fn write_collection(&self, collection: &str, file: &CollectionFile) -> Result<(), StoreError> {
        let path = self.collection_path(collection)?;
        let data = serde_json::to_string_pretty(file)
            .map_err(|e| StoreError::Unavailable(format!("serialise {collection}: {e}")))?;
        // Atomic replace: sibling temp file, then rename.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)
            .map_err(|e| StoreError::Unavailable(format!("cannot write {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &path)
            .map_err(|e| StoreError::Unavailable(format!("cannot replace {}: {e}", path.display())))
    }
}

impl DocumentStore for JsonFileDocumentStore {
    fn backend(&self) -> &str {
        "json"
    }

    fn insert(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        ensure_object("", &data)?;
        let _guard = self.lock()?;
        let mut file = self.read_collection(collection)?;
        let id = Uuid::new_v4().to_string();
        file.documents.push(Document { id: id.clone(), data });
        self.write_collection(collection, &file)?;
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let _guard = self.lock()?;
        let file = self.read_collection(collection)?;
        Ok(file.documents.into_iter().find(|d| d.id == id))
    }

    fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        ensure_object(id, &data)?;
        let _guard = self.lock()?;
        let mut file = self.read_collection(collection)?;
        match file.documents.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.data = data,
            None => file.documents.push(Document { id: id.to_string(), data }),
        }
        self.write_collection(collection, &file)
    }

    fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let _guard = self.lock()?;
        let mut file = self.read_collection(collection)?;
        let existing = file
            .documents
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(id, &mut existing.data, fields)?;
        self.write_collection(collection, &file)
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let _guard = self.lock()?;
        let file = self.read_collection(collection)?;
        Ok(query.apply(file.documents))
    }
}
