//! In-memory document store.
//!
//! All data lives in process memory and is discarded on exit. Collections
//! keep insertion order, which is the iteration order queries start from.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::{Map, Value};
use uuid::Uuid;

use super::{ensure_object, merge_fields, Document, DocumentStore, Query, StoreError};

/// collection name -> documents in insertion order
type Collections = HashMap<String, Vec<Document>>;

pub struct MemoryDocumentStore {
    collections: RwLock<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Collections>, StoreError> {
        self.collections
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Collections>, StoreError> {
        self.collections
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn backend(&self) -> &str {
        "memory"
    }

    fn insert(&self, collection: &str, data: Value) -> Result<String, StoreError> {
        ensure_object("", &data)?;
        let id = Uuid::new_v4().to_string();
        self.write()?
            .entry(collection.to_string())
            .or_default()
            .push(Document { id: id.clone(), data });
        Ok(id)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .read()?
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError> {
        ensure_object(id, &data)?;
        let mut guard = self.write()?;
        let docs = guard.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| d.id == id) {
            Some(existing) => existing.data = data,
            None => docs.push(Document { id: id.to_string(), data }),
        }
        Ok(())
    }

    fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let mut guard = self.write()?;
        let existing = guard
            .get_mut(collection)
            .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(id, &mut existing.data, fields)
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let guard = self.read()?;
        let docs = guard.get(collection).map(|d| d.as_slice()).unwrap_or_default();
        Ok(query.apply(docs.iter().cloned()))
    }
}
