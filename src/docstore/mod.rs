//! Document store: the keyed document collection sessions, messages and
//! settings are persisted in.
//!
//! A [`DocumentStore`] holds named collections of JSON object documents.
//! Backends implement five blocking operations; query evaluation
//! ([`Query::apply`]) is shared so every backend filters, orders and limits
//! the same way. Async callers go through [`blocking`], which dispatches the
//! call onto the blocking thread pool.
//!
//! ```text
//! DocumentStore
//!   ├── MemoryDocumentStore     (process memory, lost on exit)
//!   └── JsonFileDocumentStore   ({work_dir}/store/{collection}.json)
//! ```

pub mod json_file;
pub mod memory;

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::info;

use crate::config::StoreConfig;

pub use json_file::JsonFileDocumentStore;
pub use memory::MemoryDocumentStore;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document {id}: {reason}")]
    Malformed { id: String, reason: String },
}

// ── Document ──────────────────────────────────────────────────────────────────

/// A stored document: generated id plus its JSON object body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Deserialize the body into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(self.data.clone()).map_err(|e| StoreError::Malformed {
            id: self.id.clone(),
            reason: e.to_string(),
        })
    }
}

/// Serialize `value` into a JSON object body.
pub fn encode<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    let data = serde_json::to_value(value).map_err(|e| StoreError::Malformed {
        id: String::new(),
        reason: format!("serialise: {e}"),
    })?;
    ensure_object("", &data)?;
    Ok(data)
}

pub(crate) fn ensure_object(id: &str, data: &Value) -> Result<(), StoreError> {
    if data.is_object() {
        Ok(())
    } else {
        Err(StoreError::Malformed {
            id: id.to_string(),
            reason: "document body must be a JSON object".into(),
        })
    }
}

/// Merge `fields` into the top level of `data`.
pub(crate) fn merge_fields(id: &str, data: &mut Value, fields: Map<String, Value>) -> Result<(), StoreError> {
    let obj = data.as_object_mut().ok_or_else(|| StoreError::Malformed {
        id: id.to_string(),
        reason: "document body must be a JSON object".into(),
    })?;
    for (k, v) in fields {
        obj.insert(k, v);
    }
    Ok(())
}

// ── Query ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Filter {
    /// Field equals value.
    Eq(String, Value),
    /// Field equals any of the values.
    In(String, Vec<Value>),
    /// Field orders strictly before value (see [`compare_values`]).
    Lt(String, Value),
}

impl Filter {
    fn matches(&self, data: &Value) -> bool {
        match self {
            Filter::Eq(field, value) => data.get(field) == Some(value),
            Filter::In(field, values) => data
                .get(field)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            Filter::Lt(field, value) => data
                .get(field)
                .is_some_and(|v| compare_values(Some(v), Some(value)) == Ordering::Less),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// Filter / order / limit description, built fluently:
///
/// ```ignore
/// Query::new()
///     .where_eq("sessionId", id)
///     .order_by("timestamp", Direction::Desc)
///     .limit(20)
/// ```
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<Filter>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.to_string(), value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(mut self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::In(
            field.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn where_lt(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Lt(field.to_string(), value.into()));
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order = Some((field.to_string(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn matches(&self, data: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(data))
    }

    /// Evaluate the query over `docs`, given in collection (insertion) order.
    ///
    /// Sorting is stable; documents with equal sort keys keep insertion order
    /// in `Asc` and reverse insertion order in `Desc`.
    pub fn apply(&self, docs: impl IntoIterator<Item = Document>) -> Vec<Document> {
        let mut out: Vec<Document> = docs.into_iter().filter(|d| self.matches(&d.data)).collect();

        if let Some((field, direction)) = &self.order {
            match direction {
                Direction::Asc => {
                    out.sort_by(|a, b| compare_values(a.data.get(field), b.data.get(field)));
                }
                Direction::Desc => {
                    out.reverse();
                    out.sort_by(|a, b| compare_values(b.data.get(field), a.data.get(field)));
                }
            }
        }

        if let Some(n) = self.limit {
            out.truncate(n);
        }
        out
    }
}

/// Total ordering over optional JSON values.
///
/// Values rank by kind first: missing, null, bool, number, timestamp string,
/// other string, then arrays and objects (which compare equal to each other).
/// Within a kind, numbers compare numerically, RFC 3339 strings
/// chronologically (chrono's serde output has variable sub-second digits, so
/// plain string order is not enough) and other strings lexicographically.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (ka, kb) = (SortKey::of(a), SortKey::of(b));
    match (ka, kb) {
        (SortKey::Bool(x), SortKey::Bool(y)) => x.cmp(&y),
        (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(&y),
        (SortKey::Timestamp(x), SortKey::Timestamp(y)) => x.cmp(&y),
        (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
        (ka, kb) => ka.rank().cmp(&kb.rank()),
    }
}

enum SortKey<'a> {
    Missing,
    Null,
    Bool(bool),
    Number(f64),
    Timestamp(DateTime<FixedOffset>),
    Text(&'a str),
    Composite,
}

impl<'a> SortKey<'a> {
    fn of(value: Option<&'a Value>) -> Self {
        match value {
            None => SortKey::Missing,
            Some(Value::Null) => SortKey::Null,
            Some(Value::Bool(b)) => SortKey::Bool(*b),
            Some(Value::Number(n)) => SortKey::Number(n.as_f64().unwrap_or(0.0)),
            Some(Value::String(s)) => match parse_timestamp(s) {
                Some(ts) => SortKey::Timestamp(ts),
                None => SortKey::Text(s),
            },
            Some(Value::Array(_) | Value::Object(_)) => SortKey::Composite,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            SortKey::Missing => 0,
            SortKey::Null => 1,
            SortKey::Bool(_) => 2,
            SortKey::Number(_) => 3,
            SortKey::Timestamp(_) => 4,
            SortKey::Text(_) => 5,
            SortKey::Composite => 6,
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

// ── Store trait ───────────────────────────────────────────────────────────────

/// Keyed document collection backend.
///
/// Calls are blocking; async code wraps them with [`blocking`].
/// No operation is transactional across calls: a read followed by a write is
/// last-write-wins against concurrent writers.
pub trait DocumentStore: Send + Sync {
    /// Backend name for log output (e.g. `"memory"`).
    fn backend(&self) -> &str;

    /// Insert a new document and return its generated id.
    fn insert(&self, collection: &str, data: Value) -> Result<String, StoreError>;

    /// Fetch one document; `Ok(None)` when it does not exist.
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Replace (or create) the document body under `id`.
    fn set(&self, collection: &str, id: &str, data: Value) -> Result<(), StoreError>;

    /// Merge `fields` into an existing document. [`StoreError::NotFound`] if absent.
    fn update(&self, collection: &str, id: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Run `query` against a collection. A missing collection is empty.
    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;
}

/// Run a store call on `spawn_blocking` so async callers never block a worker.
pub async fn blocking<T, F>(store: &Arc<dyn DocumentStore>, op: &'static str, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce(&dyn DocumentStore) -> Result<T, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || f(store.as_ref()))
        .await
        .map_err(|e| StoreError::Unavailable(format!("{op} join: {e}")))?
}

/// Build the configured backend. `json` stores live under `{work_dir}/store`.
pub fn open(config: &StoreConfig, work_dir: &Path) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let store: Arc<dyn DocumentStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryDocumentStore::new()),
        "json" => Arc::new(JsonFileDocumentStore::open(work_dir.join("store"))?),
        other => {
            return Err(StoreError::Unavailable(format!("unknown store backend: {other}")));
        }
    };
    info!(backend = store.backend(), "document store ready");
    Ok(store)
}
