/// Document-store seam: the minimal surface the personalizer needs from
/// whatever backend holds profiles, templates and stories.
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde_json::{Map, Value};
use thiserror::Error;

pub mod memory;
pub use memory::InMemoryStore;

/// Upper bound on the number of operations one batch commit may carry.
pub const MAX_BATCH_OPERATIONS: usize = 500;

/// A stored document body.
pub type Document = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("batch of {size} operations exceeds the limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },
    #[error("commit rejected: {0}")]
    CommitRejected(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("invalid trigger path '{0}': expected '<collection>/{{param}}'")]
    InvalidTrigger(String),
}

/// Address of one document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentRef {
    pub collection: String,
    pub id: String,
}

impl DocumentRef {
    pub fn new(collection: &str, id: &str) -> Self {
        Self {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }
}

/// A document as returned by a read.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: String,
    pub data: Document,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Top-level field equals the value.
    Eq { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn matches(&self, document: &Document) -> bool {
        match self {
            Filter::Eq { field, value } => document.get(field) == Some(value),
        }
    }
}

/// A read against one collection. Results come back ordered by document id.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(collection: &str) -> Self {
        Self {
            collection: collection.to_string(),
            filters: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or overwrite a document. With `merge`, only the top-level
    /// fields present in `data` are replaced and the rest are kept.
    /// Fields named in `server_timestamps` are stamped with the commit time.
    Set {
        doc: DocumentRef,
        data: Document,
        merge: bool,
        server_timestamps: Vec<String>,
    },
    /// Remove a document. Removing a missing document is a no-op.
    Delete { doc: DocumentRef },
}

/// Operations committed atomically as one unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, doc: DocumentRef, data: Document) -> &mut Self {
        self.ops.push(WriteOp::Set {
            doc,
            data,
            merge: false,
            server_timestamps: Vec::new(),
        });
        self
    }

    pub fn set_merge(&mut self, doc: DocumentRef, data: Document, server_timestamps: &[&str]) -> &mut Self {
        self.ops.push(WriteOp::Set {
            doc,
            data,
            merge: true,
            server_timestamps: server_timestamps.iter().map(|f| f.to_string()).collect(),
        });
        self
    }

    pub fn delete(&mut self, doc: DocumentRef) -> &mut Self {
        self.ops.push(WriteOp::Delete { doc });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn operations(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_operations(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// One committed change to a watched document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChange {
    pub id: String,
    pub before: Option<Document>,
    pub after: Option<Document>,
}

/// A watched document path such as `children/{childId}`: every document
/// directly inside `collection`, with its id bound to `param`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerPath {
    pub collection: String,
    pub param: String,
}

impl TriggerPath {
    pub fn parse(pattern: &str) -> Result<TriggerPath, StoreError> {
        let invalid = || StoreError::InvalidTrigger(pattern.to_string());
        let (collection, last) = pattern.trim_matches('/').rsplit_once('/').ok_or_else(invalid)?;
        let param = last
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(invalid)?;
        if collection.is_empty() || param.is_empty() || collection.contains(['{', '}']) {
            return Err(invalid());
        }
        Ok(TriggerPath {
            collection: collection.to_string(),
            param: param.to_string(),
        })
    }
}

/// The store operations the personalizer relies on.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read the documents matching a query, ordered by id.
    async fn get(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, StoreError>;

    /// Apply every operation in the batch, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Subscribe to committed changes under a trigger path. The stream ends
    /// when the store shuts down.
    async fn watch(&self, trigger: &TriggerPath) -> Result<BoxStream<'static, DocumentChange>, StoreError>;
}
