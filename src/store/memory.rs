use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::Mutex;

use super::{
    Document, DocumentChange, DocumentRef, DocumentSnapshot, DocumentStore, Query, StoreError,
    TriggerPath, WriteBatch, WriteOp, MAX_BATCH_OPERATIONS,
};

/// In-memory document store.
///
/// Collections are ordered by document id, batch commits apply atomically
/// under one lock, and committed changes fan out to watchers. Reads and
/// individual commits can be made to fail for exercising error paths.
///
/// NOTE: Not durable. Meant for tests, tools and local runs.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    commits: AtomicUsize,
    fail_reads: AtomicBool,
    failing_commits: std::sync::Mutex<BTreeSet<usize>>,
}

#[derive(Default)]
struct State {
    collections: FxHashMap<String, BTreeMap<String, Document>>,
    watchers: Vec<Watcher>,
}

struct Watcher {
    collection: String,
    sender: UnboundedSender<DocumentChange>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a document directly, as an upstream user would. Watchers are
    /// notified; the commit counter is not touched.
    pub async fn put(&self, collection: &str, id: &str, data: Document) {
        let mut batch = WriteBatch::new();
        batch.set(DocumentRef::new(collection, id), data);
        self.apply(batch.into_operations(), Utc::now()).await;
    }

    /// Delete a document directly, as an upstream user would.
    pub async fn remove(&self, collection: &str, id: &str) {
        let mut batch = WriteBatch::new();
        batch.delete(DocumentRef::new(collection, id));
        self.apply(batch.into_operations(), Utc::now()).await;
    }

    pub async fn document(&self, collection: &str, id: &str) -> Option<Document> {
        let state = self.state.lock().await;
        state.collections.get(collection)?.get(id).cloned()
    }

    pub async fn count(&self, collection: &str) -> usize {
        let state = self.state.lock().await;
        state.collections.get(collection).map_or(0, BTreeMap::len)
    }

    /// End every open watch stream.
    pub async fn close_watchers(&self) {
        self.state.lock().await.watchers.clear();
    }

    /// Number of calls to `commit`, successful or not.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    /// Make every read fail until switched off again.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Reject the commit with the given sequence number (counting from zero
    /// over all calls to `commit`).
    pub fn fail_commit(&self, sequence: usize) {
        if let Ok(mut failing) = self.failing_commits.lock() {
            failing.insert(sequence);
        }
    }

    fn commit_should_fail(&self, sequence: usize) -> bool {
        self.failing_commits
            .lock()
            .map(|failing| failing.contains(&sequence))
            .unwrap_or(false)
    }

    async fn apply(&self, ops: Vec<WriteOp>, now: DateTime<Utc>) {
        let stamp = Value::String(now.to_rfc3339_opts(chrono::SecondsFormat::Micros, true));
        let mut state = self.state.lock().await;
        let mut changes: Vec<(String, DocumentChange)> = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::Set {
                    doc,
                    data,
                    merge,
                    server_timestamps,
                } => {
                    let collection = state.collections.entry(doc.collection.clone()).or_default();
                    let before = collection.get(&doc.id).cloned();
                    let mut after = match (&before, merge) {
                        (Some(existing), true) => {
                            let mut merged = existing.clone();
                            merged.extend(data);
                            merged
                        }
                        _ => data,
                    };
                    for field in server_timestamps {
                        after.insert(field, stamp.clone());
                    }
                    collection.insert(doc.id.clone(), after.clone());
                    changes.push((
                        doc.collection,
                        DocumentChange {
                            id: doc.id,
                            before,
                            after: Some(after),
                        },
                    ));
                }
                WriteOp::Delete { doc } => {
                    let before = state
                        .collections
                        .get_mut(&doc.collection)
                        .and_then(|collection| collection.remove(&doc.id));
                    if before.is_some() {
                        changes.push((
                            doc.collection,
                            DocumentChange {
                                id: doc.id,
                                before,
                                after: None,
                            },
                        ));
                    }
                }
            }
        }

        state.watchers.retain(|watcher| {
            changes
                .iter()
                .filter(|(collection, _)| *collection == watcher.collection)
                .all(|(_, change)| watcher.sender.send(change.clone()).is_ok())
        });
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, query: &Query) -> Result<Vec<DocumentSnapshot>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "read of '{}' failed",
                query.collection
            )));
        }

        let state = self.state.lock().await;
        let Some(collection) = state.collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(collection
            .iter()
            .filter(|(_, data)| query.filters.iter().all(|f| f.matches(data)))
            .take(limit)
            .map(|(id, data)| DocumentSnapshot {
                id: id.clone(),
                data: data.clone(),
            })
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let sequence = self.commits.fetch_add(1, Ordering::SeqCst);

        if batch.len() > MAX_BATCH_OPERATIONS {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                limit: MAX_BATCH_OPERATIONS,
            });
        }
        if self.commit_should_fail(sequence) {
            return Err(StoreError::CommitRejected(format!(
                "commit #{} rejected",
                sequence
            )));
        }

        self.apply(batch.into_operations(), Utc::now()).await;
        Ok(())
    }

    async fn watch(&self, trigger: &TriggerPath) -> Result<BoxStream<'static, DocumentChange>, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut state = self.state.lock().await;
        state.watchers.push(Watcher {
            collection: trigger.collection.clone(),
            sender,
        });

        Ok(stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|change| (change, receiver))
        })
        .boxed())
    }
}
