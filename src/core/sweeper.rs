/// Deletion sweeper: removes every generated story for a deleted child.
use std::sync::Arc;

use tracing::debug;

use crate::schema::story::CHILD_ID_FIELD;
use crate::store::{DocumentRef, DocumentStore, Filter, Query, StoreError, WriteBatch};

/// What one sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: usize,
    pub batches: usize,
}

pub struct DeletionSweeper {
    store: Arc<dyn DocumentStore>,
    collection: String,
    page_size: usize,
}

impl DeletionSweeper {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &str, page_size: usize) -> Self {
        Self {
            store,
            collection: collection.to_string(),
            page_size: page_size.max(1),
        }
    }

    /// Delete the child's stories page by page, one batch commit per page.
    /// Stops after a short or empty page. Pages are not one transaction: an
    /// interrupted sweep leaves the remainder for the next call.
    pub async fn sweep(&self, child_id: &str) -> Result<SweepReport, StoreError> {
        let query = Query::collection(&self.collection)
            .filter(Filter::eq(CHILD_ID_FIELD, child_id))
            .limit(self.page_size);
        let mut report = SweepReport::default();

        loop {
            let page = self.store.get(&query).await?;
            if page.is_empty() {
                break;
            }

            let mut batch = WriteBatch::new();
            for doc in &page {
                batch.delete(DocumentRef::new(&self.collection, &doc.id));
            }
            self.store.commit(batch).await?;

            report.deleted += page.len();
            report.batches += 1;
            debug!(child_id, page = report.batches, removed = page.len(), "deleted story page");

            if page.len() < self.page_size {
                break;
            }
        }

        Ok(report)
    }
}
