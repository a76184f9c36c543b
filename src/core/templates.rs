/// Template source: the active story templates.
use std::sync::Arc;

use tracing::{error, warn};

use crate::schema::template::StoryTemplate;
use crate::store::{DocumentStore, Filter, Query};

pub struct TemplateSource {
    store: Arc<dyn DocumentStore>,
    collection: String,
}

impl TemplateSource {
    pub fn new(store: Arc<dyn DocumentStore>, collection: &str) -> Self {
        Self {
            store,
            collection: collection.to_string(),
        }
    }

    /// All templates flagged active, in store order.
    ///
    /// Never fails: a read error is logged and reported as no templates, and
    /// a template document that cannot be read is skipped.
    pub async fn fetch_active(&self) -> Vec<StoryTemplate> {
        let query = Query::collection(&self.collection).filter(Filter::eq("isActive", true));
        let snapshots = match self.store.get(&query).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                error!(collection = %self.collection, error = %e, "template fetch failed");
                return Vec::new();
            }
        };

        snapshots
            .iter()
            .filter_map(|snapshot| match StoryTemplate::from_snapshot(snapshot) {
                Ok(template) => Some(template),
                Err(e) => {
                    warn!(template_id = %snapshot.id, error = %e, "skipping unreadable template");
                    None
                }
            })
            .collect()
    }
}
