/// The regeneration pipeline: profile change → stories.
///
/// Decides what a profile change calls for, then either sweeps the child's
/// stories or renders every active template and writes the results in
/// bounded batches.
use std::sync::Arc;

use futures_util::future::join_all;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, PersonalizerConfig};
use crate::core::personalization::build_personalization;
use crate::core::substitution::personalize;
use crate::core::sweeper::{DeletionSweeper, SweepReport};
use crate::core::templates::TemplateSource;
use crate::schema::change::ProfileChange;
use crate::schema::personalization::PersonalizationSnapshot;
use crate::schema::profile::{personalization_changed, ChildProfile};
use crate::schema::story::{GeneratedStory, StoryStatus, GENERATED_AT_FIELD};
use crate::schema::template::StoryTemplate;
use crate::store::{Document, DocumentChange, DocumentRef, DocumentStore, StoreError, WriteBatch};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("story serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{failed} of {total} batch commits failed: {source}")]
    PartialCommit {
        failed: usize,
        total: usize,
        #[source]
        source: StoreError,
    },
}

/// What a profile change calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Only non-personalization fields changed.
    Skip,
    /// The profile is gone.
    Delete,
    /// The profile is new or its personalization changed.
    Generate,
}

/// Decide how to react to a change.
pub fn decide(change: &ProfileChange) -> Action {
    match (&change.before, &change.after) {
        (Some(before), Some(after)) if !personalization_changed(before, after) => Action::Skip,
        (_, None) => Action::Delete,
        _ => Action::Generate,
    }
}

/// Result of a completed generation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationReport {
    pub stories: usize,
    pub batches: usize,
}

/// Tally of a `process` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Changes whose handling finished.
    pub handled: usize,
    /// Changes that ended in `Outcome::Failed` or a panicked task.
    pub failed: usize,
    /// Most handler tasks alive at once.
    pub peak_in_flight: usize,
}

/// How handling one change ended.
#[derive(Debug)]
pub enum Outcome {
    Skipped,
    Deleted(SweepReport),
    NoTemplates,
    Generated(GenerationReport),
    /// The pass failed. Already-committed batches stay; nothing is retried.
    Failed(PipelineError),
}

impl Outcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Reacts to child profile changes by regenerating or removing that
/// child's stories. Built via `StoryPersonalizer::builder()`.
pub struct StoryPersonalizer {
    store: Arc<dyn DocumentStore>,
    config: PersonalizerConfig,
    templates: TemplateSource,
    sweeper: DeletionSweeper,
}

/// Builder for constructing a `StoryPersonalizer`.
pub struct StoryPersonalizerBuilder {
    store: Arc<dyn DocumentStore>,
    config: Option<PersonalizerConfig>,
}

impl StoryPersonalizer {
    pub fn builder(store: Arc<dyn DocumentStore>) -> StoryPersonalizerBuilder {
        StoryPersonalizerBuilder {
            store,
            config: None,
        }
    }

    pub fn config(&self) -> &PersonalizerConfig {
        &self.config
    }

    /// Handle one profile change to completion. Errors are logged and
    /// reported in the outcome, never raised.
    pub async fn handle(&self, change: ProfileChange) -> Outcome {
        let child_id = change.child_id.as_str();

        let result = match decide(&change) {
            Action::Skip => {
                info!(child_id, "skipping: no relevant changes detected");
                return Outcome::Skipped;
            }
            Action::Delete => {
                info!(child_id, "removing stories for deleted child");
                self.remove_stories(child_id).await.map(Outcome::Deleted)
            }
            Action::Generate => {
                let empty = Document::new();
                let profile = change.after.as_ref().unwrap_or(&empty);
                self.regenerate(child_id, profile).await.map(|report| match report {
                    Some(report) => {
                        info!(child_id, stories = report.stories, batches = report.batches, "processed stories");
                        Outcome::Generated(report)
                    }
                    None => Outcome::NoTemplates,
                })
            }
        };

        result.unwrap_or_else(|e| {
            error!(child_id, error = %e, "critical failure");
            Outcome::Failed(e)
        })
    }

    /// Render every active template for the child and write the stories.
    /// Returns `None` when there are no active templates.
    pub async fn regenerate(
        &self,
        child_id: &str,
        profile: &Document,
    ) -> Result<Option<GenerationReport>, PipelineError> {
        let snapshot = build_personalization(&ChildProfile::from_document(profile));
        let templates = self.templates.fetch_active().await;

        if templates.is_empty() {
            info!(child_id, "no active templates found");
            return Ok(None);
        }

        let batches = self.plan_batches(child_id, &snapshot, &templates)?;
        let report = GenerationReport {
            stories: templates.len(),
            batches: batches.len(),
        };
        self.commit_all(batches).await?;
        Ok(Some(report))
    }

    /// Delete every story generated for the child.
    pub async fn remove_stories(&self, child_id: &str) -> Result<SweepReport, PipelineError> {
        let report = self.sweeper.sweep(child_id).await?;
        debug!(child_id, deleted = report.deleted, batches = report.batches, "sweep finished");
        Ok(report)
    }

    /// Render the stories and group their writes into batches of at most
    /// `max_batch_size` operations.
    fn plan_batches(
        &self,
        child_id: &str,
        snapshot: &PersonalizationSnapshot,
        templates: &[StoryTemplate],
    ) -> Result<Vec<WriteBatch>, PipelineError> {
        let collection = &self.config.stories_collection;
        let mut batches: Vec<WriteBatch> = Vec::new();

        for template in templates {
            let story = GeneratedStory {
                child_id: child_id.to_string(),
                story_template_id: template.id.clone(),
                generated_content: personalize(template, snapshot),
                title: template.title.clone(),
                cover_image_url: template.cover_image_url.clone(),
                generated_at: None,
                personalization_snapshot: snapshot.clone(),
                status: StoryStatus::Ready,
            };

            if batches.last().map_or(true, |b| b.len() >= self.config.max_batch_size) {
                batches.push(WriteBatch::new());
            }
            if let Some(batch) = batches.last_mut() {
                batch.set_merge(
                    DocumentRef::new(collection, &story.key()),
                    story.to_document()?,
                    &[GENERATED_AT_FIELD],
                );
            }
        }

        Ok(batches)
    }

    /// Commit every batch concurrently. Each commit runs to completion even
    /// if another fails; the first failure is reported.
    async fn commit_all(&self, batches: Vec<WriteBatch>) -> Result<(), PipelineError> {
        let total = batches.len();
        let results = join_all(batches.into_iter().map(|batch| self.store.commit(batch))).await;

        let mut failures = results.into_iter().filter_map(Result::err);
        match failures.next() {
            None => Ok(()),
            Some(first) => {
                let failed = 1 + failures.count();
                warn!(failed, total, "batch commits failed");
                Err(PipelineError::PartialCommit {
                    failed,
                    total,
                    source: first,
                })
            }
        }
    }

    /// Watch the configured profile path and handle every change until the
    /// watch stream ends.
    pub async fn run(self: Arc<Self>) -> Result<ProcessReport, PipelineError> {
        let changes = self.watch_profiles().await?;
        Ok(self.process(changes).await)
    }

    /// Subscribe to changes under the configured profile path.
    pub async fn watch_profiles(&self) -> Result<BoxStream<'static, DocumentChange>, PipelineError> {
        let trigger = self.config.trigger()?;
        let changes = self.store.watch(&trigger).await?;
        info!(collection = %trigger.collection, "watching profiles");
        Ok(changes)
    }

    /// Handle each change on its own task. Finished tasks are reaped while
    /// the stream is still open. Returns once the stream ends and every task
    /// has finished.
    pub async fn process(self: Arc<Self>, mut changes: BoxStream<'static, DocumentChange>) -> ProcessReport {
        let mut tasks = JoinSet::new();
        let mut report = ProcessReport::default();
        let mut open = true;

        loop {
            tokio::select! {
                change = changes.next(), if open => match change {
                    Some(change) => {
                        let personalizer = Arc::clone(&self);
                        tasks.spawn(async move { personalizer.handle(ProfileChange::from(change)).await });
                        report.peak_in_flight = report.peak_in_flight.max(tasks.len());
                    }
                    None => open = false,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    report.handled += 1;
                    match joined {
                        Ok(outcome) if outcome.is_failed() => report.failed += 1,
                        Ok(_) => {}
                        Err(e) => {
                            report.failed += 1;
                            error!(error = %e, "change handler panicked");
                        }
                    }
                }
                else => break,
            }
        }

        report
    }
}

impl StoryPersonalizerBuilder {
    pub fn config(mut self, config: PersonalizerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> Result<StoryPersonalizer, PipelineError> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let templates = TemplateSource::new(Arc::clone(&self.store), &config.templates_collection);
        let sweeper = DeletionSweeper::new(
            Arc::clone(&self.store),
            &config.stories_collection,
            config.max_batch_size,
        );

        Ok(StoryPersonalizer {
            store: self.store,
            config,
            templates,
            sweeper,
        })
    }
}
