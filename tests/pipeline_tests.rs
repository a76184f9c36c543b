/// Pipeline integration tests: profile changes in, stories out.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use story_personalizer::core::pipeline::{GenerationReport, PipelineError};
use story_personalizer::core::sweeper::SweepReport;
use story_personalizer::schema::change::ProfileChange;
use story_personalizer::schema::story::{story_key, GeneratedStory, StoryStatus};
use story_personalizer::store::{Document, DocumentStore, Filter, Query, StoreError};
use story_personalizer::{InMemoryStore, Outcome, PersonalizerConfig, StoryPersonalizer};

const TEMPLATES: &str = "storyTemplates";
const STORIES: &str = "personalizedStories";

fn doc(value: Value) -> Document {
    value.as_object().cloned().unwrap()
}

fn amara() -> Document {
    let raw = std::fs::read_to_string(Path::new("tests/fixtures/profiles/amara.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

fn personalizer(store: &Arc<InMemoryStore>) -> StoryPersonalizer {
    StoryPersonalizer::builder(store.clone()).build().unwrap()
}

async fn seed_templates(store: &InMemoryStore, count: usize) {
    for i in 0..count {
        let data = json!({
            "title": format!("Story {}", i),
            "isActive": true,
            "rawContent": "[CHILD_NAME] and [PET_NAME_1] explored [REGION].",
        });
        store.put(TEMPLATES, &format!("tpl-{:04}", i), doc(data)).await;
    }
}

async fn story(store: &InMemoryStore, child_id: &str, template_id: &str) -> GeneratedStory {
    let stored = store
        .document(STORIES, &story_key(child_id, template_id))
        .await
        .unwrap();
    GeneratedStory::from_document(&stored).unwrap()
}

async fn stories_for(store: &InMemoryStore, child_id: &str) -> usize {
    store
        .get(&Query::collection(STORIES).filter(Filter::eq("childId", child_id)))
        .await
        .unwrap()
        .len()
}

#[tokio::test]
async fn new_profile_gets_one_story_per_active_template() {
    let store = Arc::new(InMemoryStore::new());
    store
        .put(
            TEMPLATES,
            "moon",
            doc(json!({
                "title": "The Moon Trip",
                "coverImageUrl": "https://img.example/moon.png",
                "isActive": true,
                "rawContent": "[CHILD_NAME] flew to the moon with [MOTHER_NAME].",
                "ageRange": "4-7"
            })),
        )
        .await;
    store
        .put(
            TEMPLATES,
            "sea",
            doc(json!({ "title": "Sea", "isActive": true, "rawContent": "[PRONOUN_SUBJECTIVE] swam." })),
        )
        .await;
    store
        .put(
            TEMPLATES,
            "draft",
            doc(json!({ "isActive": false, "rawContent": "unfinished" })),
        )
        .await;

    let outcome = personalizer(&store)
        .handle(ProfileChange::created("kid-1", amara()))
        .await;

    assert!(matches!(
        outcome,
        Outcome::Generated(GenerationReport { stories: 2, batches: 1 })
    ));
    assert_eq!(store.count(STORIES).await, 2);

    let moon = story(&store, "kid-1", "moon").await;
    assert_eq!(moon.child_id, "kid-1");
    assert_eq!(moon.story_template_id, "moon");
    assert_eq!(moon.generated_content, "Amara flew to the moon with Ngozi.");
    assert_eq!(moon.title.as_deref(), Some("The Moon Trip"));
    assert_eq!(moon.cover_image_url.as_deref(), Some("https://img.example/moon.png"));
    assert_eq!(moon.status, StoryStatus::Ready);
    assert!(moon.generated_at.is_some());
    assert_eq!(moon.personalization_snapshot.name, "Amara");
    assert_eq!(moon.personalization_snapshot.interests, vec!["painting", "owls", "drums"]);

    let sea = story(&store, "kid-1", "sea").await;
    assert_eq!(sea.generated_content, "she swam.");
    assert!(store.document(STORIES, "kid-1-draft").await.is_none());
}

#[tokio::test]
async fn irrelevant_update_writes_nothing() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 3).await;

    let before = amara();
    let mut after = amara();
    after.insert("avatarColor".to_string(), json!("purple"));
    after.insert("lastLogin".to_string(), json!(1_700_000_000));

    let outcome = personalizer(&store)
        .handle(ProfileChange::updated("kid-1", before, after))
        .await;

    assert!(matches!(outcome, Outcome::Skipped));
    assert_eq!(store.commit_count(), 0);
    assert_eq!(store.count(STORIES).await, 0);
}

#[tokio::test]
async fn regeneration_overwrites_in_place() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 4).await;
    let personalizer = personalizer(&store);

    personalizer
        .handle(ProfileChange::created("kid-1", amara()))
        .await;
    let first = story(&store, "kid-1", "tpl-0002").await;

    // A field owned by another consumer survives regeneration.
    let key = story_key("kid-1", "tpl-0002");
    let mut read = store.document(STORIES, &key).await.unwrap();
    read.insert("readAt".to_string(), json!("2026-01-01T00:00:00Z"));
    store.put(STORIES, &key, read).await;

    let mut renamed = amara();
    renamed.insert("name".to_string(), json!("Ama"));
    let outcome = personalizer
        .handle(ProfileChange::updated("kid-1", amara(), renamed))
        .await;
    assert!(matches!(outcome, Outcome::Generated(_)));

    assert_eq!(store.count(STORIES).await, 4);
    let second = story(&store, "kid-1", "tpl-0002").await;
    assert_eq!(first.generated_content, "Amara and Kiki explored Lagos.");
    assert_eq!(second.generated_content, "Ama and Kiki explored Lagos.");
    assert_eq!(second.personalization_snapshot.name, "Ama");
    let stored = store.document(STORIES, &key).await.unwrap();
    assert_eq!(stored["readAt"], json!("2026-01-01T00:00:00Z"));
}

#[tokio::test]
async fn dropped_title_and_cover_are_cleared_on_regeneration() {
    let store = Arc::new(InMemoryStore::new());
    let moon = json!({
        "title": "The Moon Trip",
        "coverImageUrl": "https://img.example/moon.png",
        "isActive": true,
        "rawContent": "[CHILD_NAME] flew to the moon.",
    });
    store.put(TEMPLATES, "moon", doc(moon)).await;
    let personalizer = personalizer(&store);

    personalizer.handle(ProfileChange::created("kid-1", amara())).await;
    assert_eq!(story(&store, "kid-1", "moon").await.title.as_deref(), Some("The Moon Trip"));

    store
        .put(TEMPLATES, "moon", doc(json!({ "isActive": true, "rawContent": "[CHILD_NAME] flew to the moon." })))
        .await;
    let mut renamed = amara();
    renamed.insert("name".to_string(), json!("Ama"));
    personalizer
        .handle(ProfileChange::updated("kid-1", amara(), renamed))
        .await;

    let stored = store.document(STORIES, &story_key("kid-1", "moon")).await.unwrap();
    assert_eq!(stored["title"], Value::Null);
    assert_eq!(stored["coverImageUrl"], Value::Null);
    assert_eq!(stored["generatedContent"], json!("Ama flew to the moon."));
}

#[tokio::test]
async fn unchanged_profile_regenerates_identical_content() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 2).await;
    let personalizer = personalizer(&store);

    personalizer.regenerate("kid-1", &amara()).await.unwrap();
    let first = story(&store, "kid-1", "tpl-0001").await;
    personalizer.regenerate("kid-1", &amara()).await.unwrap();
    let second = story(&store, "kid-1", "tpl-0001").await;

    assert_eq!(first.generated_content, second.generated_content);
    assert_eq!(first.personalization_snapshot, second.personalization_snapshot);
    assert_eq!(store.count(STORIES).await, 2);
}

#[tokio::test]
async fn stored_snapshot_never_mixes_passes() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 1).await;
    let personalizer = personalizer(&store);

    personalizer.regenerate("kid-1", &amara()).await.unwrap();

    let mut moved = amara();
    moved.remove("culture");
    personalizer.regenerate("kid-1", &moved).await.unwrap();

    let latest = story(&store, "kid-1", "tpl-0000").await;
    assert_eq!(latest.personalization_snapshot.culture.region, None);
    assert!(latest.personalization_snapshot.culture.holidays.is_empty());
    assert_eq!(latest.generated_content, "Amara and Kiki explored their region.");
}

#[tokio::test]
async fn large_template_set_is_written_in_bounded_batches() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 1200).await;

    let outcome = personalizer(&store)
        .handle(ProfileChange::created("kid-1", amara()))
        .await;

    assert!(matches!(
        outcome,
        Outcome::Generated(GenerationReport { stories: 1200, batches: 3 })
    ));
    assert_eq!(store.commit_count(), 3);
    assert_eq!(store.count(STORIES).await, 1200);
}

#[tokio::test]
async fn failed_batch_leaves_other_batches_committed() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 1200).await;
    store.fail_commit(1);

    let outcome = personalizer(&store)
        .handle(ProfileChange::created("kid-1", amara()))
        .await;

    match outcome {
        Outcome::Failed(PipelineError::PartialCommit { failed, total, source }) => {
            assert_eq!(failed, 1);
            assert_eq!(total, 3);
            assert!(matches!(source, StoreError::CommitRejected(_)));
        }
        other => panic!("expected a partial commit failure, got {:?}", other),
    }
    assert_eq!(store.commit_count(), 3);
    assert_eq!(store.count(STORIES).await, 700);
    assert!(store.document(STORIES, "kid-1-tpl-0499").await.is_some());
    assert!(store.document(STORIES, "kid-1-tpl-0500").await.is_none());
    assert!(store.document(STORIES, "kid-1-tpl-1000").await.is_some());
}

#[tokio::test]
async fn unavailable_templates_mean_nothing_to_generate() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 3).await;
    store.fail_reads(true);

    let outcome = personalizer(&store)
        .handle(ProfileChange::created("kid-1", amara()))
        .await;

    assert!(matches!(outcome, Outcome::NoTemplates));
    assert_eq!(store.commit_count(), 0);
}

#[tokio::test]
async fn no_active_templates_means_nothing_to_generate() {
    let store = Arc::new(InMemoryStore::new());
    let outcome = personalizer(&store)
        .handle(ProfileChange::created("kid-1", amara()))
        .await;
    assert!(matches!(outcome, Outcome::NoTemplates));
}

#[tokio::test]
async fn deleted_profile_sweeps_all_its_stories() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 1200).await;
    let personalizer = personalizer(&store);

    personalizer
        .handle(ProfileChange::created("kid-1", amara()))
        .await;
    personalizer
        .handle(ProfileChange::created("kid-2", doc(json!({ "name": "Leo" }))))
        .await;
    assert_eq!(store.count(STORIES).await, 2400);
    let commits_before = store.commit_count();

    let outcome = personalizer
        .handle(ProfileChange::deleted("kid-1", amara()))
        .await;

    assert!(matches!(
        outcome,
        Outcome::Deleted(SweepReport { deleted: 1200, batches: 3 })
    ));
    assert_eq!(store.commit_count() - commits_before, 3);
    assert_eq!(stories_for(&store, "kid-1").await, 0);
    assert_eq!(stories_for(&store, "kid-2").await, 1200);
}

#[tokio::test]
async fn failed_sweep_is_reported_and_rerun_completes() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 600).await;
    let personalizer = personalizer(&store);
    personalizer
        .handle(ProfileChange::created("kid-1", amara()))
        .await;

    // Commits 0 and 1 wrote the stories; fail the second delete page.
    store.fail_commit(3);
    let outcome = personalizer
        .handle(ProfileChange::deleted("kid-1", amara()))
        .await;
    assert!(outcome.is_failed());
    assert_eq!(stories_for(&store, "kid-1").await, 100);

    let outcome = personalizer
        .handle(ProfileChange::deleted("kid-1", amara()))
        .await;
    assert!(matches!(
        outcome,
        Outcome::Deleted(SweepReport { deleted: 100, batches: 1 })
    ));
    assert_eq!(stories_for(&store, "kid-1").await, 0);
}

#[tokio::test]
async fn watch_loop_reacts_to_profile_writes() {
    let store = Arc::new(InMemoryStore::new());
    seed_templates(&store, 3).await;
    let personalizer = Arc::new(personalizer(&store));

    let changes = personalizer.watch_profiles().await.unwrap();
    let worker = tokio::spawn(personalizer.clone().process(changes));
    store.put("children", "kid-1", amara()).await;
    store.put("children", "kid-2", doc(json!({ "name": "Leo" }))).await;
    store.close_watchers().await;
    let report = worker.await.unwrap();

    assert_eq!(report.handled, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(stories_for(&store, "kid-1").await, 3);
    assert_eq!(story(&store, "kid-2", "tpl-0000").await.generated_content, "Leo and Buddy explored their region.");

    let changes = personalizer.watch_profiles().await.unwrap();
    let worker = tokio::spawn(personalizer.clone().process(changes));
    store.remove("children", "kid-1").await;
    store.close_watchers().await;
    worker.await.unwrap();

    assert_eq!(stories_for(&store, "kid-1").await, 0);
    assert_eq!(stories_for(&store, "kid-2").await, 3);
}

#[tokio::test]
async fn config_file_sets_collections_and_batch_size() {
    let config = PersonalizerConfig::load_from_ron(Path::new("tests/fixtures/personalizer.ron")).unwrap();
    assert_eq!(config.trigger().unwrap().collection, "households/h1/children");

    let store = Arc::new(InMemoryStore::new());
    for id in ["a", "b", "c", "d", "e"] {
        store
            .put(
                "templates",
                id,
                doc(json!({ "isActive": true, "rawContent": "Hello [CHILD_NAME]" })),
            )
            .await;
    }
    let personalizer = StoryPersonalizer::builder(store.clone())
        .config(config)
        .build()
        .unwrap();

    let outcome = personalizer
        .handle(ProfileChange::created("kid-9", doc(json!({}))))
        .await;

    assert!(matches!(
        outcome,
        Outcome::Generated(GenerationReport { stories: 5, batches: 3 })
    ));
    let hello = store.document("stories", "kid-9-c").await.unwrap();
    assert_eq!(hello["generatedContent"], json!("Hello [Unknown Child]"));

    let outcome = personalizer
        .handle(ProfileChange::deleted("kid-9", Document::new()))
        .await;
    assert!(matches!(
        outcome,
        Outcome::Deleted(SweepReport { deleted: 5, batches: 3 })
    ));
}
