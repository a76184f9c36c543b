/// Story Preview: render one template against one child profile.
///
/// Usage: story_preview --template <file> [--profile <file.json>] [--config <file.ron>] [--store]
///
/// Without `--store` the template is rendered directly. With `--store` the
/// profile goes through the full regeneration pass against an in-memory
/// store and the stored story document is printed.
use std::path::Path;
use std::process;
use std::sync::Arc;

use serde_json::{json, Value};
use story_personalizer::core::personalization::build_personalization;
use story_personalizer::core::substitution::{personalize_text, scan_placeholders};
use story_personalizer::schema::change::ProfileChange;
use story_personalizer::schema::profile::ChildProfile;
use story_personalizer::schema::story::story_key;
use story_personalizer::store::Document;
use story_personalizer::{InMemoryStore, Outcome, PersonalizerConfig, StoryPersonalizer};
use tracing_subscriber::EnvFilter;

const PREVIEW_CHILD_ID: &str = "preview-child";
const PREVIEW_TEMPLATE_ID: &str = "preview-template";

fn print_usage() {
    println!("Usage: story_preview --template <file> [--profile <file.json>] [--config <file.ron>] [--store]");
    println!();
    println!("  --template  template text containing [TAG] placeholders");
    println!("  --profile   child profile document as a JSON object (default: empty profile)");
    println!("  --config    personalizer config in RON (used with --store)");
    println!("  --store     run the full regeneration pass and print the stored story");
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut template_path = None;
    let mut profile_path = None;
    let mut config_path = None;
    let mut through_store = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--template" if i + 1 < args.len() => {
                i += 1;
                template_path = Some(args[i].clone());
            }
            "--profile" if i + 1 < args.len() => {
                i += 1;
                profile_path = Some(args[i].clone());
            }
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--store" => through_store = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(template_path) = template_path else {
        eprintln!("ERROR: --template is required");
        process::exit(1);
    };

    let raw = std::fs::read_to_string(&template_path).unwrap_or_else(|e| {
        eprintln!("ERROR: Failed to read template '{}': {}", template_path, e);
        process::exit(1);
    });

    let profile = match profile_path {
        Some(ref path) => load_profile(Path::new(path)),
        None => Document::new(),
    };

    let config = match config_path {
        Some(ref path) => PersonalizerConfig::load_from_ron(Path::new(path)).unwrap_or_else(|e| {
            eprintln!("ERROR: Failed to load config '{}': {}", path, e);
            process::exit(1);
        }),
        None => PersonalizerConfig::default(),
    };

    if through_store {
        preview_through_store(config, &raw, profile).await;
    } else {
        preview_direct(&raw, &profile);
    }
}

fn load_profile(path: &Path) -> Document {
    let text = std::fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("ERROR: Failed to read profile '{}': {}", path.display(), e);
        process::exit(1);
    });
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(document)) => document,
        Ok(_) => {
            eprintln!("ERROR: Profile '{}' is not a JSON object", path.display());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("ERROR: Failed to parse profile '{}': {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn preview_direct(raw: &str, profile: &Document) {
    let snapshot = build_personalization(&ChildProfile::from_document(profile));
    let rendered = personalize_text(raw, &snapshot);

    println!("--- Personalization ---");
    match serde_json::to_string_pretty(&snapshot) {
        Ok(text) => println!("{}", text),
        Err(e) => println!("(unprintable: {})", e),
    }

    println!("\n--- Story ---");
    println!("{}", rendered);
    println!("--- End ---\n");

    let leftover = scan_placeholders(&rendered);
    if leftover.is_empty() {
        println!("All placeholders resolved.");
    } else {
        println!("Unresolved placeholders:");
        for placeholder in leftover {
            println!("  [{}] at byte {}", placeholder.name, placeholder.offset);
        }
    }
}

async fn preview_through_store(config: PersonalizerConfig, raw: &str, profile: Document) {
    let store = Arc::new(InMemoryStore::new());
    let template = json!({
        "title": "Preview",
        "isActive": true,
        "rawContent": raw,
    });
    if let Value::Object(template) = template {
        store
            .put(&config.templates_collection, PREVIEW_TEMPLATE_ID, template)
            .await;
    }

    let personalizer = match StoryPersonalizer::builder(store.clone()).config(config).build() {
        Ok(personalizer) => personalizer,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
    };

    match personalizer
        .handle(ProfileChange::created(PREVIEW_CHILD_ID, profile))
        .await
    {
        Outcome::Generated(report) => {
            println!("Wrote {} stories in {} batches", report.stories, report.batches);
        }
        Outcome::Failed(e) => {
            eprintln!("ERROR: {}", e);
            process::exit(1);
        }
        other => println!("Outcome: {:?}", other),
    }

    let key = story_key(PREVIEW_CHILD_ID, PREVIEW_TEMPLATE_ID);
    match store.document(&personalizer.config().stories_collection, &key).await {
        Some(story) => match serde_json::to_string_pretty(&story) {
            Ok(text) => println!("{}", text),
            Err(e) => println!("(unprintable: {})", e),
        },
        None => println!("No story stored under '{}'", key),
    }
}
