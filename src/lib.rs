//! Story Personalizer: keeps personalized story documents in step with
//! child profiles.
//!
//! When a child profile changes, every active story template is rendered
//! for that child by substituting placeholder tags with values from the
//! profile, and the results are written back in bounded batches. When a
//! profile is deleted, the child's stories are swept away.

pub mod config;
pub mod core;
pub mod schema;
pub mod store;

pub use crate::config::PersonalizerConfig;
pub use crate::core::pipeline::{Outcome, ProcessReport, StoryPersonalizer};
pub use crate::store::{DocumentStore, InMemoryStore};
