pub mod personalization;
pub mod pipeline;
pub mod substitution;
pub mod sweeper;
pub mod templates;
