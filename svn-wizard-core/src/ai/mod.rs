// ai module - commit message summarisation behind the `Summarizer` trait

pub mod api;
pub mod prompts;
pub mod validation;

// re-export key public items for convenient access
pub use api::{OpenRouterSummarizer, Summarizer};
pub use validation::{extract_commit_message, validate_commit_message};
