//! CLI command implementations

pub mod get;
pub mod ingest;
pub mod list;
pub mod query;
pub mod status;

use anyhow::{Context, Result};
use semantic_docstore::{Config, DefaultService};

/// Open the configured store with the built-in embedding model
fn open_service(config: &Config) -> Result<DefaultService> {
    DefaultService::open(config)
        .with_context(|| format!("Failed to open store at {}", config.db_path.display()))
}

/// Truncate text for display (char-aware for Unicode)
fn preview(text: &str, max_chars: usize) -> String {
    let single_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() > max_chars {
        format!("{}...", single_line.chars().take(max_chars).collect::<String>())
    } else {
        single_line
    }
}
