//! Get command - show one document by id

use anyhow::Result;
use colored::Colorize;
use semantic_docstore::{Config, DocumentId};

use super::open_service;

pub fn run(config: &Config, id: i64, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let doc = service.get(DocumentId(id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{} {}", "Document".bold(), doc.id.to_string().cyan());
    for (key, value) in &doc.metadata {
        println!("  {} {}: {}", "→".dimmed(), key, value);
    }
    let created = chrono::DateTime::from_timestamp(doc.created_at, 0)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    println!("  {} ingested: {}", "→".dimmed(), created);
    println!();
    println!("{}", doc.text);

    Ok(())
}
