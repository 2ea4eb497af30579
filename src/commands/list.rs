//! List command - every document in ingestion order

use anyhow::Result;
use colored::Colorize;
use semantic_docstore::Config;

use super::{open_service, preview};

pub fn run(config: &Config, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let documents = service.list_all()?;

    if json {
        let json_documents: Vec<_> = documents
            .iter()
            .map(|d| {
                serde_json::json!({
                    "id": d.id,
                    "filename": d.filename(),
                    "text": d.text,
                    "metadata": d.metadata,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "documents": json_documents }))?
        );
        return Ok(());
    }

    if documents.is_empty() {
        println!("{} Store is empty", "→".dimmed());
        return Ok(());
    }

    println!("{} {} documents", "→".dimmed(), documents.len().to_string().cyan());
    println!();
    for doc in &documents {
        println!(
            "[{}] {}",
            doc.id.to_string().bold(),
            doc.filename().unwrap_or("-").cyan()
        );
        println!("   {}", preview(&doc.text, 80).dimmed());
    }

    Ok(())
}
