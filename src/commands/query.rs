//! Query command - rank stored documents by similarity

use anyhow::Result;
use colored::Colorize;
use semantic_docstore::Config;

use super::{open_service, preview};

/// Run query command
///
/// `limit` falls back to the configured default; `all` disables truncation.
pub fn run(config: &Config, query: &str, limit: Option<usize>, all: bool, json: bool) -> Result<()> {
    let service = open_service(config)?;
    let results = if all {
        service.query(query)?
    } else {
        service.query_top(query, limit.unwrap_or(config.default_limit))?
    };

    if json {
        let json_results: Vec<_> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.document_id,
                    "filename": r.filename(),
                    "score": r.score,
                    "text": r.text,
                    "metadata": r.metadata,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "results": json_results }))?
        );
        return Ok(());
    }

    if results.is_empty() {
        println!("{} No results found for: {}", "→".dimmed(), query.cyan());
        return Ok(());
    }

    println!(
        "{} {} results for: {}",
        "→".dimmed(),
        results.len(),
        query.cyan()
    );
    println!();

    for (i, result) in results.iter().enumerate() {
        let score_str = format!("{:.3}", result.score);
        let score_colored = if result.score > 0.8 {
            score_str.green()
        } else if result.score > 0.5 {
            score_str.yellow()
        } else {
            score_str.dimmed()
        };

        println!(
            "{}. [{}] {} {}",
            (i + 1).to_string().bold(),
            score_colored,
            result.filename().unwrap_or("-").cyan(),
            format!("(id {})", result.document_id).dimmed()
        );
        println!("   {}", preview(&result.text, 100).dimmed());
        println!();
    }

    Ok(())
}
