//! Status command - store statistics

use anyhow::Result;
use colored::Colorize;
use semantic_docstore::Config;

use super::open_service;

pub fn run(config: &Config, json: bool) -> Result<()> {
    let db_path = &config.db_path;

    if !db_path.exists() {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "exists": false,
                    "db_path": db_path.display().to_string(),
                })
            );
        } else {
            println!(
                "{} Store not found at {}. Run {} first.",
                "!".yellow().bold(),
                db_path.display(),
                "docstore ingest".cyan()
            );
        }
        return Ok(());
    }

    let service = open_service(config)?;
    let stats = service.stats()?;
    let file_size = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);

    if json {
        println!(
            "{}",
            serde_json::json!({
                "exists": true,
                "db_path": db_path.display().to_string(),
                "document_count": stats.document_count,
                "dimension": stats.dimension,
                "last_ingested": stats.last_ingested,
                "file_size_bytes": file_size,
            })
        );
        return Ok(());
    }

    println!("{}", "Store Status".bold());
    println!();
    println!(
        "  {} {} documents",
        "→".dimmed(),
        stats.document_count.to_string().cyan()
    );
    println!("  {} Dimension: {}", "→".dimmed(), stats.dimension);
    println!(
        "  {} Size: {:.2} KB",
        "→".dimmed(),
        file_size as f64 / 1024.0
    );
    if let Some(ts) = stats.last_ingested {
        let dt = chrono::DateTime::from_timestamp(ts, 0)
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        println!("  {} Last ingested: {}", "→".dimmed(), dt);
    }

    Ok(())
}
