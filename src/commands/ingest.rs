//! Ingest command - embed and store documents

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use colored::Colorize;
use semantic_docstore::core::document::FILENAME_KEY;
use semantic_docstore::{Config, Metadata, NewDocument};
use walkdir::WalkDir;

use super::open_service;

/// Run ingest command
///
/// Files (or every file under a directory) are read as UTF-8 and stored with
/// their file name as `filename`. The whole set is one all-or-nothing batch.
pub fn run(
    config: &Config,
    paths: &[PathBuf],
    text: Option<String>,
    filename: Option<String>,
    extra: &[(String, String)],
    json: bool,
) -> Result<()> {
    if extra.iter().any(|(key, _)| key == FILENAME_KEY) {
        bail!("--meta cannot set `{}`; use --filename or the file name", FILENAME_KEY);
    }

    let mut items = match text {
        Some(text) => {
            let Some(filename) = filename else {
                bail!("--filename is required with --text");
            };
            vec![NewDocument::with_filename(text, filename)]
        }
        None => collect_documents(paths)?,
    };

    add_metadata(&mut items, extra);

    let filenames: Vec<String> = items
        .iter()
        .map(|i| i.metadata.get(FILENAME_KEY).cloned().unwrap_or_default())
        .collect();

    let service = open_service(config)?;
    let ids = service.ingest(items)?;

    if json {
        let json_results: Vec<_> = ids
            .iter()
            .zip(&filenames)
            .map(|(id, name)| serde_json::json!({ "id": id, "filename": name }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "ingested": json_results }))?
        );
    } else {
        println!(
            "{} Ingested {} documents",
            "✓".green().bold(),
            ids.len().to_string().cyan()
        );
        for (id, name) in ids.iter().zip(&filenames) {
            println!("  {} [{}] {}", "→".dimmed(), id, name);
        }
    }

    Ok(())
}

fn add_metadata(items: &mut [NewDocument], extra: &[(String, String)]) {
    for item in items {
        for (key, value) in extra {
            item.metadata.insert(key.clone(), value.clone());
        }
    }
}

/// Read every file named by `paths`, walking directories
fn collect_documents(paths: &[PathBuf]) -> Result<Vec<NewDocument>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Failed to walk {}", path.display()))?;
                if entry.file_type().is_file() {
                    documents.push(read_document(entry.path())?);
                }
            }
        } else {
            documents.push(read_document(path)?);
        }
    }

    Ok(documents)
}

fn read_document(path: &Path) -> Result<NewDocument> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let text = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;

    let filename = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    let mut metadata = Metadata::new();
    metadata.insert(FILENAME_KEY.to_string(), filename);
    Ok(NewDocument::new(text, metadata))
}
