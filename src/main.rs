mod commands;
#[cfg(feature = "mcp")]
mod mcp;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use semantic_docstore::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docstore")]
#[command(about = "Semantic document store with exact similarity search", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(long, global = true, help = "Database path (overrides docstore.toml)")]
    db: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Verbose logging to stderr")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed and store documents
    Ingest {
        #[arg(help = "Files or directories to ingest")]
        paths: Vec<PathBuf>,
        #[arg(long, conflicts_with = "paths", help = "Ingest inline text instead of files")]
        text: Option<String>,
        #[arg(long, requires = "text", help = "Filename for inline text")]
        filename: Option<String>,
        #[arg(long = "meta", value_parser = parse_key_val, help = "Extra metadata as key=value")]
        meta: Vec<(String, String)>,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Rank documents by similarity to a query
    #[command(alias = "q")]
    Query {
        query: String,
        #[arg(long, short, help = "Limit results")]
        limit: Option<usize>,
        #[arg(long, conflicts_with = "limit", help = "Return the full ranking")]
        all: bool,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// List every document in ingestion order
    List {
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show one document
    Get {
        id: i64,
        #[arg(long, help = "JSON output")]
        json: bool,
    },
    /// Show store statistics
    Status {
        #[arg(long, help = "JSON output")]
        json: bool,
    },

    // ===== MCP Server =====
    /// Start MCP server over stdio
    #[cfg(feature = "mcp")]
    Mcp {
        #[arg(long, help = "Show client configuration instructions")]
        install: bool,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid key=value: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid key=value: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Logs go to stderr so stdout stays clean for JSON and the MCP transport
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    match cli.command {
        Commands::Ingest {
            paths,
            text,
            filename,
            meta,
            json,
        } => commands::ingest::run(&config, &paths, text, filename, &meta, json),
        Commands::Query {
            query,
            limit,
            all,
            json,
        } => commands::query::run(&config, &query, limit, all, json),
        Commands::List { json } => commands::list::run(&config, json),
        Commands::Get { id, json } => commands::get::run(&config, id, json),
        Commands::Status { json } => commands::status::run(&config, json),

        #[cfg(feature = "mcp")]
        Commands::Mcp { install } => {
            if install {
                print_mcp_install_instructions(&config);
                Ok(())
            } else {
                run_mcp_server(config)
            }
        }
    }
}

#[cfg(feature = "mcp")]
fn run_mcp_server(config: Config) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(mcp::run_mcp_server(config))
}

#[cfg(feature = "mcp")]
fn print_mcp_install_instructions(config: &Config) {
    use colored::Colorize;

    let binary_path = std::env::current_exe()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "docstore".to_string());

    let db_path = std::env::current_dir()
        .map(|cwd| cwd.join(&config.db_path))
        .unwrap_or_else(|_| config.db_path.clone());

    println!("{}", "MCP Server Installation Guide".bold().cyan());
    println!();
    println!("Add the following to your MCP client configuration:");
    println!();
    println!(r#"{{
  "mcpServers": {{
    "docstore": {{
      "command": "{}",
      "args": ["--db", "{}", "mcp"]
    }}
  }}
}}"#, binary_path, db_path.display());
    println!();
    println!("{}", "Available tools:".bold());
    println!("  • {} - Embed and store documents", "docstore_ingest".green());
    println!("  • {} - Rank documents by similarity", "docstore_query".green());
    println!("  • {} - List every document", "docstore_list".green());
    println!("  • {} - Get one document by id", "docstore_get".green());
}
