//! MCP server for the document store
//!
//! Exposes ingest, query, list and get as tools over stdio.

mod server;

pub use server::run_mcp_server;
