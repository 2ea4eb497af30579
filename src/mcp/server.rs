//! Docstore MCP Server implementation

use std::sync::Arc;

use anyhow::Result;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use semantic_docstore::core::document::FILENAME_KEY;
use semantic_docstore::{Config, DefaultService, DocumentId, Error, Metadata, NewDocument};

/// Upper bound on results returned by one query
const MAX_QUERY_LIMIT: usize = 100;

/// One document for docstore_ingest
#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestDocument {
    #[schemars(description = "Document text")]
    pub text: String,
    #[schemars(description = "File name stored as the `filename` metadata key")]
    pub filename: String,
    #[schemars(description = "Additional string metadata")]
    #[serde(default)]
    pub metadata: Metadata,
}

/// Parameters for docstore_ingest tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct IngestParams {
    #[schemars(description = "Documents to ingest as one all-or-nothing batch")]
    pub documents: Vec<IngestDocument>,
}

/// Parameters for docstore_query tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct QueryParams {
    #[schemars(description = "Natural language query")]
    pub query: String,
    #[schemars(description = "Maximum number of results, at least 1 (default from config, values above 100 are capped)")]
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Parameters for docstore_get tool
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetParams {
    #[schemars(description = "Document id returned by docstore_ingest")]
    pub id: i64,
}

#[derive(Debug, Serialize)]
struct QueryResultJson {
    id: DocumentId,
    filename: Option<String>,
    score: f32,
    text: String,
    metadata: Metadata,
}

#[derive(Debug, Serialize)]
struct DocumentJson {
    id: DocumentId,
    filename: Option<String>,
    text: String,
    metadata: Metadata,
}

/// Caller mistakes map to invalid_params, everything else is internal
fn to_mcp_error(err: Error) -> McpError {
    match err {
        Error::EmptyInput
        | Error::EmptyQuery
        | Error::MissingMetadata(_)
        | Error::NotFound(_) => McpError::invalid_params(err.to_string(), None),
        other => McpError::internal_error(other.to_string(), None),
    }
}

/// Caller's limit or the configured default; 0 is rejected, values above
/// MAX_QUERY_LIMIT are capped
fn resolve_limit(limit: Option<usize>, default_limit: usize) -> Result<usize, McpError> {
    match limit {
        Some(0) => Err(McpError::invalid_params("limit must be at least 1", None)),
        Some(n) => Ok(n.min(MAX_QUERY_LIMIT)),
        None => Ok(default_limit.min(MAX_QUERY_LIMIT)),
    }
}

impl From<IngestDocument> for NewDocument {
    fn from(doc: IngestDocument) -> Self {
        let mut metadata = doc.metadata;
        metadata.insert(FILENAME_KEY.to_string(), doc.filename);
        NewDocument::new(doc.text, metadata)
    }
}

fn to_json_output<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let output = serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("JSON serialization failed: {}", e), None)
    })?;
    Ok(CallToolResult::success(vec![Content::text(output)]))
}

/// Docstore MCP Service
#[derive(Clone)]
pub struct DocstoreService {
    service: Arc<DefaultService>,
    default_limit: usize,
    tool_router: ToolRouter<Self>,
}

impl DocstoreService {
    pub fn new(service: Arc<DefaultService>, default_limit: usize) -> Self {
        Self {
            service,
            default_limit,
            tool_router: Self::tool_router(),
        }
    }

    /// Run a blocking store/embedding call off the async dispatch threads
    async fn blocking<T, F>(&self, f: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&DefaultService) -> semantic_docstore::Result<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| McpError::internal_error(format!("Worker task failed: {}", e), None))?
            .map_err(to_mcp_error)
    }
}

#[tool_router]
impl DocstoreService {
    /// Ingest documents
    #[tool(description = "Embed and store text documents. Each document needs a filename. The batch is stored all-or-nothing; returns the assigned ids.")]
    async fn docstore_ingest(
        &self,
        params: Parameters<IngestParams>,
    ) -> Result<CallToolResult, McpError> {
        let items: Vec<NewDocument> = params.0.documents.into_iter().map(NewDocument::from).collect();

        let ids = self.blocking(move |s| s.ingest(items)).await?;
        to_json_output(&serde_json::json!({ "ids": ids }))
    }

    /// Rank documents by similarity
    #[tool(description = "Rank stored documents by cosine similarity to the query. Returns id, filename, score, text and metadata, best first.")]
    async fn docstore_query(
        &self,
        params: Parameters<QueryParams>,
    ) -> Result<CallToolResult, McpError> {
        let limit = resolve_limit(params.0.limit, self.default_limit)?;
        let query = params.0.query;

        let results = self.blocking(move |s| s.query_top(&query, limit)).await?;
        let json_results: Vec<QueryResultJson> = results
            .into_iter()
            .map(|r| QueryResultJson {
                id: r.document_id,
                filename: r.filename().map(String::from),
                score: r.score,
                text: r.text,
                metadata: r.metadata,
            })
            .collect();

        to_json_output(&json_results)
    }

    /// List every document
    #[tool(description = "List every stored document in ingestion order.")]
    async fn docstore_list(&self) -> Result<CallToolResult, McpError> {
        let documents = self.blocking(|s| s.list_all()).await?;
        let json_documents: Vec<DocumentJson> = documents
            .into_iter()
            .map(|d| DocumentJson {
                id: d.id,
                filename: d.filename().map(String::from),
                text: d.text,
                metadata: d.metadata,
            })
            .collect();

        to_json_output(&json_documents)
    }

    /// Get one document
    #[tool(description = "Get a stored document by id.")]
    async fn docstore_get(&self, params: Parameters<GetParams>) -> Result<CallToolResult, McpError> {
        let id = DocumentId(params.0.id);
        let d = self.blocking(move |s| s.get(id)).await?;

        to_json_output(&DocumentJson {
            id: d.id,
            filename: d.filename().map(String::from),
            text: d.text,
            metadata: d.metadata,
        })
    }
}

#[tool_handler]
impl ServerHandler for DocstoreService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "Semantic document store. Ingest text documents, then query them by meaning.".to_string(),
            ),
            ..Default::default()
        }
    }
}

/// Run the MCP server
pub async fn run_mcp_server(config: Config) -> Result<()> {
    use tokio::io::{stdin, stdout};

    let service = tokio::task::spawn_blocking(move || {
        DefaultService::open(&config).map(|s| (s, config.default_limit))
    })
    .await??;
    let (service, default_limit) = service;

    info!("starting MCP server on stdio");
    let handler = DocstoreService::new(Arc::new(service), default_limit);
    let transport = (stdin(), stdout());
    let server = handler.serve(transport).await?;
    server.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler(dir: &tempfile::TempDir) -> DocstoreService {
        let config = Config {
            db_path: dir.path().join("docs.db"),
            ..Config::default()
        };
        let service = DefaultService::open(&config).expect("open store");
        DocstoreService::new(Arc::new(service), config.default_limit)
    }

    #[test]
    fn test_error_mapping() {
        let invalid = to_mcp_error(Error::EmptyQuery);
        assert_eq!(invalid.code, McpError::invalid_params("", None).code);

        let internal = to_mcp_error(Error::StorageFailure("disk".into()));
        assert_eq!(internal.code, McpError::internal_error("", None).code);
    }

    #[test]
    fn test_resolve_limit() {
        assert_eq!(resolve_limit(None, 5).ok(), Some(5));
        assert_eq!(resolve_limit(Some(3), 5).ok(), Some(3));
        assert_eq!(resolve_limit(Some(500), 5).ok(), Some(MAX_QUERY_LIMIT));

        let err = resolve_limit(Some(0), 5).unwrap_err();
        assert_eq!(err.code, McpError::invalid_params("", None).code);
    }

    #[test]
    fn test_ingest_document_keeps_filename_over_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), "ignored.txt".to_string());
        metadata.insert("lang".to_string(), "en".to_string());

        let doc = NewDocument::from(IngestDocument {
            text: "hello".to_string(),
            filename: "a.txt".to_string(),
            metadata,
        });
        assert_eq!(doc.metadata[FILENAME_KEY], "a.txt");
        assert_eq!(doc.metadata["lang"], "en");
        assert!(doc.validate().is_ok());
    }

    #[tokio::test]
    async fn test_ingest_then_query_tools() {
        let dir = tempfile::tempdir().expect("tempdir");
        let handler = handler(&dir);

        let params = IngestParams {
            documents: vec![IngestDocument {
                text: "rust sqlite storage".to_string(),
                filename: "notes.txt".to_string(),
                metadata: Metadata::new(),
            }],
        };
        handler
            .docstore_ingest(Parameters(params))
            .await
            .expect("ingest tool");

        let stored = handler.service.list_all().expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].filename(), Some("notes.txt"));

        let query = QueryParams {
            query: "rust storage".to_string(),
            limit: Some(0),
        };
        let err = handler.docstore_query(Parameters(query)).await.unwrap_err();
        assert_eq!(err.code, McpError::invalid_params("", None).code);

        let query = QueryParams {
            query: "rust storage".to_string(),
            limit: None,
        };
        handler
            .docstore_query(Parameters(query))
            .await
            .expect("query tool");
    }
}
