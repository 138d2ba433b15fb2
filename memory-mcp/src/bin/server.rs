//! Stdio JSON-RPC entrypoint for the cognitive memory MCP server.
//!
//! Loads configuration from the environment, wires up the Turso (durable)
//! and redb (cache) storage backends, restores the working-memory buffer
//! from its last persisted snapshot, and then runs the JSON-RPC read/
//! dispatch/write loop until stdin closes.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use memory_core::config::{AppConfig, EmbeddingProviderKind};
use memory_core::embeddings::{EmbeddingProvider, NullProvider};
#[cfg(feature = "http-embeddings")]
use memory_core::storage::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use memory_mcp::jsonrpc::{
    read_next_message, write_response_with_length, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
};
use memory_mcp::resources;
use memory_mcp::types::{CallToolParams, ReadResourceParams};
use memory_mcp::MemoryMcpServer;
use memory_storage_redb::RedbStore;
use memory_storage_turso::TursoStore;

const WATCHDOG_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = AppConfig::from_env()?;
    info!(project_id = %config.project_id, "starting memory-mcp-server");

    let turso = Arc::new(TursoStore::new(
        &config.database_url,
        config.database_auth_token.as_deref().unwrap_or(""),
    ).await?);
    turso.migrate().await?;
    let redb = Arc::new(RedbStore::open(&config.redb_path)?);

    let embeddings = build_embedding_provider(&config);

    let server = Arc::new(MemoryMcpServer::new(
        turso.clone(),
        turso.clone(),
        turso.clone(),
        turso,
        embeddings,
        config.working_memory_capacity,
        config.fidelity_threshold,
        config.rrf_k,
    ));

    match redb.snapshot(&config.project_id).await {
        Ok(items) => server.load_working_memory(items),
        Err(err) => warn!(error = %err, "failed to restore working-memory snapshot, starting empty"),
    }

    if config.watchdog_enabled {
        spawn_watchdog(server.clone(), redb.clone(), config.project_id.clone());
    }

    run_jsonrpc_loop(server, redb, config.project_id).await
}

/// Selects and constructs the embedding provider named by `config`, guarded
/// by a circuit breaker so a flaky HTTP endpoint degrades tool calls into
/// transient errors rather than hanging the stdio loop.
fn build_embedding_provider(config: &AppConfig) -> Arc<dyn EmbeddingProvider> {
    match config.embedding.provider {
        EmbeddingProviderKind::Null => Arc::new(NullProvider::new(config.embedding.dimension)),
        #[cfg(feature = "http-embeddings")]
        EmbeddingProviderKind::Http => {
            let endpoint = config.embedding.endpoint.clone().unwrap_or_default();
            let api_key = config.embedding.api_key.clone().unwrap_or_default();
            let model = config.embedding.model.clone().unwrap_or_default();
            let inner = memory_core::embeddings::HttpProvider::new(endpoint, api_key, model);
            Arc::new(memory_core::embeddings::GuardedProvider::new(
                inner,
                CircuitBreaker::new(CircuitBreakerConfig::default()),
            ))
        }
        #[cfg(not(feature = "http-embeddings"))]
        EmbeddingProviderKind::Http => {
            warn!("EMBEDDING_PROVIDER=http requested but the http-embeddings feature is not compiled in; falling back to null");
            Arc::new(NullProvider::new(config.embedding.dimension))
        }
    }
}

/// Periodically persists the live working-memory buffer into the redb
/// cache tier, so a restart resumes from the last heartbeat rather than an
/// empty buffer.
fn spawn_watchdog(server: Arc<MemoryMcpServer>, redb: Arc<RedbStore>, project_id: String) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(WATCHDOG_INTERVAL);
        loop {
            ticker.tick().await;
            let snapshot = server.working_memory_snapshot();
            debug!(count = snapshot.len(), "watchdog heartbeat: persisting working memory");
            if let Err(err) = redb.persist(&project_id, snapshot).await {
                warn!(error = %err, "watchdog failed to persist working-memory snapshot");
            }
        }
    });
}

async fn run_jsonrpc_loop(
    server: Arc<MemoryMcpServer>,
    redb: Arc<RedbStore>,
    project_id: String,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();

    loop {
        match read_next_message(&mut handle) {
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Ok(Some((line, is_lsp))) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let response = match serde_json::from_str::<JsonRpcRequest>(line) {
                    Ok(request) => handle_request(request, &server, &redb, &project_id).await,
                    Err(err) => {
                        error!(error = %err, "failed to parse JSON-RPC request");
                        Some(JsonRpcResponse {
                            jsonrpc: "2.0".to_string(),
                            id: None,
                            result: None,
                            error: Some(JsonRpcError {
                                code: -32700,
                                message: "Parse error".to_string(),
                                data: Some(json!({"details": err.to_string()})),
                            }),
                        })
                    }
                };
                if let Some(response) = response {
                    let body = serde_json::to_string(&response)?;
                    if is_lsp {
                        write_response_with_length(&mut stdout, &body)?;
                    } else {
                        writeln!(stdout, "{body}")?;
                        stdout.flush()?;
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "error reading from stdin");
                break;
            }
        }
    }

    // Persist one last time so a clean shutdown doesn't lose the buffer.
    let snapshot = server.working_memory_snapshot();
    if let Err(err) = redb.persist(&project_id, snapshot).await {
        warn!(error = %err, "failed to persist working-memory snapshot on shutdown");
    }

    Ok(())
}

async fn handle_request(
    request: JsonRpcRequest,
    server: &Arc<MemoryMcpServer>,
    redb: &Arc<RedbStore>,
    project_id: &str,
) -> Option<JsonRpcResponse> {
    // Notifications (no id, or an explicit null id) must not produce a response.
    if request.id.is_none() || matches!(request.id, Some(Value::Null)) {
        return None;
    }
    let id = request.id.clone();

    let result = match request.method.as_str() {
        "initialize" => Ok(json!({
            "protocolVersion": "2025-06-18",
            "capabilities": {"tools": {"listChanged": false}, "resources": {"listChanged": false}},
            "serverInfo": {"name": "memory-mcp-server", "version": env!("CARGO_PKG_VERSION")},
        })),
        "tools/list" => {
            let tools: Vec<Value> = server
                .list_tools()
                .into_iter()
                .map(|t| json!({"name": t.name, "description": t.description, "inputSchema": t.input_schema}))
                .collect();
            Ok(json!({ "tools": tools }))
        }
        "tools/call" => match parse_params::<CallToolParams>(request.params) {
            Ok(params) => {
                let result = server.call_tool(&params.name, &params.arguments, project_id).await;
                Ok(json!({ "content": [{"type": "text", "text": result.to_string()}] }))
            }
            Err(response) => return Some(with_id(response, id)),
        },
        "resources/list" => {
            let resources: Vec<Value> = resources::list_resources()
                .into_iter()
                .map(|r| {
                    json!({"uri": r.uri, "name": r.name, "description": r.description, "mimeType": r.mime_type})
                })
                .collect();
            Ok(json!({ "resources": resources }))
        }
        "resources/read" => match parse_params::<ReadResourceParams>(request.params) {
            Ok(params) => read_resource(&params.uri, redb, project_id).await,
            Err(response) => return Some(with_id(response, id)),
        },
        "shutdown" => Ok(Value::Null),
        other => Err(JsonRpcError {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(json!({"method": other})),
        }),
    };

    Some(match result {
        Ok(value) => JsonRpcResponse { jsonrpc: "2.0".to_string(), id, result: Some(value), error: None },
        Err(error) => JsonRpcResponse { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) },
    })
}

async fn read_resource(
    uri: &str,
    redb: &Arc<RedbStore>,
    project_id: &str,
) -> Result<Value, JsonRpcError> {
    let (tier, _query) = resources::parse_uri(uri).map_err(|err| JsonRpcError {
        code: -32602,
        message: "Invalid params".to_string(),
        data: Some(json!({"details": err.to_string()})),
    })?;

    let rows = match tier {
        "working-memory" => redb
            .snapshot(project_id)
            .await
            .map(|items| serde_json::to_value(items).unwrap_or(json!([])))
            .map_err(storage_error)?,
        "stale-memory" => redb
            .stale(project_id, 100)
            .await
            .map(|items| serde_json::to_value(items).unwrap_or(json!([])))
            .map_err(storage_error)?,
        // l2-insights and episode-memory are served through `hybrid_search`,
        // `store_episode`, and `compress_to_l2_insight` tool calls rather
        // than this binary holding a second handle to the Turso store; l0-raw
        // has no backing store yet (no RawDialogueStore implementation).
        "l2-insights" | "episode-memory" | "l0-raw" => json!([]),
        other => unreachable!("parse_uri validated the tier set, got {other}"),
    };

    Ok(json!({ "contents": [{"uri": uri, "mimeType": "application/json", "text": resources::render(tier, rows).to_string()}] }))
}

fn storage_error(err: memory_core::Error) -> JsonRpcError {
    JsonRpcError {
        code: -32603,
        message: "Internal error".to_string(),
        data: Some(json!({"details": err.to_string()})),
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(
    params: Option<Value>,
) -> Result<T, JsonRpcResponse> {
    let params = params.ok_or_else(|| JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: None,
        result: None,
        error: Some(JsonRpcError { code: -32602, message: "Missing params".to_string(), data: None }),
    })?;
    serde_json::from_value(params).map_err(|err| JsonRpcResponse {
        jsonrpc: "2.0".to_string(),
        id: None,
        result: None,
        error: Some(JsonRpcError {
            code: -32602,
            message: "Invalid params".to_string(),
            data: Some(json!({"details": err.to_string()})),
        }),
    })
}

fn with_id(mut response: JsonRpcResponse, id: Option<Value>) -> JsonRpcResponse {
    response.id = id;
    response
}
