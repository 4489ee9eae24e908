//! REST API for a proofchain node
//!
//! Thin transport over [`Ledger`]: every handler calls exactly one ledger
//! operation and renders the result as JSON.

use axum::{
    extract::{Request, State},
    http::{self, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::blockchain::Block;
use crate::error::ChainError;
use crate::network::PeerNode;
use crate::node::Ledger;
use crate::sync::ChainResponse;

/// Shared handler state: the ledger plus request accounting.
pub struct ApiNode {
    pub ledger: Arc<Ledger>,
    miner_address: String,
    api_stats: RwLock<ApiStats>,
}

#[derive(Debug, Default)]
struct ApiStats {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    transactions_submitted: u64,
    blocks_mined: u64,
    chains_replaced: u64,
    start_time: Option<Instant>,
}

impl ApiStats {
    fn new() -> Self {
        ApiStats {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    fn record_request(&mut self, success: bool) {
        self.total_requests += 1;
        if success {
            self.successful_requests += 1;
        } else {
            self.failed_requests += 1;
        }
    }
}

impl ApiNode {
    /// Rewards from `/mine` go to the ledger's node id.
    pub fn new(ledger: Arc<Ledger>) -> Self {
        let miner_address = ledger.node_id().to_string();
        Self::with_miner_address(ledger, miner_address)
    }

    pub fn with_miner_address(ledger: Arc<Ledger>, miner_address: impl Into<String>) -> Self {
        Self {
            ledger,
            miner_address: miner_address.into(),
            api_stats: RwLock::new(ApiStats::new()),
        }
    }

    pub fn miner_address(&self) -> &str {
        &self.miner_address
    }

    pub async fn get_stats(&self) -> ApiStatsResponse {
        let stats = self.api_stats.read().await;
        ApiStatsResponse {
            total_requests: stats.total_requests,
            successful_requests: stats.successful_requests,
            failed_requests: stats.failed_requests,
            transactions_submitted: stats.transactions_submitted,
            blocks_mined: stats.blocks_mined,
            chains_replaced: stats.chains_replaced,
            uptime_seconds: stats.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0),
        }
    }
}

// ============================================================================
// API Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BlockchainError(ChainError),
    InvalidInput(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BlockchainError(e) => {
                let status = match &e {
                    ChainError::MiningAborted(_) => StatusCode::CONFLICT,
                    ChainError::ProofSearchExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
                    ChainError::EmptyChain | ChainError::SerializationFailure(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, e.to_string())
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<ChainError> for ApiError {
    fn from(err: ChainError) -> Self {
        ApiError::BlockchainError(err)
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NewTransactionRequest {
    pub sender: String,
    pub recipient: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewTransactionResponse {
    pub message: String,
    pub index: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MineResponse {
    pub message: String,
    pub block: Block,
}

#[derive(Debug, Deserialize)]
pub struct RegisterNodesRequest {
    pub nodes: Vec<PeerNode>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterNodesResponse {
    pub message: String,
    pub total_nodes: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub message: String,
    pub replaced: bool,
    pub chain: Vec<Block>,
}

#[derive(Debug, Serialize)]
pub struct ApiStatsResponse {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub transactions_submitted: u64,
    pub blocks_mined: u64,
    pub chains_replaced: u64,
    pub uptime_seconds: u64,
}

// ============================================================================
// Middleware
// ============================================================================

async fn stats_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    let success = response.status().is_success();
    node.api_stats.write().await.record_request(success);

    response
}

/// Logs method, path, status, duration and chain height for each request.
async fn logging_middleware(State(node): State<Arc<ApiNode>>, req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let height = node.ledger.height().await;

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status().as_u16(),
        duration_ms = %start.elapsed().as_millis(),
        height = height,
        "api.request"
    );

    response
}

// ============================================================================
// API Server
// ============================================================================

pub fn build_api_router(node: Arc<ApiNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(vec![http::Method::GET, http::Method::POST, http::Method::OPTIONS])
        .allow_headers(vec![http::header::CONTENT_TYPE]);

    Router::new()
        .route("/transactions/new", post(submit_transaction))
        .route("/mine", post(mine))
        .route("/chain", get(get_chain))
        .route("/nodes/register", post(register_nodes))
        .route("/nodes/resolve", get(resolve_conflicts))
        .route("/health", get(health_check))
        .route("/stats", get(get_api_stats))
        // logging before stats so we always record timing
        .layer(middleware::from_fn_with_state(node.clone(), logging_middleware))
        .layer(middleware::from_fn_with_state(node.clone(), stats_middleware))
        .with_state(node)
        .layer(cors)
}

pub async fn run_api_server(node: Arc<ApiNode>, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_api_router(node);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn submit_transaction(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<NewTransactionRequest>,
) -> Result<(StatusCode, Json<NewTransactionResponse>), ApiError> {
    if req.sender.trim().is_empty() || req.recipient.trim().is_empty() {
        return Err(ApiError::InvalidInput(
            "sender and recipient must not be empty".to_string(),
        ));
    }

    let index = node
        .ledger
        .submit_transaction(&req.sender, &req.recipient, req.amount)
        .await;
    node.api_stats.write().await.transactions_submitted += 1;

    Ok((
        StatusCode::CREATED,
        Json(NewTransactionResponse {
            message: format!("Transaction will be added to Block {}", index),
            index,
        }),
    ))
}

async fn mine(State(node): State<Arc<ApiNode>>) -> Result<Json<MineResponse>, ApiError> {
    let block = node.ledger.mine(&node.miner_address).await?;
    node.api_stats.write().await.blocks_mined += 1;

    Ok(Json(MineResponse {
        message: "New Block Forged".to_string(),
        block,
    }))
}

async fn get_chain(State(node): State<Arc<ApiNode>>) -> Json<ChainResponse> {
    Json(node.ledger.export_chain().await)
}

async fn register_nodes(
    State(node): State<Arc<ApiNode>>,
    Json(req): Json<RegisterNodesRequest>,
) -> Result<(StatusCode, Json<RegisterNodesResponse>), ApiError> {
    if req.nodes.is_empty() {
        return Err(ApiError::InvalidInput("Please supply a valid list of nodes".to_string()));
    }

    for peer in &req.nodes {
        if peer.url.trim().is_empty() || peer.ip_address.trim().is_empty() {
            return Err(ApiError::InvalidInput("node url and ip_address are required".to_string()));
        }
    }

    let mut added = 0;
    for peer in req.nodes {
        if node.ledger.register_node(&peer.url, &peer.ip_address, &peer.location).await {
            added += 1;
        }
    }

    let total_nodes = node.ledger.nodes().await.len();
    Ok((
        StatusCode::CREATED,
        Json(RegisterNodesResponse {
            message: format!("{} new node(s) have been added", added),
            total_nodes,
        }),
    ))
}

async fn resolve_conflicts(State(node): State<Arc<ApiNode>>) -> Json<ResolveResponse> {
    let replaced = node.ledger.resolve().await;
    if replaced {
        node.api_stats.write().await.chains_replaced += 1;
    }

    let message = if replaced {
        "Our chain was replaced"
    } else {
        "Our chain is authoritative"
    };

    Json(ResolveResponse {
        message: message.to_string(),
        replaced,
        chain: node.ledger.export_chain().await.chain,
    })
}

async fn health_check(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    let height = node.ledger.height().await;
    Json(serde_json::json!({
        "status": "healthy",
        "node_id": node.ledger.node_id(),
        "height": height,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn get_api_stats(State(node): State<Arc<ApiNode>>) -> impl IntoResponse {
    Json(node.get_stats().await)
}
