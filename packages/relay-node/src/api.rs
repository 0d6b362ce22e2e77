//! HTTP API for validator submissions, fix operations, and observability
//!
//! One executor per direction sits behind a mutex; every mutating route
//! locks the direction it targets, so submissions, fixes, and admin reads
//! for a direction are serialized the way the core expects.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use alloy::primitives::{Address, Signature};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use eyre::eyre;
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use relay_core::{
    Direction, ErrorCategory, ExecutionOutcome, Message, MessageHash, RelayError, RelayExecutor,
};

use crate::ledger::Ledger;
use crate::metrics;

pub type SharedExecutor = Arc<Mutex<RelayExecutor<Ledger>>>;

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    pub home: SharedExecutor,
    pub foreign: SharedExecutor,
}

impl AppState {
    fn executor_for(&self, direction: Direction) -> &SharedExecutor {
        match direction {
            Direction::HomeToForeign => &self.home,
            Direction::ForeignToHome => &self.foreign,
        }
    }
}

// ============================================================================
// Request/response bodies
// ============================================================================

#[derive(Deserialize)]
pub struct SignatureRequest {
    /// Validator address, 0x-prefixed
    pub validator: String,
    /// 65-byte r||s||v signature over the message hash, hex
    pub signature: String,
    /// Canonical message encoding, hex
    pub message: String,
}

#[derive(Deserialize)]
pub struct AffirmationRequest {
    pub validator: String,
    /// Canonical message encoding, hex
    pub message: String,
}

#[derive(Deserialize)]
pub struct OutboundRequest {
    /// Transfer amount in base units, decimal string
    pub amount: String,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub hash: String,
    pub submissions: usize,
    pub quorum_reached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_responsible: Option<Address>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionView>,
}

#[derive(Serialize)]
pub struct ExecutionView {
    pub result: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executor: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub hash: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub fix_requested: bool,
    pub signatures: usize,
    pub affirmations: usize,
    /// Bit-packed processed marker: bit 255 set once executed, low bits
    /// count relay attempts
    pub processed_marker: String,
}

#[derive(Serialize)]
pub struct FixResponse {
    pub hash: String,
    pub status: String,
    pub sender: Address,
    pub executor: Address,
}

#[derive(Serialize)]
pub struct OutboundResponse {
    pub recorded: bool,
}

#[derive(Serialize)]
pub struct DirectionHealth {
    pub reserve: String,
    pub validators: usize,
    pub required_signatures: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub home: DirectionHealth,
    pub foreign: DirectionHealth,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub category: String,
}

// ============================================================================
// Error mapping
// ============================================================================

/// API-layer error: HTTP status plus a JSON body naming the category.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::BAD_REQUEST,
            body: ErrorBody {
                error: message.into(),
                category: ErrorCategory::Validation.as_str().to_string(),
            },
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        ApiError {
            status: StatusCode::NOT_FOUND,
            body: ErrorBody {
                error: message.into(),
                category: ErrorCategory::Authorization.as_str().to_string(),
            },
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        let status = match &err {
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => match err.category() {
                ErrorCategory::Configuration | ErrorCategory::Validation => {
                    StatusCode::BAD_REQUEST
                }
                ErrorCategory::Authorization => StatusCode::FORBIDDEN,
                ErrorCategory::Limit => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCategory::Replay => StatusCode::CONFLICT,
                ErrorCategory::Effect => StatusCode::BAD_GATEWAY,
            },
        };
        ApiError {
            status,
            body: ErrorBody {
                error: err.to_string(),
                category: err.category().as_str().to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// ============================================================================
// Parsing helpers
// ============================================================================

fn parse_direction(raw: &str) -> Result<Direction, ApiError> {
    Direction::parse(raw).ok_or_else(|| ApiError::not_found(format!("Unknown direction: {raw}")))
}

fn parse_address(raw: &str) -> Result<Address, ApiError> {
    raw.parse::<Address>()
        .map_err(|_| ApiError::bad_request(format!("Invalid address: {raw}")))
}

fn parse_signature(raw: &str) -> Result<Signature, ApiError> {
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|_| ApiError::bad_request("Signature is not valid hex"))?;
    Signature::try_from(bytes.as_slice())
        .map_err(|_| ApiError::bad_request("Signature must be 65 bytes r||s||v"))
}

fn parse_message(raw: &str) -> Result<Message, ApiError> {
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|_| ApiError::bad_request("Message is not valid hex"))?;
    Message::decode(&bytes).map_err(ApiError::from)
}

fn parse_amount(raw: &str) -> Result<u128, ApiError> {
    raw.parse::<u128>()
        .map_err(|_| ApiError::bad_request(format!("Invalid amount: {raw}")))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn execution_view(outcome: &ExecutionOutcome) -> ExecutionView {
    match outcome {
        ExecutionOutcome::Executed(completion) => ExecutionView {
            result: "executed".to_string(),
            sender: Some(completion.sender),
            executor: Some(completion.executor),
            category: None,
            detail: None,
        },
        ExecutionOutcome::Failed { category, detail } => ExecutionView {
            result: "failed".to_string(),
            sender: None,
            executor: None,
            category: Some(category.as_str().to_string()),
            detail: Some(detail.clone()),
        },
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn submit_signature(
    State(state): State<AppState>,
    Path(direction): Path<String>,
    Json(req): Json<SignatureRequest>,
) -> ApiResult<SubmitResponse> {
    let direction = parse_direction(&direction)?;
    let validator = parse_address(&req.validator)?;
    let signature = parse_signature(&req.signature)?;
    let message = parse_message(&req.message)?;

    let mut exec = state.executor_for(direction).lock().await;
    let result = exec.submit_signature(validator, signature, &message, now_secs());
    metrics::record_submission(direction.as_str(), "signed", result.is_ok());

    let outcome = result?;
    if outcome.quorum_reached {
        metrics::record_quorum(direction.as_str(), "signed");
    }
    if let Some(execution) = &outcome.execution {
        match execution {
            ExecutionOutcome::Executed(_) => metrics::record_execution(direction.as_str(), true),
            ExecutionOutcome::Failed { category, .. } => {
                metrics::record_execution(direction.as_str(), false);
                metrics::record_execution_failure(direction.as_str(), category.as_str());
            }
        }
    }

    let status = exec.status(&outcome.hash);
    Ok(Json(SubmitResponse {
        hash: outcome.hash.to_hex(),
        submissions: outcome.submissions,
        quorum_reached: outcome.quorum_reached,
        relay_responsible: outcome.relay_responsible,
        status: status.as_str().to_string(),
        execution: outcome.execution.as_ref().map(execution_view),
    }))
}

async fn submit_affirmation(
    State(state): State<AppState>,
    Path(direction): Path<String>,
    Json(req): Json<AffirmationRequest>,
) -> ApiResult<SubmitResponse> {
    let direction = parse_direction(&direction)?;
    let validator = parse_address(&req.validator)?;
    let message = parse_message(&req.message)?;

    let mut exec = state.executor_for(direction).lock().await;
    let result = exec.submit_affirmation(validator, &message, now_secs());
    metrics::record_submission(direction.as_str(), "affirmed", result.is_ok());

    let outcome = result?;
    if outcome.quorum_reached {
        metrics::record_quorum(direction.as_str(), "affirmed");
    }
    if let Some(execution) = &outcome.execution {
        match execution {
            ExecutionOutcome::Executed(_) => metrics::record_execution(direction.as_str(), true),
            ExecutionOutcome::Failed { category, .. } => {
                metrics::record_execution(direction.as_str(), false);
                metrics::record_execution_failure(direction.as_str(), category.as_str());
            }
        }
    }

    let status = exec.status(&outcome.hash);
    Ok(Json(SubmitResponse {
        hash: outcome.hash.to_hex(),
        submissions: outcome.submissions,
        quorum_reached: outcome.quorum_reached,
        relay_responsible: None,
        status: status.as_str().to_string(),
        execution: outcome.execution.as_ref().map(execution_view),
    }))
}

async fn record_outbound(
    State(state): State<AppState>,
    Path(direction): Path<String>,
    Json(req): Json<OutboundRequest>,
) -> ApiResult<OutboundResponse> {
    let direction = parse_direction(&direction)?;
    let amount = parse_amount(&req.amount)?;

    let mut exec = state.executor_for(direction).lock().await;
    exec.note_outbound_transfer(amount, now_secs())?;
    Ok(Json(OutboundResponse { recorded: true }))
}

async fn request_fix(
    State(state): State<AppState>,
    Path((direction, hash)): Path<(String, String)>,
) -> ApiResult<StatusResponse> {
    let direction = parse_direction(&direction)?;
    let hash = MessageHash::from_hex(&hash)?;

    let mut exec = state.executor_for(direction).lock().await;
    exec.request_fix(hash)?;
    Ok(Json(status_response(&exec, &hash)))
}

async fn run_fix(
    State(state): State<AppState>,
    Path((direction, hash)): Path<(String, String)>,
) -> ApiResult<FixResponse> {
    let direction = parse_direction(&direction)?;
    let hash = MessageHash::from_hex(&hash)?;

    let mut exec = state.executor_for(direction).lock().await;
    let result = exec.fix(hash, now_secs());
    metrics::record_fix(direction.as_str(), result.is_ok());

    let completion = result?;
    Ok(Json(FixResponse {
        hash: hash.to_hex(),
        status: exec.status(&hash).as_str().to_string(),
        sender: completion.sender,
        executor: completion.executor,
    }))
}

async fn message_status(
    State(state): State<AppState>,
    Path((direction, hash)): Path<(String, String)>,
) -> ApiResult<StatusResponse> {
    let direction = parse_direction(&direction)?;
    let hash = MessageHash::from_hex(&hash)?;

    let exec = state.executor_for(direction).lock().await;
    Ok(Json(status_response(&exec, &hash)))
}

fn status_response(exec: &RelayExecutor<Ledger>, hash: &MessageHash) -> StatusResponse {
    let record = exec.record(hash);
    StatusResponse {
        hash: hash.to_hex(),
        status: exec.status(hash).as_str().to_string(),
        failure: record
            .and_then(|r| r.failure)
            .map(|c| c.as_str().to_string()),
        fix_requested: record.map(|r| r.fix_requested).unwrap_or(false),
        signatures: exec.collector().signature_count(hash),
        affirmations: exec.collector().affirmation_count(hash),
        processed_marker: format!("{:#x}", exec.processed_marker(hash)),
    }
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let home = state.home.lock().await;
    let foreign = state.foreign.lock().await;
    Json(HealthResponse {
        status: "healthy".to_string(),
        home: direction_health(&home),
        foreign: direction_health(&foreign),
    })
}

fn direction_health(exec: &RelayExecutor<Ledger>) -> DirectionHealth {
    DirectionHealth {
        reserve: exec.effects().reserve().to_string(),
        validators: exec.validators().validator_list().len(),
        required_signatures: exec.validators().required_signatures(),
    }
}

/// Liveness probe (always returns OK if server is running)
async fn liveness() -> &'static str {
    "OK"
}

/// Prometheus metrics endpoint
async fn prometheus_metrics(State(state): State<AppState>) -> Response {
    // Refresh reserve gauges before scraping
    {
        let home = state.home.lock().await;
        metrics::set_ledger_reserve(home.direction().as_str(), home.effects().reserve());
    }
    {
        let foreign = state.foreign.lock().await;
        metrics::set_ledger_reserve(foreign.direction().as_str(), foreign.effects().reserve());
    }

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response();
    }

    match Response::builder()
        .header(header::CONTENT_TYPE, encoder.format_type())
        .body(axum::body::Body::from(buffer))
    {
        Ok(resp) => resp,
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to build metrics response",
        )
            .into_response(),
    }
}

// ============================================================================
// Router and server
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/{direction}/signatures", post(submit_signature))
        .route("/v1/{direction}/affirmations", post(submit_affirmation))
        .route("/v1/{direction}/outbound", post(record_outbound))
        .route("/v1/{direction}/fix-requests/{hash}", post(request_fix))
        .route("/v1/{direction}/fixes/{hash}", post(run_fix))
        .route("/v1/{direction}/status/{hash}", get(message_status))
        .route("/health", get(health_check))
        .route("/healthz", get(liveness))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{MessageHash, RelayStatus};

    #[test]
    fn test_error_status_mapping() {
        let hash = MessageHash::from_bytes([1u8; 32]);

        let cases = [
            (
                ApiError::from(RelayError::NotFound { hash }),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::from(RelayError::NotAValidator {
                    validator: Address::repeat_byte(0x01),
                }),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(RelayError::AboveMaximum {
                    amount: 10,
                    max: 5,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ApiError::from(RelayError::AlreadyProcessed { hash }),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::from(RelayError::EffectFailed {
                    reason: "reserve empty".to_string(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(RelayError::NotFailed {
                    hash,
                    status: RelayStatus::Pending,
                }),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status, expected);
        }
    }

    #[test]
    fn test_error_body_names_the_category() {
        let err = ApiError::from(RelayError::AlreadyProcessed {
            hash: MessageHash::from_bytes([2u8; 32]),
        });
        let json = serde_json::to_value(&err.body).unwrap();
        assert_eq!(json["category"], "replay");
        assert!(json["error"].as_str().unwrap().contains("already processed"));
    }

    #[test]
    fn test_parse_helpers_reject_malformed_input() {
        assert!(parse_direction("sideways").is_err());
        assert!(parse_direction("home_to_foreign").is_ok());
        assert!(parse_address("0x1234").is_err());
        assert!(parse_signature("0xdeadbeef").is_err());
        assert!(parse_message("zz").is_err());
        assert!(parse_amount("-5").is_err());
        assert_eq!(parse_amount("42").unwrap(), 42);
    }
}

/// Start the HTTP API server
pub async fn start_server(bind_address: &str, port: u16, state: AppState) -> eyre::Result<()> {
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| eyre!("Invalid bind address {}:{}: {}", bind_address, port, e))?;
    info!("API server listening on {}", addr);
    info!("  /v1/{{direction}}/signatures - Signed relay submissions");
    info!("  /v1/{{direction}}/affirmations - Affirmation submissions");
    info!("  /health  - Full health status (JSON)");
    info!("  /metrics - Prometheus metrics");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
