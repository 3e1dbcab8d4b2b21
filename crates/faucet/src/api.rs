//! HTTP API for faucet service

use super::error::{FaucetError, FaucetResult};
use super::service::{DispenseResponse, FaucetService, WalletInfo};
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Shared bucket for requests with no identifiable origin
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Dispense request
#[derive(Debug, Default, Deserialize)]
pub struct DispenseRequest {
    pub address: Option<String>,
}

/// Rate-limit key for a request: the first `X-Forwarded-For` hop, else the peer IP.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(origin), _) => origin.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

/// Dispense handler
pub async fn request_handler(
    State(service): State<Arc<FaucetService>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    payload: Result<Json<DispenseRequest>, JsonRejection>,
) -> FaucetResult<Json<DispenseResponse>> {
    let client = client_key(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(client = %client, "Unreadable request body: {}", rejection);
            DispenseRequest::default()
        }
    };

    info!(client = %client, address = ?request.address, "Dispense request");

    let response = service
        .dispense(request.address.as_deref(), &client)
        .await
        .map_err(|e| {
            if e.status_code().is_server_error() {
                error!(client = %client, "Dispense error: {}", e);
            }
            e
        })?;

    Ok(Json(response))
}

/// Wallet info handler
pub async fn wallet_info_handler(
    State(service): State<Arc<FaucetService>>,
) -> FaucetResult<Json<WalletInfo>> {
    let info = service.wallet_info().map_err(|e| {
        error!("Failed to get wallet info: {}", e);
        e
    })?;
    Ok(Json(info))
}

/// Any method other than POST on `/request`
pub async fn method_not_allowed_handler() -> FaucetError {
    FaucetError::MethodNotAllowed
}

/// Prometheus metrics handler
pub async fn metrics_handler(
    State(service): State<Arc<FaucetService>>,
) -> Result<String, StatusCode> {
    service.metrics().gather().map_err(|err| {
        error!("Failed to gather metrics: {}", err);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Health check handler
pub async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Root handler with info
pub async fn root_handler(State(service): State<Arc<FaucetService>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "Sepolia Faucet",
        "version": env!("CARGO_PKG_VERSION"),
        "dripAmount": service.drip_amount(),
        "cooldownHours": service.cooldown().as_secs_f64() / 3600.0,
        "endpoints": {
            "POST /request": "Request test ETH",
            "GET /wallet-info": "Faucet wallet address",
            "GET /health": "Health check",
            "GET /metrics": "Prometheus metrics"
        }
    }))
}

/// Build the faucet router
pub fn router(service: Arc<FaucetService>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(
            "/request",
            post(request_handler).fallback(method_not_allowed_handler),
        )
        .route("/wallet-info", get(wallet_info_handler).post(wallet_info_handler))
        .with_state(service)
}
