//! Error types for the faucet service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sepolia_common::CommonError;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Faucet service errors
#[derive(Error, Debug)]
pub enum FaucetError {
    #[error("Invalid Ethereum address: {0}")]
    InvalidAddress(String),

    #[error("Rate limit exceeded. Try again in {} hours", format_hours(.retry_after))]
    RateLimited {
        retry_after: Duration,
        last_address: String,
    },

    #[error("Disbursement failed: {0}")]
    DisbursementFailed(String),

    #[error("Wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Remaining wait in hours, one decimal place, halves rounded up.
pub fn format_hours(duration: &Duration) -> String {
    let hours = duration.as_secs_f64() / 3600.0;
    format!("{:.1}", (hours * 10.0).round() / 10.0)
}

impl FaucetError {
    /// Stable rejection reason reported to callers and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            FaucetError::InvalidAddress(_) => "invalid-address",
            FaucetError::RateLimited { .. } => "rate-limited",
            FaucetError::DisbursementFailed(_) => "disbursement-failed",
            FaucetError::MethodNotAllowed => "method-not-allowed",
            FaucetError::WalletUnavailable(_)
            | FaucetError::Rpc(_) | FaucetError::Config(_) | FaucetError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            FaucetError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            FaucetError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            FaucetError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CommonError> for FaucetError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::InvalidAddress(msg) => FaucetError::InvalidAddress(msg),
            CommonError::InvalidAmount(msg) => FaucetError::Config(format!("invalid amount {}", msg)),
        }
    }
}

impl IntoResponse for FaucetError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let timestamp = chrono::Utc::now().to_rfc3339();

        let body = match &self {
            FaucetError::InvalidAddress(_) => json!({
                "error": "Invalid Ethereum address",
                "code": self.reason(),
                "timestamp": timestamp,
            }),
            FaucetError::RateLimited { last_address, .. } => json!({
                "error": self.to_string(),
                "code": self.reason(),
                "lastAddress": last_address,
                "timestamp": timestamp,
            }),
            FaucetError::MethodNotAllowed => json!({
                "error": "Method not allowed",
                "code": self.reason(),
                "timestamp": timestamp,
            }),
            FaucetError::WalletUnavailable(_) => json!({
                "error": "Failed to get wallet info",
                "code": self.reason(),
                "timestamp": timestamp,
            }),
            // Upstream detail stays in the logs
            _ => json!({
                "error": "Failed to process request",
                "code": self.reason(),
                "timestamp": timestamp,
            }),
        };

        (status, Json(body)).into_response()
    }
}

pub type FaucetResult<T> = Result<T, FaucetError>;
