// =============================================================================
// Error taxonomy for the history and relay paths
// =============================================================================
//
// `anyhow` stays at the edges (startup, config, the monitor binary). Both
// request paths return these typed errors so callers can tell transport
// faults apart from protocol faults and from a clean close.
// =============================================================================

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::warn;

// =============================================================================
// History
// =============================================================================

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid ticker: {0:?}")]
    InvalidTicker(String),

    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(#[source] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("malformed upstream payload: {0}")]
    MalformedPayload(String),
}

impl HistoryError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidTicker(_) => StatusCode::BAD_REQUEST,
            Self::UnknownTicker(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable(_)
            | Self::UpstreamStatus { .. }
            | Self::MalformedPayload(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for HistoryError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            warn!(error = %self, "history request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Relay
// =============================================================================

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("failed to connect to upstream feed: {0}")]
    UpstreamConnect(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("upstream feed transport error: {0}")]
    UpstreamTransport(#[source] tokio_tungstenite::tungstenite::Error),

    #[error("upstream rejected request: {0}")]
    UpstreamRejected(String),

    #[error("upstream protocol error: {0}")]
    Protocol(String),

    #[error("downstream transport error: {0}")]
    DownstreamTransport(#[source] axum::Error),

    #[error("failed to encode packet: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl RelayError {
    /// True for faults raised by the network rather than by message content.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::UpstreamConnect(_) | Self::UpstreamTransport(_) | Self::DownstreamTransport(_)
        )
    }
}
