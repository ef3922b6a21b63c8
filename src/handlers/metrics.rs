//! Metrics endpoint handler for Prometheus scraping.
//!
//! Every request runs the enabled collectors once through the registry and
//! returns the result in the Prometheus text format. Nothing is cached
//! between scrapes.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Initial buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    GatherFailed,
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        let message = match self {
            MetricsError::GatherFailed => "Failed to gather metrics",
            MetricsError::EncodingFailed => "Failed to encode metrics",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");
    state.record_http_request();

    // Collectors issue blocking sysctl calls.
    let registry = state.registry.clone();
    let body = tokio::task::spawn_blocking(move || render(&registry))
        .await
        .map_err(|e| {
            error!("Metrics gather task failed: {}", e);
            MetricsError::GatherFailed
        })??;

    debug!(
        bytes = body.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Served /metrics"
    );
    Ok((
        [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
        body,
    ))
}

/// Gathers the registry and encodes it as text.
pub fn render(registry: &prometheus::Registry) -> Result<String, MetricsError> {
    let families = registry.gather();
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| {
            error!("Failed to encode metrics: {}", e);
            MetricsError::EncodingFailed
        })?;
    String::from_utf8(buffer).map_err(|e| {
        error!("Encoded metrics are not valid UTF-8: {}", e);
        MetricsError::EncodingFailed
    })
}
