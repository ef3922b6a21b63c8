//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the enabled collectors and available endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use tracing::{debug, instrument};

use crate::config::{DEFAULT_BIND_ADDR, DEFAULT_PORT};
use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");
    state.record_http_request();

    let version = env!("CARGO_PKG_VERSION");

    let uptime_secs = state.start_time.elapsed().as_secs();
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    let uptime_str = format!("{}h {}m {}s", hours, minutes, seconds);

    let collectors = state
        .collectors
        .iter()
        .map(|name| format!("<code>{name}</code>"))
        .collect::<Vec<_>>()
        .join(" ");

    let scheme = if state.config.enable_tls.unwrap_or(false) {
        "https"
    } else {
        "http"
    };
    let listen = format!(
        "{}://{}:{}",
        scheme,
        state.config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR),
        state.config.port.unwrap_or(DEFAULT_PORT)
    );

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herakles FreeBSD Exporter</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{
            color: #333;
            border-bottom: 3px solid #007bff;
            padding-bottom: 15px;
        }}
        .info {{
            background: #e9ecef;
            padding: 15px;
            border-radius: 4px;
            display: flex;
            justify-content: space-around;
            flex-wrap: wrap;
        }}
        .info-label {{
            font-weight: 600;
            color: #555;
            display: block;
            font-size: 0.9em;
        }}
        .endpoint-list li {{
            margin: 15px 0;
            padding: 10px;
            background: #f8f9fa;
            border-left: 4px solid #007bff;
            list-style: none;
        }}
        .footer {{
            margin-top: 40px;
            border-top: 1px solid #ddd;
            color: #666;
            font-size: 0.9em;
            text-align: center;
        }}
        code {{
            background: #e9ecef;
            padding: 2px 6px;
            border-radius: 3px;
        }}
    </style>
</head>
<body>
<div class="container">
    <h1>Herakles FreeBSD Exporter</h1>

    <div class="info">
        <div><span class="info-label">Version</span>{version}</div>
        <div><span class="info-label">Uptime</span>{uptime}</div>
        <div><span class="info-label">Listening</span>{listen}</div>
        <div><span class="info-label">Collectors</span>{collectors}</div>
    </div>

    <h2>Available Endpoints</h2>
    <ul class="endpoint-list">
        <li><a href="/metrics">/metrics</a> Prometheus-compatible metrics endpoint</li>
        <li><a href="/health">/health</a> Exporter health (text)</li>
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        listen = listen,
        collectors = collectors,
        footer = FOOTER_TEXT
    );

    Html(html)
}
