//! Application state management for the exporter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers, and builds the node collector it serves.

use anyhow::Context;
use herakles_freebsd_exporter::collectors;
use herakles_freebsd_exporter::exporter::NodeCollector;
use herakles_freebsd_exporter::kernel;
use prometheus::Registry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Global application state shared across requests.
pub struct AppState {
    /// Registry holding the node collector and build info.
    pub registry: Registry,
    pub config: Arc<Config>,
    /// Names of the collectors registered, in exposition order.
    pub collectors: Vec<&'static str>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
    http_requests: AtomicU64,
}

impl AppState {
    pub fn new(registry: Registry, config: Config, collectors: Vec<&'static str>) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            collectors,
            start_time: Instant::now(),
            http_requests: AtomicU64::new(0),
        }
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn http_requests(&self) -> u64 {
        self.http_requests.load(Ordering::Relaxed)
    }
}

/// Builds the configured collectors over the host kernel.
pub fn build_node_collector(config: &Config) -> anyhow::Result<NodeCollector> {
    let options = config
        .collector_options()
        .context("invalid devstat_ignored_devices pattern")?;
    let names = config.enabled_collectors();
    let built = collectors::build(&names, kernel::native(), &options)
        .with_context(|| format!("failed to build collectors {}", names.join(",")))?;
    NodeCollector::new(built).context("failed to create scrape telemetry descriptors")
}
