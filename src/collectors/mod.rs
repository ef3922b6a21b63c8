//! Collectors for FreeBSD kernel counters.
//!
//! Each collector decodes one family of kernel counters into samples. The
//! exporter builds the enabled ones explicitly through [`build`]; nothing
//! registers itself on load.

use std::sync::Arc;

use crate::desc::{SampleSink, TypedDesc};
use crate::error::CollectError;
use crate::kernel::KernelSource;

pub mod cpu;
pub mod devstat;

pub use cpu::CpuCollector;
pub use devstat::{DevstatCollector, DevstatOptions};

/// A source of samples for one collection cycle.
pub trait Collector: Send + Sync {
    /// Short name used in configuration and scrape telemetry.
    fn name(&self) -> &'static str;

    /// Every descriptor this collector can emit, available before any
    /// collection happened.
    fn descs(&self) -> Vec<&TypedDesc>;

    /// Runs one collection cycle. On error nothing has been emitted.
    fn update(&self, sink: &mut dyn SampleSink) -> Result<(), CollectError>;
}

/// Names accepted by [`build`], in exposition order.
pub const AVAILABLE: &[&str] = &[cpu::NAME, devstat::NAME];

/// Options shared by the collector constructors.
#[derive(Debug, Clone, Default)]
pub struct CollectorOptions {
    pub devstat: DevstatOptions,
}

/// Errors from [`build`].
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unknown collector '{0}' (available: {list})", list = AVAILABLE.join(", "))]
    Unknown(String),

    #[error("collector '{name}': {source}")]
    Descriptor {
        name: String,
        #[source]
        source: prometheus::Error,
    },
}

/// Builds the named collectors over `kernel`.
pub fn build(
    names: &[String],
    kernel: Arc<dyn KernelSource>,
    options: &CollectorOptions,
) -> Result<Vec<Box<dyn Collector>>, BuildError> {
    names
        .iter()
        .map(|name| {
            let descriptor = |source| BuildError::Descriptor {
                name: name.clone(),
                source,
            };
            let collector: Box<dyn Collector> = match name.as_str() {
                cpu::NAME => Box::new(CpuCollector::new(kernel.clone()).map_err(descriptor)?),
                devstat::NAME => Box::new(
                    DevstatCollector::new(kernel.clone(), options.devstat.clone())
                        .map_err(descriptor)?,
                ),
                other => return Err(BuildError::Unknown(other.to_string())),
            };
            Ok(collector)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel;

    #[test]
    fn test_build_known_collectors() {
        let names: Vec<String> = AVAILABLE.iter().map(|s| s.to_string()).collect();
        let collectors = build(&names, kernel::native(), &CollectorOptions::default()).unwrap();
        let built: Vec<_> = collectors.iter().map(|c| c.name()).collect();
        assert_eq!(built, AVAILABLE);
    }

    #[test]
    fn test_build_unknown_collector() {
        let names = vec!["cpu".to_string(), "zfs".to_string()];
        let err = build(&names, kernel::native(), &CollectorOptions::default())
            .err()
            .expect("unknown collector must fail");
        assert!(matches!(err, BuildError::Unknown(ref n) if n == "zfs"));
        assert!(err.to_string().contains("cpu, devstat"));
    }
}
