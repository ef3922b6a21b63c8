//! Herakles FreeBSD Exporter Library
//!
//! Decodes FreeBSD kernel counters from their native binary layouts and
//! exposes them as Prometheus counters. The library is the decode path only;
//! the `herakles-freebsd-exporter` binary decides when to collect and serves
//! the results over HTTP.
//!
//! # Collectors
//!
//! - **cpu**: `kern.cp_times` ticks converted to `node_cpu_seconds_total`
//!   using the statistics clock from `kern.clockrate`
//! - **devstat**: per-device `node_devstat_*` byte, transfer, duration,
//!   busy time and block counters from `kern.devstat.all`
//!
//! # Usage
//!
//! ```rust
//! use herakles_freebsd_exporter::collectors::{self, CollectorOptions};
//! use herakles_freebsd_exporter::exporter::NodeCollector;
//! use herakles_freebsd_exporter::kernel;
//! use prometheus::Registry;
//!
//! let names = vec!["cpu".to_string(), "devstat".to_string()];
//! let collectors =
//!     collectors::build(&names, kernel::native(), &CollectorOptions::default()).unwrap();
//!
//! let registry = Registry::new();
//! registry
//!     .register(Box::new(NodeCollector::new(collectors).unwrap()))
//!     .unwrap();
//!
//! for family in registry.gather() {
//!     println!("{}", family.name());
//! }
//! ```

pub mod collectors;
pub mod desc;
pub mod error;
pub mod exporter;
pub mod kernel;
pub mod layout;

// Re-export main types for convenience
pub use collectors::{Collector, CollectorOptions};
pub use desc::{Sample, SampleSink, TypedDesc, ValueKind};
pub use error::{CollectError, KernelError, LayoutError};
pub use exporter::NodeCollector;
pub use kernel::KernelSource;
