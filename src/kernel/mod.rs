//! Kernel query interface consumed by the collectors.
//!
//! This module provides:
//! - `KernelSource`: the three queries the decoders depend on
//! - `devstat`: devstat enumeration over any raw sysctl fetch
//! - `sysctl`: the FreeBSD implementation on top of `sysctlbyname(3)`
//! - `unsupported`: a stand-in for every other target

use std::sync::Arc;

use crate::error::KernelError;
use crate::layout::{DeviceStats, NativeLayout};

pub mod devstat;
#[cfg(target_os = "freebsd")]
pub mod sysctl;
#[cfg(not(target_os = "freebsd"))]
pub mod unsupported;

/// Duration weighting passed to per-device queries: every transaction
/// weighted evenly, which is the kernel's default.
pub const DURATION_WEIGHT_EVEN: f64 = 1.0;

/// Queries against the running kernel.
///
/// Every call is a full round trip; implementations keep no state between
/// calls.
pub trait KernelSource: Send + Sync {
    /// Number of devices currently known to devstat.
    fn device_count(&self) -> Result<usize, KernelError>;

    /// Lifetime statistics of the device at `index`.
    fn device_stats(&self, index: usize, duration_weight: f64) -> Result<DeviceStats, KernelError>;

    /// Raw value of the sysctl `name`.
    fn raw(&self, name: &str) -> Result<Vec<u8>, KernelError>;

    /// Layout the raw buffers are encoded with.
    fn layout(&self) -> NativeLayout {
        NativeLayout::host()
    }
}

impl<K: KernelSource + ?Sized> KernelSource for Arc<K> {
    fn device_count(&self) -> Result<usize, KernelError> {
        (**self).device_count()
    }

    fn device_stats(&self, index: usize, duration_weight: f64) -> Result<DeviceStats, KernelError> {
        (**self).device_stats(index, duration_weight)
    }

    fn raw(&self, name: &str) -> Result<Vec<u8>, KernelError> {
        (**self).raw(name)
    }

    fn layout(&self) -> NativeLayout {
        (**self).layout()
    }
}

/// The kernel source for the host this binary runs on.
pub fn native() -> Arc<dyn KernelSource> {
    #[cfg(target_os = "freebsd")]
    {
        Arc::new(sysctl::SysctlKernel::new())
    }
    #[cfg(not(target_os = "freebsd"))]
    {
        Arc::new(unsupported::UnsupportedKernel)
    }
}
