//! Kernel source for targets without devstat/cp_times sysctls.

use crate::error::KernelError;
use crate::kernel::KernelSource;
use crate::layout::DeviceStats;

/// Fails every query with [`KernelError::Unsupported`].
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedKernel;

impl KernelSource for UnsupportedKernel {
    fn device_count(&self) -> Result<usize, KernelError> {
        Err(KernelError::Unsupported)
    }

    fn device_stats(
        &self,
        _index: usize,
        _duration_weight: f64,
    ) -> Result<DeviceStats, KernelError> {
        Err(KernelError::Unsupported)
    }

    fn raw(&self, _name: &str) -> Result<Vec<u8>, KernelError> {
        Err(KernelError::Unsupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_query_is_unsupported() {
        let kernel = UnsupportedKernel;
        assert!(matches!(kernel.device_count(), Err(KernelError::Unsupported)));
        assert!(matches!(
            kernel.device_stats(0, 1.0),
            Err(KernelError::Unsupported)
        ));
        assert!(matches!(
            kernel.raw("kern.cp_times"),
            Err(KernelError::Unsupported)
        ));
    }
}
