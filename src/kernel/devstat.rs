//! Devstat queries on top of a raw sysctl fetch.
//!
//! `kern.devstat.all` is a `long` generation number followed by packed
//! `struct devstat` records. The fetch function is injected, so the whole
//! enumeration and record selection runs against hand-built buffers too.

use std::fmt;

use tracing::{debug, trace};

use crate::error::{KernelError, LayoutError};
use crate::kernel::KernelSource;
use crate::layout::{
    devstat_records, ByteReader, DevstatLayout, DeviceStats, NativeLayout, DEVSTAT_VERSION,
};

pub const DEVSTAT_VERSION_SYSCTL: &str = "kern.devstat.version";
pub const DEVSTAT_ALL_SYSCTL: &str = "kern.devstat.all";

/// Kernel source reading devstat through `fetch`, which returns the raw
/// bytes of a named sysctl.
#[derive(Clone, Copy)]
pub struct DevstatSource<F> {
    fetch: F,
    layout: NativeLayout,
}

impl<F> DevstatSource<F>
where
    F: Fn(&str) -> Result<Vec<u8>, KernelError>,
{
    pub fn with_fetch(fetch: F, layout: NativeLayout) -> Self {
        Self { fetch, layout }
    }

    fn devstat_table(&self) -> Result<DevstatLayout, KernelError> {
        DevstatLayout::for_layout(self.layout).ok_or(KernelError::Unsupported)
    }

    fn check_devstat_version(&self) -> Result<(), KernelError> {
        let raw = (self.fetch)(DEVSTAT_VERSION_SYSCTL)?;
        let found = ByteReader::new(&raw, self.layout, DEVSTAT_VERSION_SYSCTL).i32_at(0)?;
        if found != DEVSTAT_VERSION {
            return Err(LayoutError::Version {
                found,
                expected: DEVSTAT_VERSION,
            }
            .into());
        }
        Ok(())
    }
}

impl<F> fmt::Debug for DevstatSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevstatSource")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl<F> KernelSource for DevstatSource<F>
where
    F: Fn(&str) -> Result<Vec<u8>, KernelError> + Send + Sync,
{
    fn device_count(&self) -> Result<usize, KernelError> {
        let table = self.devstat_table()?;
        self.check_devstat_version()?;
        let all = (self.fetch)(DEVSTAT_ALL_SYSCTL)?;
        let count = devstat_records(&all, &table, self.layout)?.len();
        debug!(count, "enumerated devstat devices");
        Ok(count)
    }

    fn device_stats(&self, index: usize, duration_weight: f64) -> Result<DeviceStats, KernelError> {
        // Lifetime totals are independent of the weighting factor, which only
        // scales per-interval rates.
        trace!(index, duration_weight, "reading devstat record");
        let table = self.devstat_table()?;
        let all = (self.fetch)(DEVSTAT_ALL_SYSCTL)?;
        let mut records = devstat_records(&all, &table, self.layout)?;
        let count = records.len();
        let record = records
            .nth(index)
            .ok_or(KernelError::NoSuchDevice { index, count })?;
        Ok(DeviceStats::decode(record, &table, self.layout)?)
    }

    fn raw(&self, name: &str) -> Result<Vec<u8>, KernelError> {
        (self.fetch)(name)
    }

    fn layout(&self) -> NativeLayout {
        self.layout
    }
}
