//! Device I/O statistics collector.
//!
//! This module reads lifetime per-device counters from the devstat facility
//! and exposes them as `node_devstat_*` counters labeled by device.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use crate::collectors::Collector;
use crate::desc::{SampleSink, TypedDesc, ValueKind, NAMESPACE};
use crate::error::{CollectError, KernelError};
use crate::kernel::{KernelSource, DURATION_WEIGHT_EVEN};
use crate::layout::DeviceStats;

pub const NAME: &str = "devstat";

const SUBSYSTEM: &str = "devstat";

/// Tunables for the devstat collector.
#[derive(Debug, Clone, Default)]
pub struct DevstatOptions {
    /// Devices whose label (e.g. `cd0`) matches are not exported.
    pub ignored_devices: Option<Regex>,
}

pub struct DevstatCollector {
    kernel: Arc<dyn KernelSource>,
    options: DevstatOptions,
    bytes: TypedDesc,
    transfers: TypedDesc,
    duration: TypedDesc,
    busy_time: TypedDesc,
    blocks: TypedDesc,
}

impl DevstatCollector {
    pub fn new(kernel: Arc<dyn KernelSource>, options: DevstatOptions) -> prometheus::Result<Self> {
        let counter = |name: &str, help: &str, labels: &[&str]| {
            TypedDesc::new(NAMESPACE, SUBSYSTEM, name, help, labels, ValueKind::Counter)
        };
        Ok(Self {
            kernel,
            options,
            bytes: counter(
                "bytes_total",
                "The total number of bytes in transactions.",
                &["device", "type"],
            )?,
            transfers: counter(
                "transfers_total",
                "The total number of transactions.",
                &["device", "type"],
            )?,
            duration: counter(
                "duration_seconds_total",
                "The total duration of transactions in seconds.",
                &["device", "type"],
            )?,
            busy_time: counter(
                "busy_time_seconds_total",
                "Total time the device had one or more transactions outstanding in seconds.",
                &["device"],
            )?,
            blocks: counter(
                "blocks_transferred_total",
                "The total number of blocks transferred.",
                &["device"],
            )?,
        })
    }

    /// Queries every device. Fails as a whole if any single query fails.
    pub fn device_stats(&self) -> Result<Vec<DeviceStats>, CollectError> {
        let count = self.kernel.device_count().map_err(|e| match e {
            KernelError::Allocation { .. } => CollectError::Allocation(e),
            e => CollectError::Enumeration(e),
        })?;

        let devices = (0..count)
            .map(|index| {
                self.kernel
                    .device_stats(index, DURATION_WEIGHT_EVEN)
                    .map_err(CollectError::query(format!("devstat device {index}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = devices.len(), "decoded devstat records");
        Ok(devices)
    }

    fn is_ignored(&self, device: &str) -> bool {
        self.options
            .ignored_devices
            .as_ref()
            .is_some_and(|re| re.is_match(device))
    }

    // "free" counters are decoded but not exported.
    fn emit_device(&self, stats: &DeviceStats, device: &str, sink: &mut dyn SampleSink) {
        let b = &stats.bytes;
        let t = &stats.transfers;
        let d = &stats.duration;

        sink.emit(self.bytes.sample(b.read as f64, &[device, "read"]));
        sink.emit(self.bytes.sample(b.write as f64, &[device, "write"]));
        sink.emit(self.transfers.sample(t.other as f64, &[device, "other"]));
        sink.emit(self.transfers.sample(t.read as f64, &[device, "read"]));
        sink.emit(self.transfers.sample(t.write as f64, &[device, "write"]));
        sink.emit(self.duration.sample(d.other, &[device, "other"]));
        sink.emit(self.duration.sample(d.read, &[device, "read"]));
        sink.emit(self.duration.sample(d.write, &[device, "write"]));
        sink.emit(self.busy_time.sample(stats.busy_time, &[device]));
        sink.emit(self.blocks.sample(stats.blocks as f64, &[device]));
    }
}

impl Collector for DevstatCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn descs(&self) -> Vec<&TypedDesc> {
        vec![
            &self.bytes,
            &self.transfers,
            &self.duration,
            &self.busy_time,
            &self.blocks,
        ]
    }

    fn update(&self, sink: &mut dyn SampleSink) -> Result<(), CollectError> {
        for stats in self.device_stats()? {
            let device = stats.display_name();
            if self.is_ignored(&device) {
                debug!(device = %device, "ignoring device");
                continue;
            }
            self.emit_device(&stats, &device, sink);
        }
        Ok(())
    }
}
