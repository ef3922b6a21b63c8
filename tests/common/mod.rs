// Shared test helpers: an in-memory kernel source.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use herakles_freebsd_exporter::layout::{
    ByteCounters, DeviceStats, DurationCounters, NativeLayout, TransferCounters,
};
use herakles_freebsd_exporter::{KernelError, KernelSource};

/// How `device_count` behaves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CountMode {
    Ok,
    EnumerationFailure,
    AllocationFailure,
}

pub struct FakeKernel {
    pub count_mode: CountMode,
    pub devices: Vec<DeviceStats>,
    pub failing_device: Option<usize>,
    pub sysctls: HashMap<String, Vec<u8>>,
    pub device_queries: Mutex<Vec<(usize, f64)>>,
    pub raw_queries: AtomicUsize,
}

impl FakeKernel {
    pub fn new() -> Self {
        Self {
            count_mode: CountMode::Ok,
            devices: Vec::new(),
            failing_device: None,
            sysctls: HashMap::new(),
            device_queries: Mutex::new(Vec::new()),
            raw_queries: AtomicUsize::new(0),
        }
    }

    pub fn with_clock(mut self, hz: i32, stathz: i32) -> Self {
        self.sysctls
            .insert("kern.clockrate".to_string(), clockrate(hz, stathz));
        self
    }

    pub fn with_cp_times(mut self, ticks: &[i64]) -> Self {
        self.sysctls
            .insert("kern.cp_times".to_string(), cp_times(ticks));
        self
    }

    pub fn with_device(mut self, stats: DeviceStats) -> Self {
        self.devices.push(stats);
        self
    }

    pub fn device_queries(&self) -> Vec<(usize, f64)> {
        self.device_queries.lock().unwrap().clone()
    }
}

impl KernelSource for FakeKernel {
    fn device_count(&self) -> Result<usize, KernelError> {
        match self.count_mode {
            CountMode::Ok => Ok(self.devices.len()),
            CountMode::EnumerationFailure => Err(KernelError::Sysctl {
                name: "kern.devstat.all".to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            }),
            CountMode::AllocationFailure => Err(KernelError::Allocation {
                what: "kern.devstat.all".to_string(),
                source: Vec::<u8>::new().try_reserve(usize::MAX).unwrap_err(),
            }),
        }
    }

    fn device_stats(&self, index: usize, duration_weight: f64) -> Result<DeviceStats, KernelError> {
        self.device_queries
            .lock()
            .unwrap()
            .push((index, duration_weight));
        if self.failing_device == Some(index) {
            return Err(KernelError::Sysctl {
                name: "kern.devstat.all".to_string(),
                source: io::Error::other("device vanished"),
            });
        }
        self.devices
            .get(index)
            .cloned()
            .ok_or(KernelError::NoSuchDevice {
                index,
                count: self.devices.len(),
            })
    }

    fn raw(&self, name: &str) -> Result<Vec<u8>, KernelError> {
        self.raw_queries.fetch_add(1, Ordering::SeqCst);
        self.sysctls
            .get(name)
            .cloned()
            .ok_or_else(|| KernelError::Sysctl {
                name: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "unknown oid"),
            })
    }

    fn layout(&self) -> NativeLayout {
        NativeLayout::lp64_le()
    }
}

/// Little-endian `struct clockinfo`.
pub fn clockrate(hz: i32, stathz: i32) -> Vec<u8> {
    [hz, 0, 0, stathz, 0]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

/// Little-endian LP64 `kern.cp_times`.
pub fn cp_times(ticks: &[i64]) -> Vec<u8> {
    ticks.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// A device with distinct, recognisable counter values.
pub fn device(name: &str, unit: i32, seed: u64) -> DeviceStats {
    DeviceStats {
        device: name.to_string(),
        unit,
        bytes: ByteCounters {
            read: seed * 1000 + 1,
            write: seed * 1000 + 2,
            free: seed * 1000 + 3,
        },
        transfers: TransferCounters {
            other: seed * 100 + 4,
            read: seed * 100 + 5,
            write: seed * 100 + 6,
            free: seed * 100 + 7,
        },
        duration: DurationCounters {
            other: seed as f64 + 0.25,
            read: seed as f64 + 0.5,
            write: seed as f64 + 0.75,
            free: seed as f64 + 0.125,
        },
        busy_time: seed as f64 * 10.0,
        blocks: seed * 8,
    }
}
