//! CPU time collector.
//!
//! Reads the per-CPU tick counters from `kern.cp_times` and converts them to
//! seconds using the statistics clock from `kern.clockrate`.

use std::sync::Arc;

use tracing::debug;

use crate::collectors::Collector;
use crate::desc::{SampleSink, TypedDesc, ValueKind, NAMESPACE};
use crate::error::CollectError;
use crate::kernel::KernelSource;
use crate::layout::{decode_cp_times, ClockInfo, CpuTimes};

pub const NAME: &str = "cpu";

const CLOCKRATE: &str = "kern.clockrate";
const CP_TIMES: &str = "kern.cp_times";

pub struct CpuCollector {
    kernel: Arc<dyn KernelSource>,
    seconds: TypedDesc,
}

impl CpuCollector {
    pub fn new(kernel: Arc<dyn KernelSource>) -> prometheus::Result<Self> {
        Ok(Self {
            kernel,
            seconds: TypedDesc::new(
                NAMESPACE,
                "cpu",
                "seconds_total",
                "Seconds the CPU spent in each mode.",
                &["cpu", "mode"],
                ValueKind::Counter,
            )?,
        })
    }

    /// Reads and decodes the current per-CPU times.
    pub fn cpu_times(&self) -> Result<Vec<CpuTimes>, CollectError> {
        let layout = self.kernel.layout();

        let clock_raw = self
            .kernel
            .raw(CLOCKRATE)
            .map_err(CollectError::query(CLOCKRATE))?;
        let clock = ClockInfo::decode(&clock_raw, layout)
            .map_err(|e| CollectError::query(CLOCKRATE)(e.into()))?;

        let ticks = self
            .kernel
            .raw(CP_TIMES)
            .map_err(CollectError::query(CP_TIMES))?;

        let frequency = clock.tick_frequency()?;
        debug!(
            hz = clock.hz,
            stathz = clock.stathz,
            frequency,
            bytes = ticks.len(),
            "decoding cp_times"
        );
        Ok(decode_cp_times(&ticks, layout, frequency)?)
    }
}

impl Collector for CpuCollector {
    fn name(&self) -> &'static str {
        NAME
    }

    fn descs(&self) -> Vec<&TypedDesc> {
        vec![&self.seconds]
    }

    fn update(&self, sink: &mut dyn SampleSink) -> Result<(), CollectError> {
        for cpu in self.cpu_times()? {
            let index = cpu.index.to_string();
            for (mode, seconds) in cpu.modes() {
                sink.emit(self.seconds.sample(seconds, &[&index, mode]));
            }
        }
        Ok(())
    }
}
