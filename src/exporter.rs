//! Prometheus registry integration.
//!
//! [`NodeCollector`] runs the enabled collectors on every scrape, records how
//! long each took and whether it succeeded, and turns their samples into
//! metric families.

use std::time::Instant;

use ahash::AHashMap as HashMap;
use prometheus::core::{Collector as PromCollector, Desc};
use prometheus::proto::{Metric, MetricFamily};
use prometheus::{GaugeVec, Opts, Registry};
use rayon::prelude::*;
use tracing::{debug, error};

use crate::collectors::Collector;
use crate::desc::{Sample, TypedDesc, ValueKind, NAMESPACE};

/// Outcome of one collector during a scrape.
#[derive(Debug)]
pub struct CollectorOutcome {
    pub name: &'static str,
    pub samples: Vec<Sample>,
    pub duration_seconds: f64,
    pub success: bool,
}

/// Registry adapter over a fixed set of collectors.
pub struct NodeCollector {
    collectors: Vec<Box<dyn Collector>>,
    scrape_duration: TypedDesc,
    scrape_success: TypedDesc,
}

impl NodeCollector {
    pub fn new(collectors: Vec<Box<dyn Collector>>) -> prometheus::Result<Self> {
        Ok(Self {
            collectors,
            scrape_duration: TypedDesc::new(
                NAMESPACE,
                "scrape",
                "collector_duration_seconds",
                "Duration of a collector scrape.",
                &["collector"],
                ValueKind::Gauge,
            )?,
            scrape_success: TypedDesc::new(
                NAMESPACE,
                "scrape",
                "collector_success",
                "Whether a collector succeeded.",
                &["collector"],
                ValueKind::Gauge,
            )?,
        })
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(|c| c.name()).collect()
    }

    /// Runs every collector once, in parallel. A failed collector contributes
    /// no samples.
    pub fn run(&self) -> Vec<CollectorOutcome> {
        self.collectors
            .par_iter()
            .map(|collector| execute(collector.as_ref()))
            .collect()
    }

    /// Samples of one scrape: collector samples first, then scrape telemetry.
    pub fn samples(&self) -> Vec<Sample> {
        let outcomes = self.run();
        let mut samples = Vec::new();
        let mut telemetry = Vec::with_capacity(outcomes.len() * 2);
        for outcome in outcomes {
            telemetry.push(
                self.scrape_duration
                    .sample(outcome.duration_seconds, &[outcome.name]),
            );
            telemetry.push(
                self.scrape_success
                    .sample(if outcome.success { 1.0 } else { 0.0 }, &[outcome.name]),
            );
            samples.extend(outcome.samples);
        }
        samples.extend(telemetry);
        samples
    }
}

fn execute(collector: &dyn Collector) -> CollectorOutcome {
    let name = collector.name();
    let start = Instant::now();
    let mut samples = Vec::new();
    let success = match collector.update(&mut samples) {
        Ok(()) => {
            debug!(collector = name, samples = samples.len(), "collector succeeded");
            true
        }
        Err(e) => {
            error!(collector = name, error = %e, "collector failed");
            samples.clear();
            false
        }
    };
    CollectorOutcome {
        name,
        samples,
        duration_seconds: start.elapsed().as_secs_f64(),
        success,
    }
}

/// Groups samples into metric families, keeping first-seen family order.
#[allow(deprecated)]
pub fn into_families(samples: Vec<Sample>) -> Vec<MetricFamily> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(MetricFamily, Vec<Metric>)> = Vec::new();
    for sample in samples {
        let slot = *index.entry(sample.fq_name().to_string()).or_insert_with(|| {
            let mut family = MetricFamily::default();
            family.set_name(sample.fq_name().to_string());
            family.set_help(sample.help().to_string());
            family.set_field_type(sample.kind().metric_type());
            groups.push((family, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(sample.to_metric());
    }
    groups
        .into_iter()
        .map(|(mut family, metrics)| {
            family.set_metric(metrics);
            family
        })
        .collect()
}

impl PromCollector for NodeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.collectors
            .iter()
            .flat_map(|c| c.descs())
            .chain([&self.scrape_duration, &self.scrape_success])
            .map(TypedDesc::desc)
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        into_families(self.samples())
    }
}

/// Registers `node_exporter_build_info` with constant value 1.
pub fn register_build_info(registry: &Registry) -> prometheus::Result<GaugeVec> {
    let build_info = GaugeVec::new(
        Opts::new(
            "node_exporter_build_info",
            "A metric with a constant '1' value labeled by version, revision and build date.",
        ),
        &["version", "revision", "build_date"],
    )?;
    registry.register(Box::new(build_info.clone()))?;
    build_info
        .with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
        ])
        .set(1.0);
    Ok(build_info)
}
