//! Typed metric descriptors and the samples they produce.
//!
//! A [`TypedDesc`] couples a `prometheus` descriptor with the value kind it
//! is exported as. Collectors call [`TypedDesc::sample`] for every value they
//! decode and push the result into a caller-owned [`SampleSink`].

use std::collections::HashMap;
use std::sync::{mpsc, Arc};

use prometheus::core::Desc;
use prometheus::proto::{self, LabelPair, MetricType};
use tracing::trace;

/// Namespace shared by every metric this exporter produces.
pub const NAMESPACE: &str = "node";

/// Joins the non-empty parts with `_`, like `prometheus.BuildFQName`.
pub fn build_fq_name(namespace: &str, subsystem: &str, name: &str) -> String {
    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// How a sample is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Counter,
    Gauge,
}

impl ValueKind {
    pub fn metric_type(self) -> MetricType {
        match self {
            ValueKind::Counter => MetricType::COUNTER,
            ValueKind::Gauge => MetricType::GAUGE,
        }
    }
}

/// A metric descriptor plus the kind its samples carry.
#[derive(Debug, Clone)]
pub struct TypedDesc {
    desc: Arc<Desc>,
    kind: ValueKind,
}

impl TypedDesc {
    pub fn new(
        namespace: &str,
        subsystem: &str,
        name: &str,
        help: &str,
        labels: &[&str],
        kind: ValueKind,
    ) -> prometheus::Result<Self> {
        let desc = Desc::new(
            build_fq_name(namespace, subsystem, name),
            help.to_string(),
            labels.iter().map(|l| l.to_string()).collect(),
            HashMap::new(),
        )?;
        Ok(Self {
            desc: Arc::new(desc),
            kind,
        })
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    pub fn fq_name(&self) -> &str {
        &self.desc.fq_name
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Builds one sample.
    ///
    /// # Panics
    ///
    /// If `label_values` does not match the descriptor's label arity. That is
    /// a bug in the calling collector, not a property of the kernel data.
    pub fn sample(&self, value: f64, label_values: &[&str]) -> Sample {
        assert_eq!(
            label_values.len(),
            self.desc.variable_labels.len(),
            "{}: got {} label values for labels {:?}",
            self.desc.fq_name,
            label_values.len(),
            self.desc.variable_labels,
        );
        Sample {
            desc: Arc::clone(&self.desc),
            kind: self.kind,
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
        }
    }
}

/// One emitted value of a metric.
#[derive(Debug, Clone)]
pub struct Sample {
    desc: Arc<Desc>,
    kind: ValueKind,
    label_values: Vec<String>,
    value: f64,
}

impl Sample {
    pub fn fq_name(&self) -> &str {
        &self.desc.fq_name
    }

    pub fn help(&self) -> &str {
        &self.desc.help
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn label_values(&self) -> &[String] {
        &self.label_values
    }

    /// Value of the named label, if the descriptor declares it.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.desc
            .variable_labels
            .iter()
            .position(|l| l == name)
            .map(|i| self.label_values[i].as_str())
    }

    /// Converts into a protobuf metric with sorted label pairs.
    #[allow(deprecated)]
    pub fn to_metric(&self) -> proto::Metric {
        let mut pairs: Vec<LabelPair> = self
            .desc
            .variable_labels
            .iter()
            .zip(&self.label_values)
            .map(|(name, value)| {
                let mut pair = LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();
        pairs.sort_by(|a, b| a.name().cmp(b.name()));

        let mut metric = proto::Metric::from_label(pairs);
        match self.kind {
            ValueKind::Counter => {
                let mut counter = proto::Counter::default();
                counter.set_value(self.value);
                metric.set_counter(counter);
            }
            ValueKind::Gauge => {
                let mut gauge = proto::Gauge::default();
                gauge.set_value(self.value);
                metric.set_gauge(gauge);
            }
        }
        metric
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.desc.fq_name == other.desc.fq_name
            && self.kind == other.kind
            && self.label_values == other.label_values
            && self.value.to_bits() == other.value.to_bits()
    }
}

/// Destination for samples produced during a collection cycle.
pub trait SampleSink {
    fn emit(&mut self, sample: Sample);
}

impl SampleSink for Vec<Sample> {
    fn emit(&mut self, sample: Sample) {
        self.push(sample);
    }
}

impl SampleSink for mpsc::Sender<Sample> {
    fn emit(&mut self, sample: Sample) {
        if self.send(sample).is_err() {
            trace!("sample receiver dropped");
        }
    }
}

impl SampleSink for mpsc::SyncSender<Sample> {
    fn emit(&mut self, sample: Sample) {
        if self.send(sample).is_err() {
            trace!("sample receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfers() -> TypedDesc {
        TypedDesc::new(
            NAMESPACE,
            "devstat",
            "transfers_total",
            "The total number of transactions.",
            &["device", "type"],
            ValueKind::Counter,
        )
        .unwrap()
    }

    #[test]
    fn test_build_fq_name() {
        assert_eq!(
            build_fq_name("node", "cpu", "seconds_total"),
            "node_cpu_seconds_total"
        );
        assert_eq!(build_fq_name("node", "", "up"), "node_up");
        assert_eq!(build_fq_name("", "", "up"), "up");
    }

    #[test]
    fn test_sample_carries_labels() {
        let sample = transfers().sample(42.0, &["ada0", "read"]);
        assert_eq!(sample.fq_name(), "node_devstat_transfers_total");
        assert_eq!(sample.kind(), ValueKind::Counter);
        assert_eq!(sample.value(), 42.0);
        assert_eq!(sample.label("device"), Some("ada0"));
        assert_eq!(sample.label("type"), Some("read"));
        assert_eq!(sample.label("cpu"), None);
    }

    #[test]
    fn test_sample_passes_values_through() {
        let desc = transfers();
        assert_eq!(desc.sample(0.0, &["ada0", "read"]).value(), 0.0);
        let big = u64::MAX as f64;
        assert_eq!(desc.sample(big, &["ada0", "read"]).value(), big);
    }

    #[test]
    #[should_panic(expected = "label values")]
    fn test_sample_wrong_arity_panics() {
        transfers().sample(1.0, &["ada0"]);
    }

    #[test]
    fn test_to_metric_counter() {
        let metric = transfers().sample(3.0, &["ada0", "write"]).to_metric();
        assert_eq!(metric.counter.value(), 3.0);
        let labels: Vec<_> = metric
            .label
            .iter()
            .map(|p| (p.name().to_string(), p.value().to_string()))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("device".to_string(), "ada0".to_string()),
                ("type".to_string(), "write".to_string())
            ]
        );
    }

    #[test]
    fn test_invalid_label_name_rejected() {
        let result = TypedDesc::new(
            NAMESPACE,
            "cpu",
            "seconds_total",
            "help",
            &["bad-label"],
            ValueKind::Counter,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_mpsc_sink() {
        let (mut tx, rx) = mpsc::channel();
        tx.emit(transfers().sample(1.0, &["ada0", "other"]));
        drop(tx);
        let received: Vec<Sample> = rx.iter().collect();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].label("type"), Some("other"));
    }
}
