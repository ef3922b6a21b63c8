//! Integration tests for the CPU time collector.
//!
//! These tests drive `CpuCollector` against an in-memory kernel and verify
//! tick conversion, per-CPU grouping and failure behavior.

mod common;

use std::sync::Arc;

use common::FakeKernel;
use herakles_freebsd_exporter::collectors::CpuCollector;
use herakles_freebsd_exporter::{CollectError, Collector, KernelError, LayoutError, Sample};

fn collect(kernel: FakeKernel) -> (Result<(), CollectError>, Vec<Sample>) {
    let collector = CpuCollector::new(Arc::new(kernel)).unwrap();
    let mut samples = Vec::new();
    let result = collector.update(&mut samples);
    (result, samples)
}

#[test]
fn test_two_cpus_emit_ten_samples_in_state_order() {
    let kernel = FakeKernel::new()
        .with_clock(1000, 128)
        .with_cp_times(&[128, 256, 384, 512, 1280, 0, 0, 64, 32, 12800]);

    let (result, samples) = collect(kernel);
    result.unwrap();

    assert_eq!(samples.len(), 10);
    assert!(samples
        .iter()
        .all(|s| s.fq_name() == "node_cpu_seconds_total"));

    let rows: Vec<(&str, &str, f64)> = samples
        .iter()
        .map(|s| (s.label("cpu").unwrap(), s.label("mode").unwrap(), s.value()))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("0", "user", 1.0),
            ("0", "nice", 2.0),
            ("0", "system", 3.0),
            ("0", "interrupt", 4.0),
            ("0", "idle", 10.0),
            ("1", "user", 0.0),
            ("1", "nice", 0.0),
            ("1", "system", 0.5),
            ("1", "interrupt", 0.25),
            ("1", "idle", 100.0),
        ]
    );
}

#[test]
fn test_stathz_zero_falls_back_to_hz() {
    let kernel = FakeKernel::new()
        .with_clock(120, 0)
        .with_cp_times(&[120, 240, 360, 480, 600]);

    let (result, samples) = collect(kernel);
    result.unwrap();

    let values: Vec<f64> = samples.iter().map(|s| s.value()).collect();
    assert_eq!(values, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn test_conversion_is_single_division() {
    let ticks = [1, 7, 13, 1_000_003, i64::from(i32::MAX)];
    let kernel = FakeKernel::new().with_clock(1000, 133).with_cp_times(&ticks);

    let (result, samples) = collect(kernel);
    result.unwrap();

    for (sample, tick) in samples.iter().zip(ticks) {
        assert_eq!(sample.value(), tick as f64 / 133.0);
    }
}

#[test]
fn test_no_usable_frequency_is_fatal() {
    let kernel = FakeKernel::new()
        .with_clock(0, 0)
        .with_cp_times(&[1, 2, 3, 4, 5]);

    let (result, samples) = collect(kernel);

    assert!(matches!(
        result,
        Err(CollectError::Layout(LayoutError::NonPositiveFrequency { hz: 0, stathz: 0 }))
    ));
    assert!(samples.is_empty());
}

#[test]
fn test_misaligned_cp_times_is_rejected() {
    let mut kernel = FakeKernel::new().with_clock(100, 127);
    // Five longs plus a stray half entry.
    let mut raw = common::cp_times(&[1, 2, 3, 4, 5]);
    raw.extend_from_slice(&[0u8; 4]);
    kernel.sysctls.insert("kern.cp_times".to_string(), raw);

    let (result, samples) = collect(kernel);

    assert!(matches!(
        result,
        Err(CollectError::Layout(LayoutError::Misaligned { len: 44, stride: 40, .. }))
    ));
    assert!(samples.is_empty());
}

#[test]
fn test_missing_clockrate_is_query_error() {
    let kernel = FakeKernel::new().with_cp_times(&[1, 2, 3, 4, 5]);

    let (result, samples) = collect(kernel);

    match result {
        Err(CollectError::Query { what, source }) => {
            assert_eq!(what, "kern.clockrate");
            assert!(matches!(source, KernelError::Sysctl { .. }));
        }
        other => panic!("expected query error, got {:?}", other),
    }
    assert!(samples.is_empty());
}

#[test]
fn test_short_clockrate_is_query_error() {
    let mut kernel = FakeKernel::new().with_cp_times(&[1, 2, 3, 4, 5]);
    kernel
        .sysctls
        .insert("kern.clockrate".to_string(), vec![0u8; 8]);

    let (result, _) = collect(kernel);

    match result {
        Err(CollectError::Query { what, source }) => {
            assert_eq!(what, "kern.clockrate");
            assert!(matches!(
                source,
                KernelError::Layout(LayoutError::Truncated { actual: 8, .. })
            ));
        }
        other => panic!("expected query error, got {:?}", other),
    }
}

#[test]
fn test_missing_cp_times_is_query_error() {
    let kernel = FakeKernel::new().with_clock(100, 127);

    let (result, samples) = collect(kernel);

    assert!(matches!(
        result,
        Err(CollectError::Query { ref what, .. }) if what == "kern.cp_times"
    ));
    assert!(samples.is_empty());
}

#[test]
fn test_collection_is_idempotent() {
    let kernel = Arc::new(
        FakeKernel::new()
            .with_clock(1000, 127)
            .with_cp_times(&[5, 6, 7, 8, 9, 10, 11, 12, 13, 14]),
    );
    let collector = CpuCollector::new(kernel.clone()).unwrap();

    let mut first = Vec::new();
    collector.update(&mut first).unwrap();
    let mut second = Vec::new();
    collector.update(&mut second).unwrap();

    assert_eq!(first, second);
    // Clock and tick table are queried fresh on every cycle.
    assert_eq!(kernel.raw_queries.load(std::sync::atomic::Ordering::SeqCst), 4);
}

#[test]
fn test_descriptor_available_before_collection() {
    let collector = CpuCollector::new(Arc::new(FakeKernel::new())).unwrap();
    let descs = collector.descs();
    assert_eq!(descs.len(), 1);
    assert_eq!(descs[0].fq_name(), "node_cpu_seconds_total");
    assert_eq!(collector.name(), "cpu");
}
