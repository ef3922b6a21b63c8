//! Collectors command implementation.
//!
//! Lists the available collectors and the metrics each of them exports.

use herakles_freebsd_exporter::collectors::{self, CollectorOptions};
use herakles_freebsd_exporter::kernel;

/// Lists available collectors.
pub fn command_collectors(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("📋 Available Collectors");
    println!("=======================\n");

    let names: Vec<String> = collectors::AVAILABLE.iter().map(|s| s.to_string()).collect();
    for collector in collectors::build(&names, kernel::native(), &CollectorOptions::default())? {
        println!("{}", collector.name());
        for desc in collector.descs() {
            let labels = &desc.desc().variable_labels;
            if verbose {
                println!("   ├─ {} [{:?}]", desc.fq_name(), desc.kind());
                println!("   │  ├─ labels: {}", labels.join(", "));
                println!("   │  └─ {}", desc.desc().help);
            } else {
                println!("   ├─ {}{{{}}}", desc.fq_name(), labels.join(","));
            }
        }
        println!();
    }

    Ok(())
}
