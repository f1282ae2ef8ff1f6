//! Human-readable result listing

use crate::report::StoredResult;
use crate::store::group_results;
use passbench_core::Attribute;

/// Format results for terminal display, grouped by test group
pub fn generate_human_report(title: &str, results: &[StoredResult]) -> String {
    let mut output = String::new();

    output.push('\n');
    output.push_str(title);
    output.push('\n');
    output.push_str(&"=".repeat(60));
    output.push_str("\n\n");

    if results.is_empty() {
        output.push_str("  (no results)\n");
        return output;
    }

    for (group, tests) in group_results(results.iter().cloned()) {
        output.push_str(&format!("Group: {}\n", group));
        output.push_str(&"-".repeat(60));
        output.push('\n');

        for (test, runs) in tests {
            let Some(latest) = runs.last() else {
                continue;
            };
            let build = match latest.build.revision {
                Some(revision) => format!("build {}", revision),
                None => "local build".to_string(),
            };
            output.push_str(&format!("  {} ({})\n", test, build));
            for (attribute, value) in &latest.attributes {
                output.push_str(&format!(
                    "      {:<22} {}\n",
                    attribute.as_str(),
                    format_value(*attribute, *value)
                ));
            }
            output.push('\n');
        }
    }

    output
}

fn format_value(attribute: Attribute, value: f64) -> String {
    match attribute {
        Attribute::OpsPerSecond => format!("{:.2} ops/sec", value),
        Attribute::Operations => format!("{:.0}", value),
        Attribute::MemoryBytes => format!("{:.0} bytes", value),
        Attribute::DurationNanos
        | Attribute::LatencyNanos
        | Attribute::MinLatencyNanos
        | Attribute::MaxLatencyNanos
        | Attribute::StddevLatencyNanos => format!("{:.2} ns", value),
    }
}
