//! Prometheus metrics export for a pipeline run.
//!
//! The core crate's collectors are registered alongside run-level gauges
//! filled in from the final `RunReport`. The text exposition is written to a
//! file at the end of the run (for node-exporter textfile collection).

use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};

use spindle_core::RunReport;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Items in the last run by terminal status.
pub static RUN_ITEMS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("spindle_run_items", "Items in the last run by status"),
        &["status"],
    )
    .unwrap()
});

/// 1 if the last run was degraded.
pub static RUN_DEGRADED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("spindle_run_degraded", "Whether the last run was degraded").unwrap()
});

/// Wall-clock duration of the last run.
pub static RUN_DURATION_SECONDS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "spindle_run_duration_seconds",
        "Duration of the last run in seconds",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    for collector in spindle_core::metrics::all_metrics() {
        registry.register(collector).unwrap();
    }
    registry.register(Box::new(RUN_ITEMS.clone())).unwrap();
    registry.register(Box::new(RUN_DEGRADED.clone())).unwrap();
    registry
        .register(Box::new(RUN_DURATION_SECONDS.clone()))
        .unwrap();
}

/// Update run-level gauges from the final report.
pub fn collect_run_metrics(report: &RunReport) {
    RUN_ITEMS
        .with_label_values(&["succeeded"])
        .set(report.succeeded() as i64);
    RUN_ITEMS
        .with_label_values(&["failed"])
        .set(report.failed() as i64);
    RUN_ITEMS
        .with_label_values(&["cancelled"])
        .set(report.cancelled() as i64);
    RUN_DEGRADED.set(i64::from(report.is_degraded()));
    RUN_DURATION_SECONDS.set((report.finished_at - report.started_at).num_seconds());
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output was not UTF-8")
}

/// Write the text exposition to `path`.
pub fn write_metrics(path: &Path) -> Result<()> {
    let text = encode_metrics()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use spindle_core::ItemReport;
    use tempfile::TempDir;

    #[test]
    fn test_run_metrics_written() {
        let report = RunReport {
            run_id: "r".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            items: vec![
                ItemReport::failed("a", "staging", "boom"),
                ItemReport::cancelled("b"),
            ],
        };
        collect_run_metrics(&report);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("spindle.prom");
        write_metrics(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("spindle_run_degraded 1"));
        assert!(text.contains("spindle_run_items{status=\"cancelled\"} 1"));
    }
}
