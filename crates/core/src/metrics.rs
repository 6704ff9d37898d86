//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission control (active permits, wait time)
//! - Stage execution (staging, processing, finishing)
//! - The finish protocol (outcomes, bytes uploaded, deletions)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Admission Metrics
// =============================================================================

/// Admission permits currently held.
pub static ADMISSION_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "spindle_admission_active_permits",
        "Number of admission permits currently held",
    )
    .unwrap()
});

/// Time spent waiting for an admission permit.
pub static ADMISSION_WAIT: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "spindle_admission_wait_seconds",
            "Time spent waiting for an admission permit",
        )
        .buckets(vec![0.001, 0.01, 0.1, 1.0, 10.0, 60.0, 300.0, 1800.0, 7200.0]),
        &["pool"],
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage duration in seconds.
pub static STAGE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("spindle_stage_duration_seconds", "Duration of pipeline stages")
            .buckets(vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0, 43200.0]),
        &["stage", "result"], // stage: "staging", "processing", "finish"
    )
    .unwrap()
});

/// Files staged locally.
pub static FILES_STAGED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("spindle_files_staged_total", "Total raw-data files staged").unwrap()
});

/// Items reaching a terminal status.
pub static ITEMS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("spindle_items_completed_total", "Work items by terminal status"),
        &["status"],
    )
    .unwrap()
});

// =============================================================================
// Finish Protocol Metrics
// =============================================================================

/// Finish protocol outcomes.
pub static FINISH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("spindle_finish_outcomes_total", "Finish protocol outcomes"),
        &["outcome"],
    )
    .unwrap()
});

/// Bytes uploaded as derived artifacts.
pub static BYTES_UPLOADED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("spindle_bytes_uploaded_total", "Total artifact bytes uploaded").unwrap()
});

/// Source sub-location deletions by result.
pub static DELETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("spindle_source_deletions_total", "Source sub-location deletions"),
        &["result"], // "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Admission
        Box::new(ADMISSION_ACTIVE.clone()),
        Box::new(ADMISSION_WAIT.clone()),
        // Stages
        Box::new(STAGE_DURATION.clone()),
        Box::new(FILES_STAGED.clone()),
        Box::new(ITEMS_COMPLETED.clone()),
        // Finish
        Box::new(FINISH_OUTCOMES.clone()),
        Box::new(BYTES_UPLOADED.clone()),
        Box::new(DELETIONS.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        FINISH_OUTCOMES.with_label_values(&["success"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "spindle_finish_outcomes_total"));
    }
}
