//! End-to-end runs against the filesystem object store.
//!
//! A temp directory stands in for the bucket. Runs use a real shell command
//! as the compute tool, so these tests are unix-only.

#![cfg(unix)]

use std::path::Path;

use tempfile::TempDir;

use spindle_core::{
    parse_descriptor, CommandProcessor, ComputeConfig, FinishOutcome, FsObjectStore,
    ItemStatus, PipelineConfig, PipelineOrchestrator, RunReport, StageExecutor,
};

fn write(root: &Path, rel: &str, bytes: usize) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, vec![7u8; bytes]).unwrap();
}

/// Concatenates the passing reads into `reads.bin` and records the parameter.
fn shell_tool() -> ComputeConfig {
    ComputeConfig::new("sh", ["reads.bin", "summary.txt"])
        .with_args([
            "-c",
            "cat {input}/pod5_pass/* > {output}/reads.bin && echo {parameter} > {output}/summary.txt",
        ])
        .with_timeout(30)
}

struct Bucket {
    remote: TempDir,
    staging: TempDir,
}

impl Bucket {
    fn new() -> Self {
        let bucket = Self {
            remote: TempDir::new().unwrap(),
            staging: TempDir::new().unwrap(),
        };
        for run in ["run1", "run2"] {
            write(bucket.remote.path(), &format!("bucket/{}/pod5_pass/a.pod5", run), 300);
            write(bucket.remote.path(), &format!("bucket/{}/pod5_pass/b.pod5", run), 200);
            write(bucket.remote.path(), &format!("bucket/{}/pod5_fail/c.pod5", run), 50);
        }
        bucket
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        self.remote.path().join(rel)
    }

    async fn run(&self, delete_enabled: bool) -> RunReport {
        let config = PipelineConfig::new("modelA", self.staging.path().to_path_buf())
            .with_delete_enabled(delete_enabled);
        let executor = StageExecutor::new(
            config,
            FsObjectStore::rooted_at(self.remote.path()),
            CommandProcessor::new(shell_tool()),
        );
        let orchestrator = PipelineOrchestrator::new(executor);

        let descriptor = "key,source_location,parameter\n\
                          run1,gs://bucket/run1,\n\
                          run2,gs://bucket/run2/,modelB\n";
        let items = parse_descriptor(descriptor, "modelA").unwrap();
        orchestrator.run(items).await.unwrap()
    }
}

#[tokio::test]
async fn test_artifacts_uploaded_next_to_source() {
    let bucket = Bucket::new();

    let report = bucket.run(false).await;

    assert!(report.is_success());
    for item in &report.items {
        assert_eq!(item.outcome(), Some(FinishOutcome::SkippedNoDelete));
    }
    assert_eq!(
        std::fs::metadata(bucket.path("bucket/run1/reads.bin"))
            .unwrap()
            .len(),
        500
    );
    let summary = std::fs::read_to_string(bucket.path("bucket/run2/summary.txt")).unwrap();
    assert_eq!(summary.trim(), "modelB");
    let summary = std::fs::read_to_string(bucket.path("bucket/run1/summary.txt")).unwrap();
    assert_eq!(summary.trim(), "modelA");

    // Raw data untouched without delete.
    assert!(bucket.path("bucket/run1/pod5_pass/a.pod5").exists());
    assert!(bucket.path("bucket/run1/pod5_fail/c.pod5").exists());
}

#[tokio::test]
async fn test_delete_enabled_retires_raw_data() {
    let bucket = Bucket::new();

    let report = bucket.run(true).await;

    assert!(report.is_success());
    for key in ["run1", "run2"] {
        let item = report.get(key).unwrap();
        assert_eq!(item.status, ItemStatus::Done);
        assert_eq!(item.outcome(), Some(FinishOutcome::Success));
        let record = item.finish.as_ref().unwrap();
        assert!(record.deleted);
        assert_eq!(record.deleted_locations.len(), 2);

        assert!(!bucket.path(&format!("bucket/{}/pod5_pass", key)).exists());
        assert!(!bucket.path(&format!("bucket/{}/pod5_fail", key)).exists());
        assert!(bucket.path(&format!("bucket/{}/reads.bin", key)).exists());
    }
}

#[tokio::test]
async fn test_missing_raw_data_fails_only_that_item() {
    let bucket = Bucket::new();
    std::fs::remove_dir_all(bucket.path("bucket/run2")).unwrap();

    let report = bucket.run(true).await;

    assert!(report.get("run1").unwrap().is_success());
    let missing = report.get("run2").unwrap();
    assert_eq!(missing.status, ItemStatus::Failed);
    assert_eq!(missing.failed_stage.as_deref(), Some("staging"));
    assert!(report.is_degraded());
}

#[tokio::test]
async fn test_rerun_ignores_leftovers_of_killed_attempt() {
    let bucket = Bucket::new();
    // A killed attempt left an extra raw file and a partial artifact behind.
    write(bucket.staging.path(), "run1/pod5_pass/stale.pod5", 9999);
    write(bucket.staging.path(), "run1/output/summary.txt", 3);

    let report = bucket.run(true).await;

    assert!(report.is_success());
    assert_eq!(
        std::fs::metadata(bucket.path("bucket/run1/reads.bin"))
            .unwrap()
            .len(),
        500
    );
    let summary = std::fs::read_to_string(bucket.path("bucket/run1/summary.txt")).unwrap();
    assert_eq!(summary.trim(), "modelA");
    assert!(!bucket.staging.path().join("run1/pod5_pass/stale.pod5").exists());
}

#[tokio::test]
async fn test_staged_copy_matches_source_layout() {
    let bucket = Bucket::new();

    bucket.run(false).await;

    let staged = bucket.staging.path().join("run1");
    assert_eq!(
        std::fs::metadata(staged.join("pod5_pass/a.pod5"))
            .unwrap()
            .len(),
        300
    );
    assert!(staged.join("pod5_fail/c.pod5").exists());
    assert!(staged.join("output/reads.bin").exists());
}
