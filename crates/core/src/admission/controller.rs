//! Counting-semaphore admission controller.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::metrics;

/// Error type for admission operations.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The controller was closed while waiting.
    #[error("Admission controller is closed")]
    Closed,
}

/// Status of the admission pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStatus {
    /// Pool name.
    pub name: String,
    /// Permits currently held.
    pub active: usize,
    /// Maximum concurrent permits.
    pub max_concurrent: usize,
    /// Tasks waiting for a permit.
    pub queued: usize,
    /// Permits granted since creation.
    pub total_granted: u64,
}

#[derive(Default)]
struct AdmissionStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_granted: AtomicU64,
}

/// Bounds concurrent staging executions to a fixed number of permits.
#[derive(Clone)]
pub struct AdmissionController {
    name: String,
    limit: usize,
    semaphore: Arc<Semaphore>,
    stats: Arc<AdmissionStats>,
}

/// A held admission slot. Dropping it releases the slot.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
    stats: Arc<AdmissionStats>,
    acquired_at: Instant,
}

/// Keeps the queued counter honest when an `acquire` future is dropped mid-wait.
struct QueuedGuard(Arc<AdmissionStats>);

impl QueuedGuard {
    fn new(stats: &Arc<AdmissionStats>) -> Self {
        stats.queued.fetch_add(1, Ordering::Relaxed);
        Self(Arc::clone(stats))
    }
}

impl Drop for QueuedGuard {
    fn drop(&mut self) {
        self.0.queued.fetch_sub(1, Ordering::Relaxed);
    }
}

impl AdmissionController {
    /// Creates a controller granting at most `limit` permits (a limit of 0 is raised to 1).
    pub fn new(limit: usize) -> Self {
        Self::named("staging", limit)
    }

    /// Creates a named controller, the name shows up in status reports.
    pub fn named(name: impl Into<String>, limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            name: name.into(),
            limit,
            semaphore: Arc::new(Semaphore::new(limit)),
            stats: Arc::new(AdmissionStats::default()),
        }
    }

    /// Maximum concurrent permits.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Result<AdmissionPermit, AdmissionError> {
        let wait_start = Instant::now();
        let queued = QueuedGuard::new(&self.stats);

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AdmissionError::Closed)?;
        drop(queued);

        metrics::ADMISSION_WAIT
            .with_label_values(&[&self.name])
            .observe(wait_start.elapsed().as_secs_f64());

        Ok(self.grant(permit))
    }

    /// Takes a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<AdmissionPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        Some(self.grant(permit))
    }

    /// Closes the pool; pending and future `acquire` calls fail with [`AdmissionError::Closed`].
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Returns the current pool status.
    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            name: self.name.clone(),
            active: self.stats.active.load(Ordering::Relaxed) as usize,
            max_concurrent: self.limit,
            queued: self.stats.queued.load(Ordering::Relaxed) as usize,
            total_granted: self.stats.total_granted.load(Ordering::Relaxed),
        }
    }

    fn grant(&self, permit: OwnedSemaphorePermit) -> AdmissionPermit {
        self.stats.active.fetch_add(1, Ordering::Relaxed);
        self.stats.total_granted.fetch_add(1, Ordering::Relaxed);
        metrics::ADMISSION_ACTIVE.inc();

        AdmissionPermit {
            _permit: permit,
            stats: Arc::clone(&self.stats),
            acquired_at: Instant::now(),
        }
    }
}

impl AdmissionPermit {
    /// How long this permit has been held.
    pub fn held_for(&self) -> std::time::Duration {
        self.acquired_at.elapsed()
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
        metrics::ADMISSION_ACTIVE.dec();
    }
}

impl std::fmt::Debug for AdmissionPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPermit")
            .field("held_for", &self.held_for())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Runs `tasks` concurrent holders and returns the observed peak concurrency
    /// plus each holder's (start, end) window.
    async fn run_holders(
        controller: AdmissionController,
        tasks: usize,
    ) -> (usize, Vec<(Instant, Instant)>) {
        let current = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));
        let spans = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let controller = controller.clone();
                let current = Arc::clone(&current);
                let peak = Arc::clone(&peak);
                let spans = Arc::clone(&spans);
                tokio::spawn(async move {
                    let _permit = controller.acquire().await.unwrap();
                    let start = Instant::now();
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    spans.lock().unwrap().push((start, Instant::now()));
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            result.unwrap();
        }

        let spans = spans.lock().unwrap().clone();
        (peak.load(Ordering::SeqCst) as usize, spans)
    }

    #[tokio::test]
    async fn test_bound_never_exceeded() {
        for limit in [1, 2, 3] {
            let controller = AdmissionController::new(limit);
            let (peak, spans) = run_holders(controller.clone(), 12).await;
            assert!(peak <= limit, "peak {} exceeded limit {}", peak, limit);
            assert_eq!(spans.len(), 12);
            assert_eq!(controller.status().total_granted, 12);
            assert_eq!(controller.status().active, 0);
        }
    }

    #[tokio::test]
    async fn test_limit_one_is_strictly_serial() {
        let (peak, mut spans) = run_holders(AdmissionController::new(1), 6).await;
        assert_eq!(peak, 1);

        spans.sort_by_key(|(start, _)| *start);
        for pair in spans.windows(2) {
            assert!(pair[0].1 <= pair[1].0, "staging windows overlap");
        }
    }

    #[tokio::test]
    async fn test_zero_limit_raised_to_one() {
        let controller = AdmissionController::new(0);
        assert_eq!(controller.limit(), 1);
        let _held = controller.acquire().await.unwrap();
        assert!(controller.try_acquire().is_none());
    }

    #[tokio::test]
    async fn test_permit_released_on_error_path() {
        let controller = AdmissionController::new(1);

        async fn failing_stage(controller: &AdmissionController) -> Result<(), String> {
            let _permit = controller.acquire().await.map_err(|e| e.to_string())?;
            Err("transfer failed".to_string())
        }

        assert!(failing_stage(&controller).await.is_err());
        assert_eq!(controller.available(), 1);
        assert_eq!(controller.status().active, 0);
    }

    #[tokio::test]
    async fn test_permit_released_when_task_aborted() {
        let controller = AdmissionController::new(1);
        let holder = {
            let controller = controller.clone();
            tokio::spawn(async move {
                let _permit = controller.acquire().await.unwrap();
                tokio::time::sleep(Duration::from_secs(3600)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.available(), 0);

        holder.abort();
        let _ = holder.await;

        let permit = tokio::time::timeout(Duration::from_secs(1), controller.acquire())
            .await
            .expect("permit should be released after abort")
            .unwrap();
        drop(permit);
    }

    #[tokio::test]
    async fn test_queued_count_tracks_waiters() {
        let controller = AdmissionController::new(1);
        let held = controller.acquire().await.unwrap();

        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.acquire().await.map(drop) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(controller.status().queued, 1);

        drop(held);
        waiter.await.unwrap().unwrap();
        assert_eq!(controller.status().queued, 0);
    }

    #[tokio::test]
    async fn test_closed_controller_rejects_waiters() {
        let controller = AdmissionController::new(1);
        controller.close();
        assert!(matches!(
            controller.acquire().await,
            Err(AdmissionError::Closed)
        ));
    }
}
