// src/core/orchestrator.rs

//! Bounded fan-out of resource scanners over one resource group.
//!
//! A [`ScanRun`] starts one task per scanner, never more than `concurrency` at a time, and
//! collects their results. The first failure cancels the run: no further scanner starts, the
//! error is returned and whatever the in-flight tasks produce afterwards is dropped.

use crate::core::context::ScanContext;
use crate::core::error::{Result, ScanError};
use crate::core::models::ServiceResult;
use crate::core::scanner::ResourceScanner;
use std::any::Any;
use std::sync::Arc;
use strum::Display;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What one scanner task hands back to the collector.
type TaskReport = Result<Vec<ServiceResult>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Aborted,
}

/// The transient state of one resource-group scan.
pub struct ScanRun {
    resource_group: String,
    scanners: Vec<Arc<dyn ResourceScanner>>,
    capacity: usize,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    state: RunState,
    results: Vec<ServiceResult>,
}

impl ScanRun {
    /// Prepares a run. `concurrency <= 0` lets every scanner run at once.
    ///
    /// The run's cancellation token is a child of `parent`, so cancelling the parent stops
    /// the run while a failure inside the run never leaks out to sibling runs.
    pub fn new(
        scanners: &[Arc<dyn ResourceScanner>],
        resource_group: &str,
        concurrency: i64,
        parent: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Self {
        let capacity = match usize::try_from(concurrency) {
            Ok(c) if c > 0 => c.min(scanners.len()),
            _ => scanners.len(),
        };
        Self {
            resource_group: resource_group.to_string(),
            scanners: scanners.to_vec(),
            capacity,
            cancel: parent.child_token(),
            deadline,
            state: RunState::Idle,
            results: Vec::new(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs every scanner and returns the aggregate, or the first error encountered.
    ///
    /// # Arguments
    /// * `ctx` - The subscription's scan context, shared read-only with every task.
    ///
    /// # Returns
    /// All [`ServiceResult`]s in arrival order on success. On failure nothing partial is
    /// returned.
    pub async fn run(&mut self, ctx: Arc<ScanContext>) -> Result<Vec<ServiceResult>> {
        if self.state != RunState::Idle {
            return Err(ScanError::Other(format!("scan run for {} already used", self.resource_group)));
        }
        self.state = RunState::Running;

        let expected = self.scanners.len();
        info!(
            resource_group = %self.resource_group,
            scanners = expected,
            concurrency = self.capacity,
            "Scan run started."
        );
        if expected == 0 {
            self.state = RunState::Completed;
            return Ok(Vec::new());
        }

        // One slot per scanner: a task's single send can never wait on a reader.
        let (tx, mut rx) = mpsc::channel::<TaskReport>(expected);
        let permits = Arc::new(Semaphore::new(self.capacity.max(1)));
        tokio::spawn(dispatch(
            self.scanners.clone(),
            self.resource_group.clone(),
            ctx,
            permits,
            self.cancel.clone(),
            tx,
        ));

        let cancel = self.cancel.clone();
        let deadline = self.deadline;
        let mut succeeded = 0;
        while succeeded < expected {
            let expired = async {
                match deadline {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                report = rx.recv() => match report {
                    Some(Ok(mut results)) => {
                        succeeded += 1;
                        self.results.append(&mut results);
                    }
                    Some(Err(e)) => return Err(self.abort(e)),
                    // Every sender is gone without a full set of successes: the run was cancelled.
                    None => return Err(self.abort(ScanError::Cancelled)),
                },
                _ = cancel.cancelled() => return Err(self.abort(ScanError::Cancelled)),
                _ = expired => return Err(self.abort(ScanError::DeadlineExceeded)),
            }
        }

        self.state = RunState::Completed;
        info!(
            resource_group = %self.resource_group,
            results = self.results.len(),
            "Scan run completed."
        );
        Ok(std::mem::take(&mut self.results))
    }

    fn abort(&mut self, error: ScanError) -> ScanError {
        self.cancel.cancel();
        self.results.clear();
        self.state = RunState::Aborted;
        warn!(resource_group = %self.resource_group, error = %error, "Scan run aborted.");
        error
    }
}

/// Scans one resource group with the given scanners.
///
/// # Arguments
/// * `scanners` - Initialised scanners, each owning distinct resource types.
/// * `resource_group` - The group to scan.
/// * `ctx` - The subscription's scan context.
/// * `concurrency` - Maximum scanners running at once; `<= 0` means all of them.
/// * `parent` - Cancelling this token aborts the run with [`ScanError::Cancelled`].
/// * `deadline` - Optional instant after which the run aborts with [`ScanError::DeadlineExceeded`].
pub async fn run_resource_group_scan(
    scanners: &[Arc<dyn ResourceScanner>],
    resource_group: &str,
    ctx: Arc<ScanContext>,
    concurrency: i64,
    parent: &CancellationToken,
    deadline: Option<Instant>,
) -> Result<Vec<ServiceResult>> {
    ScanRun::new(scanners, resource_group, concurrency, parent, deadline)
        .run(ctx)
        .await
}

// --- Task side ---

async fn dispatch(
    scanners: Vec<Arc<dyn ResourceScanner>>,
    resource_group: String,
    ctx: Arc<ScanContext>,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
    tx: mpsc::Sender<TaskReport>,
) {
    for scanner in scanners {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        // A failing task cancels before giving its permit back.
        if cancel.is_cancelled() {
            break;
        }

        tokio::spawn(scan_task(
            scanner,
            resource_group.clone(),
            ctx.clone(),
            permit,
            cancel.clone(),
            tx.clone(),
        ));
    }
}

async fn scan_task(
    scanner: Arc<dyn ResourceScanner>,
    resource_group: String,
    ctx: Arc<ScanContext>,
    permit: OwnedSemaphorePermit,
    cancel: CancellationToken,
    tx: mpsc::Sender<TaskReport>,
) {
    if cancel.is_cancelled() {
        drop(permit);
        return;
    }

    let name = scanner.name();
    debug!(scanner = name, resource_group = %resource_group, "Scanner task started.");

    // Nested so a panicking scanner surfaces as a JoinError instead of a silent hang.
    let handle = tokio::spawn(async move { scanner.scan(&resource_group, &ctx).await });
    let report = match handle.await {
        Ok(Ok(results)) => Ok(results),
        Ok(Err(e)) => Err(e.in_scanner(name)),
        Err(join) => Err(ScanError::TaskPanicked {
            scanner: name.to_string(),
            message: if join.is_panic() { panic_message(join.into_panic()) } else { join.to_string() },
        }),
    };

    let failed = report.is_err();
    // The collector may already be gone; the result is dropped with it.
    if tx.try_send(report).is_err() {
        debug!(scanner = name, "Result discarded, run already finished.");
    }
    if failed {
        cancel.cancel();
    }
    drop(permit);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::scanner::ScannerConfig;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Fake {
        name: &'static str,
        resources: usize,
        delay: Duration,
        fail: Option<&'static str>,
        started: Arc<AtomicUsize>,
    }

    impl Fake {
        fn new(name: &'static str, resources: usize) -> Self {
            Self { name, resources, delay: Duration::ZERO, fail: None, started: Arc::new(AtomicUsize::new(0)) }
        }
    }

    #[async_trait]
    impl ResourceScanner for Fake {
        fn name(&self) -> &'static str {
            self.name
        }

        fn init(&mut self, _config: &ScannerConfig) -> Result<()> {
            Ok(())
        }

        fn resource_types(&self) -> Vec<&'static str> {
            vec![self.name]
        }

        async fn scan(&self, resource_group: &str, _ctx: &ScanContext) -> Result<Vec<ServiceResult>> {
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if let Some(msg) = self.fail {
                return Err(ScanError::Other(msg.to_string()));
            }
            Ok((0..self.resources)
                .map(|i| ServiceResult {
                    subscription_id: "s1".into(),
                    subscription_name: "sub".into(),
                    resource_group: resource_group.to_string(),
                    service_name: format!("{}-{i}", self.name),
                    resource_type: self.name.to_string(),
                    location: "westeurope".into(),
                    recommendations: Vec::new(),
                })
                .collect())
        }
    }

    fn arcs(fakes: Vec<Fake>) -> Vec<Arc<dyn ResourceScanner>> {
        fakes.into_iter().map(|f| Arc::new(f) as Arc<dyn ResourceScanner>).collect()
    }

    #[test]
    fn non_positive_concurrency_means_all_scanners() {
        let scanners = arcs(vec![Fake::new("a", 0), Fake::new("b", 0), Fake::new("c", 0)]);
        let token = CancellationToken::new();
        assert_eq!(ScanRun::new(&scanners, "rg", 0, &token, None).capacity(), 3);
        assert_eq!(ScanRun::new(&scanners, "rg", -5, &token, None).capacity(), 3);
        assert_eq!(ScanRun::new(&scanners, "rg", 2, &token, None).capacity(), 2);
    }

    #[tokio::test]
    async fn oversized_concurrency_is_clamped_to_scanner_count() {
        let scanners = arcs(vec![Fake::new("a", 1), Fake::new("b", 0), Fake::new("c", 1)]);
        let token = CancellationToken::new();
        assert_eq!(ScanRun::new(&scanners, "rg", i64::MAX, &token, None).capacity(), 3);
        assert_eq!(ScanRun::new(&scanners, "rg", 7, &token, None).capacity(), 3);

        let results = run_resource_group_scan(&scanners, "rg", Arc::new(ScanContext::default()), i64::MAX, &token, None)
            .await
            .expect("all succeed");
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn aggregates_every_scanner() {
        let scanners = arcs(vec![Fake::new("a", 2), Fake::new("b", 0), Fake::new("c", 3)]);
        let token = CancellationToken::new();
        let mut run = ScanRun::new(&scanners, "rg", 2, &token, None);
        assert_eq!(run.state(), RunState::Idle);

        let results = run.run(Arc::new(ScanContext::default())).await.expect("all succeed");
        assert_eq!(results.len(), 5);
        assert_eq!(run.state(), RunState::Completed);
        assert!(run.run(Arc::new(ScanContext::default())).await.is_err());
    }

    #[tokio::test]
    async fn empty_scanner_set_completes() {
        let token = CancellationToken::new();
        let results = run_resource_group_scan(&[], "rg", Arc::new(ScanContext::default()), 4, &token, None).await.expect("nothing to do");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn failure_cancels_run_and_parent_survives() {
        let mut failing = Fake::new("c", 0);
        failing.fail = Some("throttled");
        let scanners = arcs(vec![Fake::new("a", 1), failing]);
        let parent = CancellationToken::new();
        let mut run = ScanRun::new(&scanners, "rg", 1, &parent, None);

        let err = run.run(Arc::new(ScanContext::default())).await.expect_err("c fails");
        assert_eq!(err.root().to_string(), "throttled");
        assert_eq!(run.state(), RunState::Aborted);
        assert!(!parent.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancellation_aborts() {
        let mut slow = Fake::new("a", 1);
        slow.delay = Duration::from_secs(30);
        let scanners = arcs(vec![slow]);
        let parent = CancellationToken::new();
        parent.cancel();

        let err = run_resource_group_scan(&scanners, "rg", Arc::new(ScanContext::default()), 1, &parent, None).await.expect_err("cancelled");
        assert!(matches!(err, ScanError::Cancelled));
    }

    #[tokio::test]
    async fn deadline_aborts() {
        let mut slow = Fake::new("a", 1);
        slow.delay = Duration::from_secs(30);
        let started = slow.started.clone();
        let scanners = arcs(vec![slow]);
        let token = CancellationToken::new();
        let deadline = Instant::now() + Duration::from_millis(50);

        let err = run_resource_group_scan(&scanners, "rg", Arc::new(ScanContext::default()), 1, &token, Some(deadline))
            .await
            .expect_err("deadline");
        assert!(matches!(err, ScanError::DeadlineExceeded));
        assert_eq!(started.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panic_payloads_are_readable() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic payload");
    }
}
