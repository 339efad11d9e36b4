use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, error, info};

use crate::model::TransferResult;

/// Outcome counts of one phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PhaseSummary {
    pub phase: String,
    pub targets: usize,
    pub succeeded: usize,
    /// Includes panicked workflows
    pub failed: usize,
    pub panicked: usize,
    pub records: usize,
    pub elapsed_ms: u64,
}

impl PhaseSummary {
    fn new(phase: &str) -> Self {
        Self {
            phase: phase.to_string(),
            ..Default::default()
        }
    }

    fn record(&mut self, result: &TransferResult) {
        match result {
            TransferResult::Success { record_count, .. } => {
                self.succeeded += 1;
                self.records += record_count;
            }
            TransferResult::Failure { .. } => self.failed += 1,
        }
    }
}

/// Runs workflows with at most `concurrency` in flight
pub struct Scheduler {
    concurrency: usize,
}

impl Scheduler {
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run `workflow` once per target and wait for all of them. A permit is
    /// taken before a workflow is spawned and held until it finishes, so the
    /// pool never exceeds `concurrency` tasks. Panics are counted as failures.
    pub async fn run<T, F, Fut>(&self, phase: &str, targets: Vec<T>, workflow: F) -> PhaseSummary
    where
        T: Display + Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = TransferResult> + Send + 'static,
    {
        let started = Instant::now();
        let mut summary = PhaseSummary::new(phase);
        summary.targets = targets.len();
        info!(
            "Starting {} phase: {} targets, concurrency {}",
            phase, summary.targets, self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut labels: HashMap<Id, String> = HashMap::new();

        for target in targets {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("{} phase: scheduler semaphore closed", phase);
                    break;
                }
            };
            while let Some(joined) = tasks.try_join_next_with_id() {
                collect(&mut summary, &mut labels, joined);
            }

            let label = target.to_string();
            let future = workflow(target);
            let handle = tasks.spawn(async move {
                let _permit = permit;
                future.await
            });
            labels.insert(handle.id(), label);
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            collect(&mut summary, &mut labels, joined);
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Finished {} phase: {}/{} transferred, {} failed ({} panicked), {} records in {} ms",
            phase,
            summary.succeeded,
            summary.targets,
            summary.failed,
            summary.panicked,
            summary.records,
            summary.elapsed_ms
        );
        summary
    }
}

fn collect(
    summary: &mut PhaseSummary,
    labels: &mut HashMap<Id, String>,
    joined: Result<(Id, TransferResult), JoinError>,
) {
    match joined {
        Ok((id, result)) => {
            labels.remove(&id);
            summary.record(&result);
        }
        Err(e) => {
            let label = labels.remove(&e.id()).unwrap_or_default();
            summary.failed += 1;
            if e.is_panic() {
                summary.panicked += 1;
                error!("Workflow for {} panicked", label);
            } else {
                debug!("Workflow for {} was cancelled", label);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_counts_outcomes() {
        let scheduler = Scheduler::new(2);
        let summary = scheduler
            .run("test", vec![1u32, 2, 3, 4], |n| async move {
                if n % 2 == 0 {
                    TransferResult::Success {
                        record_count: n as usize,
                        path: PathBuf::from(format!("{}.txt", n)),
                    }
                } else {
                    TransferResult::failure("refused")
                }
            })
            .await;

        assert_eq!(summary.targets, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.records, 6);
        assert_eq!(summary.panicked, 0);
    }

    #[tokio::test]
    async fn test_never_exceeds_concurrency() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let scheduler = Scheduler::new(3);

        let summary = scheduler
            .run("bounded", (0..20u32).collect(), |_| {
                let active = active.clone();
                let peak = peak.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    TransferResult::failure("refused")
                }
            })
            .await;

        assert_eq!(summary.failed, 20);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_panicking_workflow_is_counted() {
        let scheduler = Scheduler::new(4);
        let summary = scheduler
            .run("panics", vec!["ok", "boom", "fine"], |name| async move {
                if name == "boom" {
                    panic!("workflow exploded");
                }
                TransferResult::Success {
                    record_count: 1,
                    path: PathBuf::from(name),
                }
            })
            .await;

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.panicked, 1);
    }

    #[tokio::test]
    async fn test_empty_phase() {
        let summary = Scheduler::new(1)
            .run("empty", Vec::<String>::new(), |_| async {
                TransferResult::failure("unreachable")
            })
            .await;
        assert_eq!(summary, PhaseSummary {
            phase: "empty".into(),
            elapsed_ms: summary.elapsed_ms,
            ..Default::default()
        });
    }
}
