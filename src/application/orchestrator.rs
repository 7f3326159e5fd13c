//! 수집 오케스트레이터
//!
//! Computes the pending task set (task source minus completion ledger) and
//! runs it on a small pool of workers pulling from one shared queue. Results
//! are drained by a single consumer in completion order.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use super::worker::{run_task, TaskOutcome, WorkerContext};
use crate::domain::record::HarvestStatus;
use crate::domain::repositories::TaskSource;
use crate::domain::task::Task;

/// Summary of one harvest run
#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    /// Tasks returned by the task source
    pub total_tasks: usize,

    /// Tasks skipped because a record already exists
    pub skipped: usize,

    /// One outcome per dispatched task, in completion order
    pub outcomes: Vec<TaskOutcome>,
}

impl HarvestReport {
    pub fn count(&self, status: HarvestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status() == status).count()
    }

    pub fn succeeded(&self) -> usize {
        self.count(HarvestStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(HarvestStatus::Fail)
    }

    pub fn errored(&self) -> usize {
        self.count(HarvestStatus::Error)
    }
}

/// `tasks − known`, keyed on `original_name`; duplicates keep their first occurrence
pub fn compute_pending(tasks: Vec<Task>, known: &HashSet<String>) -> Vec<Task> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| !known.contains(&task.original_name))
        .filter(|task| seen.insert(task.original_name.clone()))
        .collect()
}

pub struct Orchestrator {
    tasks: Arc<dyn TaskSource>,
    context: WorkerContext,
    workers: usize,
}

impl Orchestrator {
    pub fn new(tasks: Arc<dyn TaskSource>, context: WorkerContext) -> Self {
        let workers = context.settings.harvest.workers.max(1);
        Self { tasks, context, workers }
    }

    /// One pass: list tasks, skip completed ones, harvest the rest
    ///
    /// Only an unavailable task list is an error; every task failure ends up
    /// in the report instead.
    pub async fn run(&self) -> Result<HarvestReport> {
        let started = Instant::now();

        let tasks = self
            .tasks
            .list_open_tasks()
            .await
            .context("Task list unavailable, nothing dispatched")?;
        let total_tasks = tasks.len();

        let known = self.load_ledger().await;
        let pending = compute_pending(tasks, &known);
        let skipped = total_tasks - pending.len();

        info!(
            "🚀 {} tasks, {} already harvested, {} pending ({} workers)",
            total_tasks,
            skipped,
            pending.len(),
            self.workers
        );

        let outcomes = self.dispatch(pending).await;
        let report = HarvestReport {
            total_tasks,
            skipped,
            outcomes,
        };

        info!(
            "🏁 Harvest finished in {:.1}s: {} success, {} fail, {} error, {} skipped",
            started.elapsed().as_secs_f64(),
            report.succeeded(),
            report.failed(),
            report.errored(),
            report.skipped
        );
        Ok(report)
    }

    /// Identifiers already persisted; an unreadable ledger counts as empty
    async fn load_ledger(&self) -> HashSet<String> {
        let mut store = match self.context.stores.connect().await {
            Ok(store) => store,
            Err(e) => {
                warn!("⚠️ Completion ledger unavailable, treating every task as pending: {:#}", e);
                return HashSet::new();
            }
        };

        let known = store.known_identifiers().await.unwrap_or_else(|e| {
            warn!("⚠️ Completion ledger unreadable, treating every task as pending: {:#}", e);
            HashSet::new()
        });

        if let Err(e) = store.close().await {
            warn!("Ledger connection did not close cleanly: {:#}", e);
        }
        known
    }

    /// Run `pending` on the worker pool and collect one outcome per task
    pub async fn dispatch(&self, pending: Vec<Task>) -> Vec<TaskOutcome> {
        let total = pending.len();
        if total == 0 {
            info!("Nothing to harvest");
            return Vec::new();
        }

        let queue = Arc::new(Mutex::new(VecDeque::from(pending)));
        let (tx, mut rx) = mpsc::channel::<TaskOutcome>(self.workers);

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers.min(total) {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let context = self.context.clone();

            handles.push(tokio::spawn(async move {
                debug!("👷 워커 {} 시작", worker_id);
                loop {
                    // 유휴 상태가 되면 다음 작업을 가져옴
                    let next = queue.lock().await.pop_front();
                    let Some(task) = next else { break };

                    let outcome = run_task(&context, task).await;
                    if tx.send(outcome).await.is_err() {
                        break;
                    }
                }
                debug!("👷 워커 {} 종료", worker_id);
            }));
        }
        drop(tx);

        let mut outcomes = Vec::with_capacity(total);
        while outcomes.len() < total {
            let Some(outcome) = rx.recv().await else { break };
            log_progress(outcomes.len() + 1, total, &outcome);
            outcomes.push(outcome);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!("Worker terminated abnormally: {}", e);
            }
        }

        if outcomes.len() < total {
            error!("{} tasks produced no outcome", total - outcomes.len());
        }
        outcomes
    }
}

fn log_progress(done: usize, total: usize, outcome: &TaskOutcome) {
    let secs = outcome.elapsed.as_secs_f64();
    match outcome.status() {
        HarvestStatus::Success => info!(
            "[{}/{}] ✅ {} → {} ({:.1}s)",
            done,
            total,
            outcome.identifier(),
            outcome.record.name,
            secs
        ),
        HarvestStatus::Fail => warn!(
            "[{}/{}] ⚠️ {} failed: {} ({:.1}s)",
            done,
            total,
            outcome.identifier(),
            outcome.reason().unwrap_or("unknown"),
            secs
        ),
        HarvestStatus::Error => error!(
            "[{}/{}] ❌ {} error: {} ({:.1}s)",
            done,
            total,
            outcome.identifier(),
            outcome.reason().unwrap_or("unknown"),
            secs
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::worker::WorkerSettings;
    use crate::infrastructure::config::AppConfig;
    use crate::test_utils::{sample_state, FakePage, FakeSessionFactory, InMemoryConnector, StaticTaskSource};

    fn task(name: &str) -> Task {
        Task::new(name, None)
    }

    fn orchestrator(tasks: StaticTaskSource, sessions: &FakeSessionFactory, stores: &InMemoryConnector) -> Orchestrator {
        let mut config = AppConfig::default();
        config.harvest.settle_delay_ms = 0;
        config.harvest.navigation_timeout_secs = 1;
        config.harvest.candidate_wait_secs = 1;
        config.harvest.frame_timeout_secs = 1;

        let context = WorkerContext::new(
            Arc::new(sessions.clone()),
            Arc::new(stores.clone()),
            WorkerSettings::from_config(&config),
        );
        Orchestrator::new(Arc::new(tasks), context)
    }

    #[test]
    fn test_compute_pending_is_set_difference() {
        let known = HashSet::from(["b".to_string()]);
        let pending = compute_pending(vec![task("a"), task("b"), task("c"), task("a")], &known);

        let names: Vec<&str> = pending.iter().map(|t| t.original_name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_compute_pending_empty_inputs() {
        assert!(compute_pending(Vec::new(), &HashSet::new()).is_empty());
        let known = HashSet::from(["a".to_string()]);
        assert!(compute_pending(vec![task("a")], &known).is_empty());
    }

    #[tokio::test]
    async fn test_every_task_yields_one_outcome() {
        let sessions = FakeSessionFactory::new()
            .with_page("a", FakePage::found(sample_state()))
            .with_page("b", FakePage::detail_never_attaches())
            .with_page("c", FakePage::found(sample_state()).panicking());
        let stores = InMemoryConnector::new();
        let tasks = StaticTaskSource::new(vec![task("a"), task("b"), task("c"), task("unknown")]);

        let report = orchestrator(tasks, &sessions, &stores).run().await.unwrap();

        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.errored(), 2);
        assert_eq!(stores.document_count(), 1);
    }

    #[tokio::test]
    async fn test_task_list_failure_is_fatal() {
        let sessions = FakeSessionFactory::new();
        let stores = InMemoryConnector::new();

        let result = orchestrator(StaticTaskSource::unreachable(), &sessions, &stores).run().await;

        assert!(result.is_err());
        assert_eq!(sessions.probe().opened(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_ledger_treats_all_as_pending() {
        let sessions = FakeSessionFactory::new().with_page("a", FakePage::found(sample_state()));
        let stores = InMemoryConnector::new().failing_ledger();
        let tasks = StaticTaskSource::new(vec![task("a")]);

        let report = orchestrator(tasks, &sessions, &stores).run().await.unwrap();

        assert_eq!(report.skipped, 0);
        assert_eq!(report.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_empty_task_list_is_valid() {
        let sessions = FakeSessionFactory::new();
        let stores = InMemoryConnector::new();

        let report = orchestrator(StaticTaskSource::new(Vec::new()), &sessions, &stores)
            .run()
            .await
            .unwrap();

        assert_eq!(report.total_tasks, 0);
        assert!(report.outcomes.is_empty());
        assert_eq!(sessions.probe().opened(), 0);
    }
}
