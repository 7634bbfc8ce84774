pub mod profile_extraction;
pub mod session_expiry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::assessment::AssessmentEngine;
use crate::config::WorkerConfig;

/// Timeout for individual worker invocations (5 minutes).
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);

/// Drain period before scheduler shutdown to let in-flight tasks complete.
#[cfg(test)]
const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    SessionExpiry,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionExpiry => "session_expiry",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

/// Cron-scheduled maintenance jobs. Only the leader instance registers any.
pub struct WorkerManager {
    engine: Arc<AssessmentEngine>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
}

impl WorkerManager {
    pub fn new(
        engine: Arc<AssessmentEngine>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            engine,
            shutdown_rx,
            config: config.clone(),
        }
    }

    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }

        vec![JobSpec {
            name: WorkerName::SessionExpiry,
            cron: "0 15 * * * *",
            enabled: self.config.enable_session_expiry,
        }]
    }

    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Worker leader disabled; skipping worker startup");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        self.register_jobs(&scheduler).await;
        scheduler.start().await?;

        tracing::info!("Worker manager started");
        let _ = self.shutdown_rx.recv().await;

        tracing::info!(
            "Worker manager shutting down, draining for {}s",
            DRAIN_TIMEOUT.as_secs()
        );
        tokio::time::sleep(DRAIN_TIMEOUT).await;
        let _ = scheduler.shutdown().await;
        Ok(())
    }

    async fn register_jobs(&self, scheduler: &JobScheduler) {
        for spec in self.planned_jobs() {
            if !spec.enabled {
                tracing::info!(name = spec.name.as_str(), "Skipping disabled worker");
                continue;
            }

            let name_str = spec.name.as_str();
            match spec.name {
                WorkerName::SessionExpiry => {
                    let engine = self.engine.clone();
                    let hours = self.config.session_expiry_hours;
                    add_job(scheduler, spec.cron, name_str, move || {
                        let engine = engine.clone();
                        async move {
                            session_expiry::run(&engine, hours).await;
                        }
                    })
                    .await;
                }
            }
            tracing::info!(name = name_str, cron = spec.cron, "Registered worker");
        }
    }
}

/// Add a job to the scheduler with an overlap guard and timeout wrapper.
async fn add_job<Fut, F>(scheduler: &JobScheduler, cron: &str, name: &'static str, mut run: F)
where
    F: FnMut() -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(false));

    let job = Job::new_async(cron, move |_uuid, _lock| {
        let guard = running.clone();

        if guard
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::warn!(
                worker = name,
                "Skipping worker invocation: previous run still in progress"
            );
            return Box::pin(async {});
        }

        let fut = run();
        Box::pin(async move {
            if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                tracing::error!(
                    worker = name,
                    timeout_secs = WORKER_TIMEOUT.as_secs(),
                    "Worker timed out"
                );
            }
            guard.store(false, Ordering::SeqCst);
        })
    });

    match job {
        Ok(job) => {
            if let Err(err) = scheduler.add(job).await {
                tracing::error!(error = %err, cron, worker = name, "Failed to add worker job");
            }
        }
        Err(err) => tracing::error!(error = %err, cron, worker = name, "Failed to create worker job"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration as ChronoDuration, Utc};
    use tokio::sync::broadcast;

    use crate::assessment::catalog::StepCatalog;
    use crate::assessment::config::EngineConfig;
    use crate::assessment::grader::StepGrader;
    use crate::assessment::repository::{AssessmentRepository, SessionStatus};
    use crate::store::Store;

    use super::*;

    fn worker_config(is_leader: bool) -> WorkerConfig {
        WorkerConfig {
            is_leader,
            enable_session_expiry: true,
            session_expiry_hours: 72,
            profile_queue_capacity: 8,
        }
    }

    fn engine(dir: &tempfile::TempDir) -> (Arc<Store>, Arc<AssessmentEngine>) {
        let store = Arc::new(Store::open(dir.path().join("workers.sled").to_str().unwrap()).unwrap());
        let engine = AssessmentEngine::new(
            store.clone(),
            Arc::new(StepCatalog::builtin().unwrap()),
            StepGrader::new(Default::default(), None, None),
            EngineConfig::default(),
            "onboarding",
        );
        (store, Arc::new(engine))
    }

    #[tokio::test]
    async fn leader_switch_controls_job_registration() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (_, engine) = engine(&tmp);
        let (tx, _) = broadcast::channel(2);

        let follower = WorkerManager::new(engine.clone(), tx.subscribe(), &worker_config(false));
        assert!(follower.planned_jobs().is_empty());

        let leader = WorkerManager::new(engine, tx.subscribe(), &worker_config(true));
        let jobs = leader.planned_jobs();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, WorkerName::SessionExpiry);
        assert!(jobs[0].enabled);
    }

    #[tokio::test]
    async fn non_leader_start_returns_immediately() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (_, engine) = engine(&tmp);
        let (tx, _) = broadcast::channel(2);

        let manager = WorkerManager::new(engine, tx.subscribe(), &worker_config(false));
        manager
            .start()
            .await
            .expect("non-leader start should succeed");
    }

    #[tokio::test]
    async fn expiry_abandons_only_stale_sessions() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let (store, engine) = engine(&tmp);

        let stale = engine.start("u-stale", None).await.unwrap().session;
        let fresh = engine.start("u-fresh", None).await.unwrap().session;

        let mut aged = stale.clone();
        aged.updated_at = Utc::now() - ChronoDuration::hours(100);
        store.update_session(&aged).unwrap();

        session_expiry::run(&engine, 72).await;

        let stale_after = store.get_session(&stale.id).unwrap().unwrap();
        assert_eq!(stale_after.status, SessionStatus::Abandoned);
        assert!(stale_after.abandoned_at.is_some());
        let fresh_after = store.get_session(&fresh.id).unwrap().unwrap();
        assert_eq!(fresh_after.status, SessionStatus::InProgress);

        let restarted = engine.start("u-stale", None).await.unwrap();
        assert!(!restarted.is_resuming);
        assert_ne!(restarted.session.id, stale.id);
    }
}
