use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::assessment::profile::ProfileExtractor;

#[cfg(test)]
const RETRY_DELAY: Duration = Duration::from_millis(10);
#[cfg(not(test))]
const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Extra attempts after the first failure.
const MAX_RETRIES: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileJob {
    pub user_id: String,
    pub session_id: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("profile extraction queue is full")]
    Full,
    #[error("profile extraction queue is closed")]
    Closed,
}

/// Sending half of the profile-extraction task queue. Submission never waits.
#[derive(Debug, Clone)]
pub struct ProfileExtractionQueue {
    tx: mpsc::Sender<ProfileJob>,
}

impl ProfileExtractionQueue {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ProfileJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn submit(&self, job: ProfileJob) -> Result<(), QueueError> {
        self.tx.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => QueueError::Full,
            mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
        })
    }
}

/// Runs one job, retrying once. Returns whether the profile was stored.
pub async fn process(extractor: &dyn ProfileExtractor, job: &ProfileJob) -> bool {
    let mut attempt = 0;
    loop {
        match extractor.extract(&job.user_id, &job.session_id).await {
            Ok(()) => return true,
            Err(e) if attempt < MAX_RETRIES => {
                attempt += 1;
                tracing::warn!(
                    user_id = %job.user_id,
                    session_id = %job.session_id,
                    attempt,
                    error = %e,
                    "Profile extraction failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(e) => {
                tracing::error!(
                    user_id = %job.user_id,
                    session_id = %job.session_id,
                    error = %e,
                    "Profile extraction failed, dropping job"
                );
                return false;
            }
        }
    }
}

/// Consumes jobs until the queue closes or shutdown is signalled.
pub async fn run(
    mut rx: mpsc::Receiver<ProfileJob>,
    extractor: Arc<dyn ProfileExtractor>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    tracing::info!("profile_extraction: worker started");
    loop {
        tokio::select! {
            job = rx.recv() => {
                let Some(job) = job else { break };
                process(extractor.as_ref(), &job).await;
            }
            _ = shutdown_rx.recv() => break,
        }
    }
    tracing::info!("profile_extraction: worker stopped");
}
