use chrono::{Duration, Utc};

use crate::assessment::AssessmentEngine;

pub async fn run(engine: &AssessmentEngine, expiry_hours: u64) {
    tracing::debug!("session_expiry: start");
    let cutoff = i64::try_from(expiry_hours)
        .ok()
        .and_then(Duration::try_hours)
        .and_then(|age| Utc::now().checked_sub_signed(age));
    let Some(cutoff) = cutoff else {
        tracing::warn!(expiry_hours, "session_expiry: expiry window out of range, skipping");
        return;
    };
    match engine.expire_stale_sessions(cutoff).await {
        Ok(count) => tracing::info!(expired = count, "session_expiry: done"),
        Err(e) => tracing::error!(error = %e, "session_expiry failed"),
    }
}
