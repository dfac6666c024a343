//! Periodic relay stats, so a quiet bot still shows up in the logs.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::relay::RelayEngine;

/// Start a scheduler that logs relay counters on `cron_expr`.
///
/// The returned scheduler must be kept alive for the job to keep firing.
pub async fn start(engine: Arc<RelayEngine>, cron_expr: &str) -> Result<JobScheduler> {
    let job = Job::new_async(cron_expr, move |_uuid, _lock| {
        let engine = engine.clone();
        Box::pin(async move {
            engine.log_stats().await;
        })
    })
    .with_context(|| format!("Invalid heartbeat schedule: {}", cron_expr))?;

    let scheduler = JobScheduler::new()
        .await
        .context("Failed to create job scheduler")?;

    scheduler
        .add(job)
        .await
        .context("Failed to add heartbeat job")?;
    scheduler
        .start()
        .await
        .context("Failed to start scheduler")?;

    info!("Heartbeat scheduled with cron: {}", cron_expr);
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::recording::RecordingChannel;
    use crate::platform::SenderId;
    use crate::relay::RelaySettings;
    use std::time::Duration;

    fn engine() -> Arc<RelayEngine> {
        let settings = RelaySettings {
            owner: SenderId(1),
            owner_tag: "@owner".to_string(),
            reveal_sender_id: false,
            max_tracked_replies: 0,
            broadcast_concurrency: 1,
            broadcast_timeout: Duration::from_secs(1),
        };
        Arc::new(RelayEngine::new(Arc::new(RecordingChannel::new()), settings))
    }

    #[tokio::test]
    async fn test_rejects_bad_schedule() {
        let err = match start(engine(), "not a cron line").await {
            Err(e) => e,
            Ok(_) => panic!("bad cron line was accepted"),
        };
        assert!(err.to_string().contains("Invalid heartbeat schedule"));
    }
}
