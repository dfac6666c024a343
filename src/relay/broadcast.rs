use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::platform::{Channel, Formatting, SenderId};
use crate::relay::notices;
use crate::relay::registry::SenderRegistry;

/// Result of one broadcast call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

impl BroadcastReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Sends an announcement to every known sender that is not banned.
///
/// Sends run concurrently, at most `concurrency` at a time, each bounded by
/// `send_timeout`. A failed or timed out send is counted and never stops the
/// others; nothing is rolled back.
pub struct BroadcastCoordinator {
    channel: Arc<dyn Channel>,
    registry: Arc<SenderRegistry>,
    concurrency: usize,
    send_timeout: Duration,
}

impl BroadcastCoordinator {
    pub fn new(
        channel: Arc<dyn Channel>,
        registry: Arc<SenderRegistry>,
        concurrency: usize,
        send_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            registry,
            concurrency: concurrency.max(1),
            send_timeout,
        }
    }

    pub async fn broadcast(&self, text: &str) -> BroadcastReport {
        // Recipients are fixed at the start; the snapshot is a set, so nobody
        // is sent to twice even if they are registered again mid-broadcast.
        let recipients = self.registry.active_senders().await;
        let message = notices::announcement(text);
        let (head, tail) = if notices::fits(&message, notices::TEXT_LIMIT) {
            (message, Vec::new())
        } else {
            (
                notices::ANNOUNCEMENT_HEADER.to_string(),
                notices::split_message(text, notices::CHUNK_LEN),
            )
        };

        info!("Broadcasting to {} recipient(s)", recipients.len());

        let results: Vec<bool> = stream::iter(recipients)
            .map(|to| self.send_one(to, &head, &tail))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let delivered = results.iter().filter(|ok| **ok).count();
        let report = BroadcastReport {
            delivered,
            failed: results.len() - delivered,
        };
        info!(
            "Broadcast finished: {} delivered, {} failed",
            report.delivered, report.failed
        );
        report
    }

    /// Send the announcement head and any overflow chunks; the timeout
    /// covers all of them.
    async fn send_one(&self, to: SenderId, head: &str, tail: &[String]) -> bool {
        let send = async {
            self.channel.send_text(to, head, Formatting::Html).await?;
            for chunk in tail {
                self.channel.send_text(to, chunk, Formatting::Plain).await?;
            }
            anyhow::Ok(())
        };
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!("Broadcast send failed: {:#}", e);
                false
            }
            Err(_) => {
                warn!(
                    "Broadcast send timed out after {}s",
                    self.send_timeout.as_secs()
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::recording::RecordingChannel;

    fn coordinator(channel: Arc<RecordingChannel>, registry: Arc<SenderRegistry>) -> BroadcastCoordinator {
        BroadcastCoordinator::new(channel, registry, 4, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_one_failure_does_not_block_others() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = Arc::new(SenderRegistry::new());
        for id in [1, 2, 3] {
            registry.record(SenderId(id)).await;
        }
        channel.fail_for(SenderId(2));

        let report = coordinator(channel.clone(), registry).broadcast("hello").await;

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 1 });
        assert_eq!(channel.sent_to(SenderId(1)).len(), 1);
        assert_eq!(channel.sent_to(SenderId(3)).len(), 1);
        assert!(channel.sent_to(SenderId(2)).is_empty());
    }

    #[tokio::test]
    async fn test_banned_senders_are_skipped() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = Arc::new(SenderRegistry::new());
        for id in [1, 2, 3] {
            registry.record(SenderId(id)).await;
        }
        registry.ban(SenderId(2)).await;

        let report = coordinator(channel.clone(), registry).broadcast("news").await;

        assert_eq!(report, BroadcastReport { delivered: 2, failed: 0 });
        assert!(channel.sent_to(SenderId(2)).is_empty());
        assert!(channel.sent_to(SenderId(1))[0].text.contains("news"));
    }

    #[tokio::test]
    async fn test_hung_send_times_out_as_failure() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = Arc::new(SenderRegistry::new());
        registry.record(SenderId(1)).await;
        registry.record(SenderId(2)).await;
        channel.hang_for(SenderId(1));

        let coordinator =
            BroadcastCoordinator::new(channel.clone(), registry, 4, Duration::from_millis(50));
        let report = coordinator.broadcast("ping").await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 1 });
        assert_eq!(channel.sent_to(SenderId(2)).len(), 1);
    }

    #[tokio::test]
    async fn test_long_announcement_is_split() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = Arc::new(SenderRegistry::new());
        registry.record(SenderId(1)).await;
        let text = "x".repeat(4090);

        let report = coordinator(channel.clone(), registry).broadcast(&text).await;

        assert_eq!(report, BroadcastReport { delivered: 1, failed: 0 });
        let sent = channel.sent_to(SenderId(1));
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].text, notices::ANNOUNCEMENT_HEADER);
        assert_eq!(format!("{}{}", sent[1].text, sent[2].text), text);
    }

    #[tokio::test]
    async fn test_nobody_to_send_to() {
        let channel = Arc::new(RecordingChannel::new());
        let registry = Arc::new(SenderRegistry::new());

        let report = coordinator(channel.clone(), registry).broadcast("x").await;

        assert_eq!(report.attempted(), 0);
        assert_eq!(channel.total_sent(), 0);
    }
}
