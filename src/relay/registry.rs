use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use crate::platform::SenderId;

/// What the registry remembers about a sender.
#[derive(Debug, Clone)]
struct SenderRecord {
    first_seen: DateTime<Utc>,
    messages: u64,
}

/// One row of the `/users` listing.
#[derive(Debug, Clone, PartialEq)]
pub struct UserEntry {
    pub id: SenderId,
    pub banned: bool,
    pub first_seen: DateTime<Utc>,
    pub messages: u64,
}

/// Every sender seen since startup, plus the ban set.
///
/// The two sets are independent: an id can be banned before it ever writes,
/// and banning never removes an id from the known set. Each set has its own
/// lock and no operation needs both at once.
#[derive(Default)]
pub struct SenderRegistry {
    known: RwLock<HashMap<SenderId, SenderRecord>>,
    banned: RwLock<HashSet<SenderId>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note that `id` wrote to the bot. Returns true the first time.
    pub async fn record(&self, id: SenderId) -> bool {
        let mut known = self.known.write().await;
        match known.get_mut(&id) {
            Some(record) => {
                record.messages += 1;
                false
            }
            None => {
                known.insert(
                    id,
                    SenderRecord {
                        first_seen: Utc::now(),
                        messages: 1,
                    },
                );
                debug!("New sender registered ({} known)", known.len());
                true
            }
        }
    }

    pub async fn is_banned(&self, id: SenderId) -> bool {
        self.banned.read().await.contains(&id)
    }

    /// Returns true if the id was not banned before.
    pub async fn ban(&self, id: SenderId) -> bool {
        self.banned.write().await.insert(id)
    }

    /// Returns true if the id was banned before.
    pub async fn unban(&self, id: SenderId) -> bool {
        self.banned.write().await.remove(&id)
    }

    /// Known senders that are not currently banned.
    pub async fn active_senders(&self) -> Vec<SenderId> {
        let ids: Vec<SenderId> = self.known.read().await.keys().copied().collect();
        let banned = self.banned.read().await;
        ids.into_iter().filter(|id| !banned.contains(id)).collect()
    }

    /// All known senders, oldest first.
    pub async fn list(&self) -> Vec<UserEntry> {
        let mut entries: Vec<UserEntry> = {
            let known = self.known.read().await;
            known
                .iter()
                .map(|(id, record)| UserEntry {
                    id: *id,
                    banned: false,
                    first_seen: record.first_seen,
                    messages: record.messages,
                })
                .collect()
        };

        let banned = self.banned.read().await;
        for entry in &mut entries {
            entry.banned = banned.contains(&entry.id);
        }
        entries.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.id.cmp(&b.id)));
        entries
    }

    pub async fn known_count(&self) -> usize {
        self.known.read().await.len()
    }

    pub async fn banned_count(&self) -> usize {
        self.banned.read().await.len()
    }
}
