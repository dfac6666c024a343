pub mod telegram;

#[cfg(test)]
pub mod recording;

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;

use crate::relay::payload::{FileRef, MediaKind, Payload};

/// Platform user id of whoever wrote to the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SenderId(pub u64);

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Id the platform assigned to a message the bot sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CopyId(pub i32);

/// How the recipient's client should render outgoing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatting {
    Plain,
    Html,
}

/// A message received from the platform, already reduced to what the relay needs.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub sender: SenderId,
    pub payload: Payload,
    /// The bot message this one replies to, if any.
    pub reply_to: Option<CopyId>,
}

/// Outbound half of a messaging platform. Every call may fail.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn send_text(&self, to: SenderId, text: &str, formatting: Formatting) -> Result<CopyId>;

    /// Send a media item by reference. Implementations deliver `caption` even
    /// for kinds that cannot carry one (see [`MediaKind::supports_caption`]).
    async fn send_media(
        &self,
        to: SenderId,
        kind: MediaKind,
        file: &FileRef,
        caption: Option<&str>,
        formatting: Formatting,
    ) -> Result<CopyId>;
}
