pub mod broadcast;
pub mod commands;
pub mod correlation;
pub mod notices;
pub mod payload;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::platform::{Channel, CopyId, Formatting, Inbound, SenderId};
use self::broadcast::{BroadcastCoordinator, BroadcastReport};
use self::commands::{Command, OwnerCapability, OwnerGate};
use self::correlation::CorrelationTable;
use self::payload::Payload;
use self::registry::SenderRegistry;

/// Why a relay step did not go through.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("sender is banned")]
    Banned,
    #[error("unsupported payload")]
    UnsupportedPayload,
    #[error("reply target is not a tracked relayed copy")]
    UnknownCorrelation,
    #[error("malformed user id: {0:?}")]
    MalformedArgument(String),
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// What happened to one inbound event.
#[derive(Debug)]
pub enum Outcome {
    /// A sender's message reached the owner as this copy.
    Forwarded(CopyId),
    /// An owner reply reached this sender. Kept out of logs.
    #[allow(dead_code)]
    Answered(SenderId),
    Broadcast(BroadcastReport),
    /// A command ran and its result was reported.
    Handled,
    /// Refused; the author was told why.
    Rejected(RelayError),
    /// A send failed. For owner replies the error was shown to the owner.
    Failed(RelayError),
    /// Nothing was done and nothing was said.
    Ignored,
}

/// Behaviour switches for the engine, taken from [`Config`].
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub owner: SenderId,
    pub owner_tag: String,
    pub reveal_sender_id: bool,
    pub max_tracked_replies: usize,
    pub broadcast_concurrency: usize,
    pub broadcast_timeout: Duration,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            owner: SenderId(config.telegram.owner_id),
            owner_tag: config.telegram.owner_tag.clone(),
            reveal_sender_id: config.relay.reveal_sender_id,
            max_tracked_replies: config.relay.max_tracked_replies,
            broadcast_concurrency: config.broadcast.concurrency,
            broadcast_timeout: Duration::from_secs(config.broadcast.send_timeout_secs),
        }
    }
}

/// Routes sender messages to the owner and owner replies back to senders.
pub struct RelayEngine {
    channel: Arc<dyn Channel>,
    gate: OwnerGate,
    owner_tag: String,
    reveal_sender_id: bool,
    registry: Arc<SenderRegistry>,
    correlations: CorrelationTable,
    broadcaster: BroadcastCoordinator,
}

impl RelayEngine {
    pub fn new(channel: Arc<dyn Channel>, settings: RelaySettings) -> Self {
        let registry = Arc::new(SenderRegistry::new());
        let broadcaster = BroadcastCoordinator::new(
            channel.clone(),
            registry.clone(),
            settings.broadcast_concurrency,
            settings.broadcast_timeout,
        );
        Self {
            channel,
            gate: OwnerGate::new(settings.owner),
            owner_tag: settings.owner_tag,
            reveal_sender_id: settings.reveal_sender_id,
            registry,
            correlations: CorrelationTable::with_limit(settings.max_tracked_replies),
            broadcaster,
        }
    }

    /// Process one inbound event.
    pub async fn handle(&self, inbound: Inbound) -> Outcome {
        let capability = self.gate.authorize(inbound.sender);
        if capability.is_none() {
            self.registry.record(inbound.sender).await;
        }

        if let Some(command) = inbound.payload.as_text().and_then(Command::parse) {
            return self.handle_command(command, &inbound, capability).await;
        }
        if inbound.payload.as_text().is_some_and(commands::is_command_shaped) {
            debug!("Ignoring unknown command");
            return Outcome::Ignored;
        }

        match capability {
            Some(_) => self.handle_owner_reply(inbound).await,
            None => self.handle_sender_message(inbound).await,
        }
    }

    async fn handle_sender_message(&self, inbound: Inbound) -> Outcome {
        let sender = inbound.sender;
        match self.forward_to_owner(sender, &inbound.payload).await {
            Ok(copy) => {
                info!("Relayed {} message to owner", inbound.payload.label());
                self.notify(sender, notices::SENT).await;
                Outcome::Forwarded(copy)
            }
            Err(RelayError::Banned) => {
                debug!("Dropped message from banned sender");
                self.notify(sender, notices::BANNED).await;
                Outcome::Rejected(RelayError::Banned)
            }
            Err(RelayError::UnsupportedPayload) => {
                self.notify(sender, notices::UNSUPPORTED_MESSAGE).await;
                Outcome::Rejected(RelayError::UnsupportedPayload)
            }
            Err(e) => {
                error!("Failed to forward message to owner: {:#}", e);
                Outcome::Failed(e)
            }
        }
    }

    async fn forward_to_owner(
        &self,
        sender: SenderId,
        payload: &Payload,
    ) -> Result<CopyId, RelayError> {
        if self.registry.is_banned(sender).await {
            return Err(RelayError::Banned);
        }

        let shown_id = self.reveal_sender_id.then_some(sender);
        let (copy, overflow) = self
            .send_payload(self.gate.owner(), payload, |body| {
                notices::forward_caption(body, shown_id)
            })
            .await?;

        // Replying to any part of a split copy reaches the same sender.
        for part in std::iter::once(copy).chain(overflow) {
            self.correlations.insert(part, sender).await;
        }
        Ok(copy)
    }

    async fn handle_owner_reply(&self, inbound: Inbound) -> Outcome {
        let owner = inbound.sender;
        match self.reply_to_sender(inbound.reply_to, &inbound.payload).await {
            Ok(recipient) => {
                info!("Delivered owner {} reply", inbound.payload.label());
                self.notify(owner, notices::REPLY_DELIVERED).await;
                Outcome::Answered(recipient)
            }
            Err(RelayError::UnknownCorrelation) => {
                self.notify(owner, notices::UNKNOWN_RECIPIENT).await;
                Outcome::Rejected(RelayError::UnknownCorrelation)
            }
            Err(RelayError::UnsupportedPayload) => {
                self.notify(owner, notices::UNSUPPORTED_REPLY).await;
                Outcome::Rejected(RelayError::UnsupportedPayload)
            }
            Err(RelayError::Transport(e)) => {
                warn!("Failed to deliver owner reply: {:#}", e);
                self.notify(owner, &notices::delivery_failed(&e)).await;
                Outcome::Failed(RelayError::Transport(e))
            }
            Err(e) => Outcome::Rejected(e),
        }
    }

    async fn reply_to_sender(
        &self,
        reply_to: Option<CopyId>,
        payload: &Payload,
    ) -> Result<SenderId, RelayError> {
        let recipient = self.resolve(reply_to).await?;
        self.send_payload(recipient, payload, notices::reply_caption)
            .await?;
        Ok(recipient)
    }

    async fn resolve(&self, reply_to: Option<CopyId>) -> Result<SenderId, RelayError> {
        let copy = reply_to.ok_or(RelayError::UnknownCorrelation)?;
        self.correlations
            .resolve(copy)
            .await
            .ok_or(RelayError::UnknownCorrelation)
    }

    /// Send any supported payload, wrapping its text or caption with `caption`.
    ///
    /// When the wrapped body would go over Telegram's limit, the header goes
    /// out alone and the body follows as plain text chunks. Returns the first
    /// copy and the copies of those chunks.
    async fn send_payload(
        &self,
        to: SenderId,
        payload: &Payload,
        caption: impl Fn(Option<&str>) -> String,
    ) -> Result<(CopyId, Vec<CopyId>), RelayError> {
        let (body, limit) = match payload {
            Payload::Text(text) => (Some(text.as_str()), notices::TEXT_LIMIT),
            Payload::Media {
                caption: original, ..
            } => (original.as_deref(), notices::CAPTION_LIMIT),
            Payload::Unsupported => return Err(RelayError::UnsupportedPayload),
        };

        let full = caption(body);
        let (head, overflow) = if notices::fits(&full, limit) {
            (full, None)
        } else {
            debug!("Body over {} units, sending it separately", limit);
            (caption(None), body)
        };

        let copy = match payload {
            Payload::Media { kind, file, .. } => {
                self.channel
                    .send_media(to, *kind, file, Some(&head), Formatting::Html)
                    .await?
            }
            _ => self.channel.send_text(to, &head, Formatting::Html).await?,
        };

        let mut extra = Vec::new();
        if let Some(body) = overflow {
            for chunk in notices::split_message(body, notices::CHUNK_LEN) {
                extra.push(self.channel.send_text(to, &chunk, Formatting::Plain).await?);
            }
        }
        Ok((copy, extra))
    }

    async fn handle_command(
        &self,
        command: Command,
        inbound: &Inbound,
        capability: Option<OwnerCapability>,
    ) -> Outcome {
        let from = inbound.sender;
        if !command.is_admin() {
            let help = match capability {
                Some(_) => notices::OWNER_HELP.to_string(),
                None => notices::sender_help(&self.owner_tag),
            };
            self.notify(from, &help).await;
            return Outcome::Handled;
        }

        let Some(cap) = capability else {
            debug!("Ignoring /{} from non-owner", command.name());
            return Outcome::Ignored;
        };

        match command {
            Command::Ban(arg) => self.ban(&cap, &arg, inbound.reply_to).await,
            Command::Unban(arg) => self.unban(&cap, &arg, inbound.reply_to).await,
            Command::Users => {
                let listing = self.list_users(&cap).await;
                self.notify(from, &listing).await;
                Outcome::Handled
            }
            Command::Broadcast(text) => {
                if text.is_empty() {
                    self.notify(from, notices::BROADCAST_USAGE).await;
                    return Outcome::Handled;
                }
                let report = self.broadcast(&cap, &text).await;
                let summary = if report.attempted() == 0 {
                    notices::BROADCAST_EMPTY.to_string()
                } else {
                    notices::broadcast_done(&report)
                };
                self.notify(from, &summary).await;
                Outcome::Broadcast(report)
            }
            Command::Start => Outcome::Handled,
        }
    }

    /// Figure out whom an admin command targets: an explicit id argument, or
    /// the sender behind the relayed copy the command replies to.
    async fn admin_target(
        &self,
        arg: &str,
        reply_to: Option<CopyId>,
    ) -> Result<SenderId, RelayError> {
        if arg.is_empty() {
            return match reply_to {
                Some(copy) => self.resolve(Some(copy)).await,
                None => Err(RelayError::MalformedArgument(String::new())),
            };
        }
        arg.parse::<u64>()
            .map(SenderId)
            .map_err(|_| RelayError::MalformedArgument(arg.to_string()))
    }

    pub async fn ban(&self, cap: &OwnerCapability, arg: &str, reply_to: Option<CopyId>) -> Outcome {
        self.set_banned(cap, arg, reply_to, true).await
    }

    pub async fn unban(&self, cap: &OwnerCapability, arg: &str, reply_to: Option<CopyId>) -> Outcome {
        self.set_banned(cap, arg, reply_to, false).await
    }

    async fn set_banned(
        &self,
        _cap: &OwnerCapability,
        arg: &str,
        reply_to: Option<CopyId>,
        banned: bool,
    ) -> Outcome {
        let owner = self.gate.owner();
        let command = if banned { "ban" } else { "unban" };

        let target = match self.admin_target(arg, reply_to).await {
            Ok(target) => target,
            Err(RelayError::MalformedArgument(bad)) => {
                self.notify(owner, &notices::malformed_id(&bad, command)).await;
                return Outcome::Rejected(RelayError::MalformedArgument(bad));
            }
            Err(e) => {
                self.notify(owner, notices::UNKNOWN_RECIPIENT).await;
                return Outcome::Rejected(e);
            }
        };

        let text = if banned {
            let changed = self.registry.ban(target).await;
            info!("Ban applied (changed: {})", changed);
            notices::banned_ok(target)
        } else {
            let changed = self.registry.unban(target).await;
            info!("Ban lifted (changed: {})", changed);
            notices::unbanned_ok(target)
        };
        self.notify(owner, &text).await;
        Outcome::Handled
    }

    pub async fn list_users(&self, _cap: &OwnerCapability) -> String {
        notices::user_list(&self.registry.list().await)
    }

    pub async fn broadcast(&self, _cap: &OwnerCapability, text: &str) -> BroadcastReport {
        self.broadcaster.broadcast(text).await
    }

    /// Send a plain notice, split if long. A failure here has nowhere else
    /// to go, so it is logged and dropped.
    async fn notify(&self, to: SenderId, text: &str) {
        for chunk in notices::split_message(text, notices::CHUNK_LEN) {
            if let Err(e) = self.channel.send_text(to, &chunk, Formatting::Plain).await {
                warn!("Failed to send notice: {:#}", e);
                return;
            }
        }
    }

    /// Log a one-line summary of relay state.
    pub async fn log_stats(&self) {
        let known = self.registry.known_count().await;
        let banned = self.registry.banned_count().await;
        let tracked = self.correlations.len().await;
        info!(
            "Relay stats: {} known sender(s), {} banned, {} tracked repl(ies)",
            known, banned, tracked
        );
    }
}
