use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId, InputFile, ParseMode, UserId};
use teloxide::utils::html;
use tracing::{debug, info, warn};

use super::{Channel, CopyId, Formatting, Inbound, SenderId};
use crate::relay::payload::{FileRef, MediaKind, Payload};
use crate::relay::{Outcome, RelayEngine};

/// [`Channel`] backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn chat_of(id: SenderId) -> ChatId {
    ChatId::from(UserId(id.0))
}

fn parse_mode(formatting: Formatting) -> Option<ParseMode> {
    match formatting {
        Formatting::Plain => None,
        Formatting::Html => Some(ParseMode::Html),
    }
}

#[async_trait]
impl Channel for TelegramChannel {
    async fn send_text(&self, to: SenderId, text: &str, formatting: Formatting) -> Result<CopyId> {
        let mut request = self.bot.send_message(chat_of(to), text);
        if let Some(mode) = parse_mode(formatting) {
            request = request.parse_mode(mode);
        }
        let sent = request.await?;
        Ok(CopyId(sent.id.0))
    }

    async fn send_media(
        &self,
        to: SenderId,
        kind: MediaKind,
        file: &FileRef,
        caption: Option<&str>,
        formatting: Formatting,
    ) -> Result<CopyId> {
        let chat = chat_of(to);
        let input = InputFile::file_id(FileId(file.0.clone()));
        let caption = caption.unwrap_or_default();

        // Kinds without a caption field get it as a text message right before.
        if !kind.supports_caption() && !caption.is_empty() {
            self.send_text(to, caption, formatting).await?;
        }

        // Media captions always go out as HTML; plain text is escaped to match.
        let mode = ParseMode::Html;
        let caption = match formatting {
            Formatting::Plain => html::escape(caption),
            Formatting::Html => caption.to_string(),
        };

        let sent = match kind {
            MediaKind::Photo => {
                self.bot
                    .send_photo(chat, input)
                    .caption(caption)
                    .parse_mode(mode)
                    .await?
            }
            MediaKind::Video => {
                self.bot
                    .send_video(chat, input)
                    .caption(caption)
                    .parse_mode(mode)
                    .await?
            }
            MediaKind::Document => {
                self.bot
                    .send_document(chat, input)
                    .caption(caption)
                    .parse_mode(mode)
                    .await?
            }
            MediaKind::Audio => {
                self.bot
                    .send_audio(chat, input)
                    .caption(caption)
                    .parse_mode(mode)
                    .await?
            }
            MediaKind::Voice => {
                self.bot
                    .send_voice(chat, input)
                    .caption(caption)
                    .parse_mode(mode)
                    .await?
            }
            MediaKind::Animation => {
                self.bot
                    .send_animation(chat, input)
                    .caption(caption)
                    .parse_mode(mode)
                    .await?
            }
            MediaKind::Sticker => self.bot.send_sticker(chat, input).await?,
            MediaKind::VideoNote => self.bot.send_video_note(chat, input).await?,
        };
        Ok(CopyId(sent.id.0))
    }
}

/// Reduce a Telegram message to the relay's payload type.
pub fn payload_of(msg: &Message) -> Payload {
    let caption = msg.caption().map(str::to_string);

    if let Some(text) = msg.text() {
        return Payload::Text(text.to_string());
    }
    // Telegram lists photo sizes smallest first.
    if let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) {
        return Payload::media(MediaKind::Photo, photo.file.id.0.clone(), caption);
    }
    if let Some(video) = msg.video() {
        return Payload::media(MediaKind::Video, video.file.id.0.clone(), caption);
    }
    // Animations also arrive with a document attached; check them first.
    if let Some(animation) = msg.animation() {
        return Payload::media(MediaKind::Animation, animation.file.id.0.clone(), caption);
    }
    if let Some(document) = msg.document() {
        return Payload::media(MediaKind::Document, document.file.id.0.clone(), caption);
    }
    if let Some(audio) = msg.audio() {
        return Payload::media(MediaKind::Audio, audio.file.id.0.clone(), caption);
    }
    if let Some(voice) = msg.voice() {
        return Payload::media(MediaKind::Voice, voice.file.id.0.clone(), caption);
    }
    if let Some(sticker) = msg.sticker() {
        return Payload::media(MediaKind::Sticker, sticker.file.id.0.clone(), None);
    }
    if let Some(note) = msg.video_note() {
        return Payload::media(MediaKind::VideoNote, note.file.id.0.clone(), None);
    }
    Payload::Unsupported
}

/// Run the Telegram bot platform
pub async fn run(engine: Arc<RelayEngine>, bot: Bot) -> Result<()> {
    info!("Starting Telegram platform...");

    // Only private chats: in groups the relay would leak who is talking.
    let handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private() && msg.from.is_some())
        .endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![engine])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(msg: Message, engine: Arc<RelayEngine>) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };

    let inbound = Inbound {
        sender: SenderId(user.id.0),
        payload: payload_of(&msg),
        reply_to: msg.reply_to_message().map(|m| CopyId(m.id.0)),
    };
    debug!("Inbound {} message", inbound.payload.label());

    let outcome = engine.handle(inbound).await;
    match (&outcome, describe(&outcome)) {
        (Outcome::Failed(_), Some(line)) => warn!("{}", line),
        (_, Some(line)) => debug!("{}", line),
        (_, None) => {}
    }

    Ok(())
}

/// Log line for an outcome. The recipient of an owner reply stays out of it.
fn describe(outcome: &Outcome) -> Option<String> {
    match outcome {
        Outcome::Forwarded(copy) => Some(format!("Forwarded as message {}", copy.0)),
        Outcome::Answered(_) => Some("Owner reply delivered".to_string()),
        Outcome::Broadcast(report) => Some(format!(
            "Broadcast delivered to {}, failed for {}",
            report.delivered, report.failed
        )),
        Outcome::Rejected(e) => Some(format!("Message refused: {}", e)),
        Outcome::Failed(e) => Some(format!("Message not relayed: {}", e)),
        Outcome::Handled | Outcome::Ignored => None,
    }
}
