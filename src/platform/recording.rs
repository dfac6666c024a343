//! In-memory [`Channel`] for tests: records every send, can be told to fail
//! or hang for particular recipients. Rejects texts and captions over
//! Telegram's length limits the way the Bot API does.

use std::collections::HashSet;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{Channel, CopyId, Formatting, SenderId};
use crate::relay::notices::{fits, CAPTION_LIMIT, TEXT_LIMIT};
use crate::relay::payload::{FileRef, MediaKind};

#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub to: SenderId,
    pub copy: CopyId,
    pub text: String,
    pub media: Option<(MediaKind, FileRef)>,
    pub formatting: Formatting,
}

#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<SenderId>>,
    hanging: Mutex<HashSet<SenderId>>,
    next_id: Mutex<i32>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1000),
            ..Default::default()
        }
    }

    pub fn fail_for(&self, id: SenderId) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn recover(&self, id: SenderId) {
        self.failing.lock().unwrap().remove(&id);
    }

    pub fn hang_for(&self, id: SenderId) {
        self.hanging.lock().unwrap().insert(id);
    }

    pub fn sent_to(&self, id: SenderId) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.to == id)
            .cloned()
            .collect()
    }

    pub fn last_to(&self, id: SenderId) -> Option<SentMessage> {
        self.sent_to(id).pop()
    }

    pub fn total_sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    async fn record(
        &self,
        to: SenderId,
        text: &str,
        media: Option<(MediaKind, FileRef)>,
        formatting: Formatting,
    ) -> Result<CopyId> {
        if self.hanging.lock().unwrap().contains(&to) {
            futures::future::pending::<()>().await;
        }
        if self.failing.lock().unwrap().contains(&to) {
            bail!("Forbidden: bot was blocked by the user");
        }

        let copy = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            CopyId(*next)
        };
        self.sent.lock().unwrap().push(SentMessage {
            to,
            copy,
            text: text.to_string(),
            media,
            formatting,
        });
        Ok(copy)
    }
}

#[async_trait]
impl Channel for RecordingChannel {
    async fn send_text(&self, to: SenderId, text: &str, formatting: Formatting) -> Result<CopyId> {
        if !fits(text, TEXT_LIMIT) {
            bail!("Bad Request: message is too long");
        }
        self.record(to, text, None, formatting).await
    }

    async fn send_media(
        &self,
        to: SenderId,
        kind: MediaKind,
        file: &FileRef,
        caption: Option<&str>,
        formatting: Formatting,
    ) -> Result<CopyId> {
        let caption = caption.unwrap_or_default();
        if !fits(caption, CAPTION_LIMIT) {
            bail!("Bad Request: message caption is too long");
        }
        self.record(
            to,
            caption,
            Some((kind, file.clone())),
            formatting,
        )
        .await
    }
}
