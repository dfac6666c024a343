use std::fmt;

/// Opaque platform reference to an already-uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef(pub String);

/// Media kinds the relay knows how to pass along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    Animation,
    VideoNote,
}

impl MediaKind {
    /// Stickers and round video notes are sent without a caption; the caption
    /// has to travel as a separate text message.
    pub fn supports_caption(self) -> bool {
        !matches!(self, MediaKind::Sticker | MediaKind::VideoNote)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
            MediaKind::Audio => "audio",
            MediaKind::Voice => "voice",
            MediaKind::Sticker => "sticker",
            MediaKind::Animation => "animation",
            MediaKind::VideoNote => "video note",
        };
        f.write_str(name)
    }
}

/// Content of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Text(String),
    Media {
        kind: MediaKind,
        file: FileRef,
        caption: Option<String>,
    },
    /// Anything the platform delivered that the relay cannot forward
    /// (locations, polls, contacts, ...).
    Unsupported,
}

impl Payload {
    pub fn media(kind: MediaKind, file: impl Into<String>, caption: Option<String>) -> Self {
        Payload::Media {
            kind,
            file: FileRef(file.into()),
            caption,
        }
    }

    /// Text of a plain text message, if that is what this is.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Short label for logs; never includes content.
    pub fn label(&self) -> String {
        match self {
            Payload::Text(_) => "text".to_string(),
            Payload::Media { kind, .. } => kind.to_string(),
            Payload::Unsupported => "unsupported".to_string(),
        }
    }
}
