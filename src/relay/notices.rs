//! Everything the bot says to people.

use teloxide::utils::html;

use crate::platform::SenderId;
use crate::relay::broadcast::BroadcastReport;
use crate::relay::registry::UserEntry;

pub const FORWARD_HEADER: &str = "📨 <b>New anonymous message:</b>";
pub const REPLY_HEADER: &str = "📩 <b>Anonymous reply:</b>";
pub const ANNOUNCEMENT_HEADER: &str = "📢 <b>Announcement:</b>";

/// Telegram's limits, in UTF-16 code units.
pub const TEXT_LIMIT: usize = 4096;
pub const CAPTION_LIMIT: usize = 1024;
/// Chunk size for bodies that overflow a limit. Counted in bytes, which is
/// never less than the UTF-16 length.
pub const CHUNK_LEN: usize = 4000;

pub const SENT: &str = "✅ Your message was delivered anonymously!";
pub const BANNED: &str = "🚫 You have been blocked and can no longer send messages.";
pub const UNSUPPORTED_MESSAGE: &str = "⚠️ This type of message is not supported.";
pub const UNSUPPORTED_REPLY: &str = "⚠️ This type of reply is not supported.";
pub const UNKNOWN_RECIPIENT: &str =
    "❌ Cannot determine the recipient. Reply to one of the bot's forwarded messages.";
pub const REPLY_DELIVERED: &str = "✅ Reply delivered anonymously.";
pub const NO_USERS: &str = "Nobody has written yet.";
pub const BROADCAST_USAGE: &str = "Usage: /broadcast <text>";
pub const BROADCAST_EMPTY: &str = "There is nobody to broadcast to.";

pub const OWNER_HELP: &str = "👑 You own this bot.\n\
     To answer, just Reply to a forwarded message.\n\n\
     Commands:\n\
     /ban <id> - block a sender (or reply to their message with /ban)\n\
     /unban <id> - unblock a sender\n\
     /users - list everyone who has written\n\
     /broadcast <text> - send an announcement to all senders";

pub fn sender_help(owner_tag: &str) -> String {
    format!(
        "👋 Hi!\n\
         This bot lets you send anonymous messages to {owner_tag}.\n\n\
         💬 Send anything: text, photo, video, document, audio, voice, sticker or GIF.\n\
         📌 Every message is delivered anonymously: they will not know who you are."
    )
}

/// Caption for a copy forwarded to the owner.
pub fn forward_caption(body: Option<&str>, sender: Option<SenderId>) -> String {
    let mut caption = String::from(FORWARD_HEADER);
    if let Some(id) = sender {
        caption.push_str(&format!("\n<i>from</i> <code>{id}</code>"));
    }
    push_body(&mut caption, body);
    caption
}

/// Caption for an owner reply delivered to a sender.
pub fn reply_caption(body: Option<&str>) -> String {
    let mut caption = String::from(REPLY_HEADER);
    push_body(&mut caption, body);
    caption
}

pub fn announcement(text: &str) -> String {
    let mut message = String::from(ANNOUNCEMENT_HEADER);
    push_body(&mut message, Some(text));
    message
}

fn push_body(out: &mut String, body: Option<&str>) {
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        out.push_str("\n\n");
        out.push_str(&html::escape(body));
    }
}

pub fn fits(text: &str, limit: usize) -> bool {
    text.encode_utf16().count() <= limit
}

/// Split text into chunks of at most `max_len` bytes, preferring line and
/// word breaks.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

pub fn delivery_failed(error: &anyhow::Error) -> String {
    format!("❌ Failed to deliver: {error}")
}

pub fn malformed_id(arg: &str, command: &str) -> String {
    if arg.is_empty() {
        format!("Usage: /{command} <user id>, or reply to a forwarded message with /{command}")
    } else {
        format!("❌ '{arg}' is not a valid user id. Usage: /{command} <user id>")
    }
}

pub fn banned_ok(id: SenderId) -> String {
    format!("🚫 User {id} is banned.")
}

pub fn unbanned_ok(id: SenderId) -> String {
    format!("✅ User {id} is unbanned.")
}

pub fn user_list(users: &[UserEntry]) -> String {
    if users.is_empty() {
        return NO_USERS.to_string();
    }

    let mut list = format!("Users ({}):\n\n", users.len());
    for user in users {
        let status = if user.banned { "🚫 banned" } else { "✅" };
        list.push_str(&format!(
            "  - {} {} ({} msg, since {})\n",
            user.id,
            status,
            user.messages,
            user.first_seen.format("%Y-%m-%d %H:%M UTC")
        ));
    }
    list
}

pub fn broadcast_done(report: &BroadcastReport) -> String {
    format!(
        "📢 Broadcast finished.\nDelivered: {}\nFailed: {}",
        report.delivered, report.failed
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_forward_caption_escapes_body() {
        let caption = forward_caption(Some("<b>hi</b> & bye"), None);
        assert!(caption.starts_with(FORWARD_HEADER));
        assert!(caption.contains("&lt;b&gt;hi&lt;/b&gt; &amp; bye"));
        assert!(!caption.contains("<code>"));
    }

    #[test]
    fn test_forward_caption_reveals_id_when_asked() {
        let caption = forward_caption(None, Some(SenderId(12345)));
        assert!(caption.contains("<code>12345</code>"));
    }

    #[test]
    fn test_empty_body_adds_nothing() {
        assert_eq!(reply_caption(Some("")), REPLY_HEADER);
        assert_eq!(reply_caption(None), REPLY_HEADER);
    }

    #[test]
    fn test_fits_counts_utf16_units() {
        assert!(fits(&"a".repeat(CAPTION_LIMIT), CAPTION_LIMIT));
        assert!(!fits(&"a".repeat(CAPTION_LIMIT + 1), CAPTION_LIMIT));
        // Each emoji here is two UTF-16 units.
        assert!(!fits(&"😀".repeat(513), CAPTION_LIMIT));
    }

    #[test]
    fn test_split_message_short() {
        assert_eq!(split_message("hello", 4000), vec!["hello".to_string()]);
    }

    #[test]
    fn test_split_message_prefers_line_breaks() {
        let text = format!("{}\n{}", "a".repeat(30), "b".repeat(30));
        let chunks = split_message(&text, 40);
        assert_eq!(chunks, vec![format!("{}\n", "a".repeat(30)), "b".repeat(30)]);
    }

    #[test]
    fn test_split_message_keeps_char_boundaries() {
        let text = "é".repeat(3000);
        let chunks = split_message(&text, CHUNK_LEN);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= CHUNK_LEN && fits(c, TEXT_LIMIT)));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_user_list_marks_banned() {
        let users = vec![
            UserEntry {
                id: SenderId(1),
                banned: false,
                first_seen: Utc::now(),
                messages: 3,
            },
            UserEntry {
                id: SenderId(2),
                banned: true,
                first_seen: Utc::now(),
                messages: 1,
            },
        ];
        let list = user_list(&users);
        assert!(list.starts_with("Users (2):"));
        assert!(list.contains("  - 1 ✅ (3 msg"));
        assert!(list.contains("  - 2 🚫 banned (1 msg"));
    }

    #[test]
    fn test_user_list_empty() {
        assert_eq!(user_list(&[]), NO_USERS);
    }

    #[test]
    fn test_sender_help_names_owner() {
        assert!(sender_help("@someone").contains("@someone"));
    }
}
