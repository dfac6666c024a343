use crate::platform::SenderId;

/// Slash commands the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Ban(String),
    Unban(String),
    Users,
    Broadcast(String),
}

impl Command {
    /// Parse a message text. Returns `None` for ordinary text and for
    /// commands the bot does not know.
    ///
    /// Accepts the `/cmd@botname` form Telegram produces in menus.
    pub fn parse(text: &str) -> Option<Self> {
        if !is_command_shaped(text) {
            return None;
        }
        let rest = text.trim_start().strip_prefix('/')?;
        let (word, args) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };
        let name = word.split('@').next().unwrap_or(word).to_lowercase();

        match name.as_str() {
            "start" => Some(Command::Start),
            "ban" => Some(Command::Ban(args.to_string())),
            "unban" => Some(Command::Unban(args.to_string())),
            "users" => Some(Command::Users),
            "broadcast" => Some(Command::Broadcast(args.to_string())),
            _ => None,
        }
    }

    /// Whether only the owner may run this command.
    pub fn is_admin(&self) -> bool {
        !matches!(self, Command::Start)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Ban(_) => "ban",
            Command::Unban(_) => "unban",
            Command::Users => "users",
            Command::Broadcast(_) => "broadcast",
        }
    }
}

/// Whether the first word is a bot command the way Telegram marks one:
/// `/name` or `/name@bot`, both parts made of `[A-Za-z0-9_]`.
///
/// Anything else starting with `/` ("/", "/ hi", "//x") is ordinary text.
pub fn is_command_shaped(text: &str) -> bool {
    let Some(rest) = text.trim_start().strip_prefix('/') else {
        return false;
    };
    let word = rest.split(char::is_whitespace).next().unwrap_or_default();
    let mut parts = word.splitn(2, '@');
    let name = parts.next().unwrap_or_default();
    let valid = |part: &str| {
        !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    valid(name) && parts.next().map_or(true, valid)
}

/// Proof that the current event came from the owner.
///
/// Only [`OwnerGate::authorize`] can create one; every administrative
/// operation takes it by reference.
#[derive(Debug)]
pub struct OwnerCapability {
    _private: (),
}

/// The one place that decides who the owner is.
#[derive(Debug, Clone, Copy)]
pub struct OwnerGate {
    owner: SenderId,
}

impl OwnerGate {
    pub fn new(owner: SenderId) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> SenderId {
        self.owner
    }

    pub fn authorize(&self, sender: SenderId) -> Option<OwnerCapability> {
        (sender == self.owner).then_some(OwnerCapability { _private: () })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("hello"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/users"), Some(Command::Users));
        assert_eq!(
            Command::parse("/ban 12345"),
            Some(Command::Ban("12345".into()))
        );
        assert_eq!(Command::parse("/unban"), Some(Command::Unban(String::new())));
    }

    #[test]
    fn test_parse_keeps_broadcast_text() {
        assert_eq!(
            Command::parse("/broadcast  Hello\nall of you "),
            Some(Command::Broadcast("Hello\nall of you".into()))
        );
    }

    #[test]
    fn test_parse_bot_suffix_and_case() {
        assert_eq!(Command::parse("/Users@anon_bot"), Some(Command::Users));
        assert_eq!(
            Command::parse("/ban@anon_bot 7"),
            Some(Command::Ban("7".into()))
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(Command::parse("/help"), None);
    }

    #[test]
    fn test_slash_text_that_is_not_a_command() {
        for text in ["/", "/ hello owner", "//comment", "/😀 hi", "/ban@", "/a-b"] {
            assert!(!is_command_shaped(text), "{text}");
            assert_eq!(Command::parse(text), None, "{text}");
        }
    }

    #[test]
    fn test_command_shape() {
        assert!(is_command_shaped("/help"));
        assert!(is_command_shaped("/start@anon_bot"));
        assert!(is_command_shaped("/ban 123"));
        assert!(!is_command_shaped("hello /ban"));
    }

    #[test]
    fn test_only_start_is_public() {
        assert!(!Command::Start.is_admin());
        assert!(Command::Users.is_admin());
        assert!(Command::Ban(String::new()).is_admin());
    }

    #[test]
    fn test_gate_authorizes_owner_only() {
        let gate = OwnerGate::new(SenderId(1));
        assert!(gate.authorize(SenderId(1)).is_some());
        assert!(gate.authorize(SenderId(2)).is_none());
    }
}
