/// Name of the text channel the chat bot lives in
pub const CHAT_CHANNEL_NAME: &str = "chatbot";

/// Slash commands the bot answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandRoute {
    Ping,
    Say,
    Presence,
    Bottom,
    UwuRandom,
    FrenAdd,
}

impl CommandRoute {
    /// Every slash command, in registration order
    pub const ALL: [CommandRoute; 6] = [
        CommandRoute::Ping,
        CommandRoute::Say,
        CommandRoute::Presence,
        CommandRoute::Bottom,
        CommandRoute::UwuRandom,
        CommandRoute::FrenAdd,
    ];

    /// Resolves a command name and its subcommand; unknown pairs resolve to nothing
    pub fn resolve(name: &str, subcommand: Option<&str>) -> Option<CommandRoute> {
        match (name, subcommand) {
            ("ping", _) => Some(CommandRoute::Ping),
            ("say", _) => Some(CommandRoute::Say),
            ("presence", _) => Some(CommandRoute::Presence),
            ("bottom", _) => Some(CommandRoute::Bottom),
            ("uwurandom", _) => Some(CommandRoute::UwuRandom),
            ("fren", Some("add")) => Some(CommandRoute::FrenAdd),
            _ => None,
        }
    }

    /// Top level command name
    pub fn name(self) -> &'static str {
        match self {
            CommandRoute::Ping => "ping",
            CommandRoute::Say => "say",
            CommandRoute::Presence => "presence",
            CommandRoute::Bottom => "bottom",
            CommandRoute::UwuRandom => "uwurandom",
            CommandRoute::FrenAdd => "fren",
        }
    }
}

/// Message context menu commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMenuRoute {
    Translate,
}

impl ContextMenuRoute {
    pub fn resolve(name: &str) -> Option<ContextMenuRoute> {
        match name {
            "Translate" => Some(ContextMenuRoute::Translate),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContextMenuRoute::Translate => "Translate",
        }
    }
}

/// Where a message was posted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelKind {
    /// Guild text channel with its name
    GuildText(String),
    /// Direct message with the bot
    Direct,
    /// Threads, voice text, news and anything else
    Other,
}

/// What the message listeners look at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFacts {
    pub channel: ChannelKind,
    pub is_bot: bool,
    pub is_webhook: bool,
}

/// Chat listener: `#chatbot`, ignoring bots unless they post through a webhook
pub fn routes_to_chat(facts: &MessageFacts) -> bool {
    let ChannelKind::GuildText(name) = &facts.channel else {
        return false;
    };
    if name != CHAT_CHANNEL_NAME {
        return false;
    }
    !facts.is_bot || facts.is_webhook
}

/// DM listener: direct messages only
pub fn routes_to_dm_log(facts: &MessageFacts) -> bool {
    facts.channel == ChannelKind::Direct
}

/// Message listeners, evaluated independently for every message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRoute {
    Chat,
    DirectMessage,
}

impl MessageRoute {
    /// Listener order
    pub const ALL: [MessageRoute; 2] = [MessageRoute::Chat, MessageRoute::DirectMessage];

    pub fn matches(self, facts: &MessageFacts) -> bool {
        match self {
            MessageRoute::Chat => routes_to_chat(facts),
            MessageRoute::DirectMessage => routes_to_dm_log(facts),
        }
    }

    /// Listeners accepting the message
    pub fn matching(facts: &MessageFacts) -> Vec<MessageRoute> {
        Self::ALL
            .into_iter()
            .filter(|route| route.matches(facts))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(channel: ChannelKind, is_bot: bool, is_webhook: bool) -> MessageFacts {
        MessageFacts {
            channel,
            is_bot,
            is_webhook,
        }
    }

    #[test]
    fn ping_resolves_to_ping_only() {
        assert_eq!(CommandRoute::resolve("ping", None), Some(CommandRoute::Ping));
    }

    #[test]
    fn unknown_command_resolves_to_nothing() {
        assert_eq!(CommandRoute::resolve("unknown", None), None);
        assert_eq!(ContextMenuRoute::resolve("unknown"), None);
        assert_eq!(ContextMenuRoute::resolve("translate"), None);
    }

    #[test]
    fn fren_needs_the_add_subcommand() {
        assert_eq!(
            CommandRoute::resolve("fren", Some("add")),
            Some(CommandRoute::FrenAdd)
        );
        assert_eq!(CommandRoute::resolve("fren", Some("remove")), None);
        assert_eq!(CommandRoute::resolve("fren", None), None);
    }

    #[test]
    fn names_round_trip() {
        for route in CommandRoute::ALL {
            let sub = (route == CommandRoute::FrenAdd).then_some("add");
            assert_eq!(CommandRoute::resolve(route.name(), sub), Some(route));
        }
        assert_eq!(
            ContextMenuRoute::resolve(ContextMenuRoute::Translate.name()),
            Some(ContextMenuRoute::Translate)
        );
    }

    #[test]
    fn chatbot_message_goes_to_chat_only() {
        let facts = facts(ChannelKind::GuildText("chatbot".into()), false, false);
        assert_eq!(MessageRoute::matching(&facts), vec![MessageRoute::Chat]);
    }

    #[test]
    fn direct_message_goes_to_dm_log_only() {
        let facts = facts(ChannelKind::Direct, false, false);
        assert_eq!(
            MessageRoute::matching(&facts),
            vec![MessageRoute::DirectMessage]
        );
    }

    #[test]
    fn bots_are_ignored_unless_webhook() {
        let bot = facts(ChannelKind::GuildText("chatbot".into()), true, false);
        let webhook = facts(ChannelKind::GuildText("chatbot".into()), true, true);
        assert!(!routes_to_chat(&bot));
        assert!(routes_to_chat(&webhook));
    }

    #[test]
    fn other_channels_match_nothing() {
        let general = facts(ChannelKind::GuildText("general".into()), false, false);
        let thread = facts(ChannelKind::Other, false, false);
        assert!(MessageRoute::matching(&general).is_empty());
        assert!(MessageRoute::matching(&thread).is_empty());
    }
}
