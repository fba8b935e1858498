use std::fmt;

use futures::lock::Mutex;
use serenity::model::id::UserId;
use serenity::model::permissions::Permissions;
use serenity::prelude::GatewayIntents;
use tokio::sync::oneshot;

/// Maximum number of messages serenity keeps per channel
pub const MESSAGE_CACHE_SIZE: usize = 200;

/// Startup progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Unconfigured,
    Configured,
    ClientBuilt,
    ListenersRegistered,
    Authenticated,
    Serving,
    Aborted,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks and logs startup transitions
#[derive(Debug)]
pub struct Sequencer {
    stage: Stage,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self {
            stage: Stage::Unconfigured,
        }
    }
}

impl Sequencer {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Moves to the next stage; stages only move forward and `Aborted` is final
    pub fn advance(&mut self, next: Stage) -> bool {
        let allowed = matches!(
            (self.stage, next),
            (Stage::Unconfigured, Stage::Configured)
                | (Stage::Configured, Stage::ClientBuilt)
                | (Stage::ClientBuilt, Stage::ListenersRegistered)
                | (Stage::ListenersRegistered, Stage::Authenticated)
                | (Stage::Authenticated, Stage::Serving)
        ) || (next == Stage::Aborted && self.stage != Stage::Aborted);

        if allowed {
            log::debug!("startup: {} -> {}", self.stage, next);
            self.stage = next;
        } else {
            log::warn!("startup: refusing {} -> {}", self.stage, next);
        }
        allowed
    }
}

/// Tells startup about the first `ready` event
pub struct ReadySignal {
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl ReadySignal {
    pub fn new() -> (ReadySignal, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let signal = ReadySignal {
            tx: Mutex::new(Some(tx)),
        };
        (signal, rx)
    }

    /// `true` only for the first call
    pub async fn fire(&self) -> bool {
        match self.tx.lock().await.take() {
            Some(tx) => {
                // startup may have given up waiting already
                let _ = tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Gateway events the bot subscribes to
pub fn gateway_intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_PRESENCES
        | GatewayIntents::GUILD_MESSAGE_REACTIONS
        | GatewayIntents::GUILD_BANS
        | GatewayIntents::GUILD_EMOJIS_AND_STICKERS
}

/// Permissions requested by the invite link
pub fn invite_permissions() -> Permissions {
    Permissions::ADD_REACTIONS
        | Permissions::VIEW_CHANNEL
        | Permissions::BAN_MEMBERS
        | Permissions::KICK_MEMBERS
        | Permissions::CREATE_PUBLIC_THREADS
        | Permissions::CREATE_PRIVATE_THREADS
        | Permissions::EMBED_LINKS
        | Permissions::MANAGE_CHANNELS
        | Permissions::MANAGE_ROLES
        | Permissions::MODERATE_MEMBERS
        | Permissions::MENTION_EVERYONE
        | Permissions::MUTE_MEMBERS
        | Permissions::SEND_MESSAGES
        | Permissions::SEND_MESSAGES_IN_THREADS
        | Permissions::READ_MESSAGE_HISTORY
}

/// OAuth2 URL adding the bot to a guild
pub fn invite_url(application_id: UserId, permissions: Permissions) -> String {
    format!(
        "https://discord.com/api/oauth2/authorize?client_id={}&permissions={}&scope=bot",
        application_id,
        permissions.bits()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_move_in_order() {
        let mut seq = Sequencer::default();
        for stage in [
            Stage::Configured,
            Stage::ClientBuilt,
            Stage::ListenersRegistered,
            Stage::Authenticated,
            Stage::Serving,
        ] {
            assert!(seq.advance(stage));
        }
        assert_eq!(seq.stage(), Stage::Serving);
    }

    #[test]
    fn authentication_needs_configuration_first() {
        let mut seq = Sequencer::default();
        assert!(!seq.advance(Stage::Authenticated));
        assert!(!seq.advance(Stage::Serving));
        assert_eq!(seq.stage(), Stage::Unconfigured);
    }

    #[test]
    fn aborted_is_final() {
        let mut seq = Sequencer::default();
        assert!(seq.advance(Stage::Aborted));
        assert!(!seq.advance(Stage::Configured));
        assert!(!seq.advance(Stage::Aborted));
        assert_eq!(seq.stage(), Stage::Aborted);
    }

    #[test]
    fn invite_url_carries_permissions() {
        let permissions = Permissions::SEND_MESSAGES | Permissions::VIEW_CHANNEL;
        assert_eq!(
            invite_url(UserId(1234), permissions),
            format!(
                "https://discord.com/api/oauth2/authorize?client_id=1234&permissions={}&scope=bot",
                (1u64 << 11) | (1u64 << 10)
            )
        );
    }

    #[test]
    fn invite_permissions_cover_moderation() {
        let permissions = invite_permissions();
        assert!(permissions.contains(Permissions::BAN_MEMBERS | Permissions::MODERATE_MEMBERS));
        assert!(!permissions.contains(Permissions::ADMINISTRATOR));
    }

    #[tokio::test]
    async fn ready_fires_once() {
        let (signal, rx) = ReadySignal::new();
        assert!(signal.fire().await);
        assert!(!signal.fire().await);
        assert!(rx.await.is_ok());
    }

    #[tokio::test]
    async fn ready_tolerates_a_dropped_receiver() {
        let (signal, rx) = ReadySignal::new();
        drop(rx);
        assert!(signal.fire().await);
    }
}
