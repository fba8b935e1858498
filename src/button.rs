use anyhow::Result;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::id::UserId;
use serenity::prelude::*;

use crate::app_config::AppConfig;
use crate::commands::fren;
use crate::store::Store;

/// Buttons the bot knows how to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    FrenAccept { inviter: UserId, target: UserId },
    FrenDecline { inviter: UserId, target: UserId },
}

impl ButtonAction {
    /// Parses a custom id such as `fren:accept:<inviter>:<target>`
    pub fn parse(custom_id: &str) -> Option<ButtonAction> {
        let mut parts = custom_id.split(':');
        let scope = parts.next()?;
        let verb = parts.next()?;
        let inviter = UserId(parts.next()?.parse().ok()?);
        let target = UserId(parts.next()?.parse().ok()?);
        if parts.next().is_some() {
            return None;
        }
        match (scope, verb) {
            ("fren", "accept") => Some(ButtonAction::FrenAccept { inviter, target }),
            ("fren", "decline") => Some(ButtonAction::FrenDecline { inviter, target }),
            _ => None,
        }
    }

    pub fn custom_id(&self) -> String {
        match self {
            ButtonAction::FrenAccept { inviter, target } => {
                format!("fren:accept:{}:{}", inviter, target)
            }
            ButtonAction::FrenDecline { inviter, target } => {
                format!("fren:decline:{}:{}", inviter, target)
            }
        }
    }
}

/// Handles every button press; unknown buttons are ignored
pub async fn handle_button(
    ctx: &Context,
    component: &MessageComponentInteraction,
    store: &Store,
    config: &AppConfig,
) -> Result<()> {
    let Some(action) = ButtonAction::parse(&component.data.custom_id) else {
        log::debug!("ignoring button {}", component.data.custom_id);
        return Ok(());
    };
    match action {
        ButtonAction::FrenAccept { inviter, target } => {
            fren::accept(ctx, component, store, config.fren_role_id, inviter, target).await
        }
        ButtonAction::FrenDecline { inviter, target } => {
            fren::decline(ctx, component, inviter, target).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_round_trip() {
        for action in [
            ButtonAction::FrenAccept {
                inviter: UserId(1),
                target: UserId(2),
            },
            ButtonAction::FrenDecline {
                inviter: UserId(3),
                target: UserId(4),
            },
        ] {
            assert_eq!(ButtonAction::parse(&action.custom_id()), Some(action));
        }
    }

    #[test]
    fn unknown_ids_are_ignored() {
        for id in [
            "",
            "fren",
            "fren:accept:1",
            "fren:accept:x:2",
            "fren:hug:1:2",
            "catstare:accept:1:2",
            "fren:accept:1:2:3",
        ] {
            assert_eq!(ButtonAction::parse(id), None, "{id}");
        }
    }
}
