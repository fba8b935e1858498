use anyhow::Result;
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::gateway::Activity;
use serenity::model::permissions::Permissions;
use serenity::prelude::*;

use super::{leaf_options, reply_ephemeral, string_option};
use crate::error_reporter::UserError;
use crate::utils::truncate_chars;

/// Longest activity text Discord displays
const ACTIVITY_LIMIT: usize = 128;

/// Activity kinds offered by `/presence`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    Playing,
    Listening,
    Watching,
    Competing,
}

impl ActivityKind {
    pub fn parse(value: &str) -> Option<ActivityKind> {
        match value {
            "playing" => Some(ActivityKind::Playing),
            "listening" => Some(ActivityKind::Listening),
            "watching" => Some(ActivityKind::Watching),
            "competing" => Some(ActivityKind::Competing),
            _ => None,
        }
    }

    pub fn activity(self, text: &str) -> Activity {
        match self {
            ActivityKind::Playing => Activity::playing(text),
            ActivityKind::Listening => Activity::listening(text),
            ActivityKind::Watching => Activity::watching(text),
            ActivityKind::Competing => Activity::competing(text),
        }
    }

    /// Human readable description
    pub fn describe(self, text: &str) -> String {
        match self {
            ActivityKind::Playing => format!("Playing **{}**", text),
            ActivityKind::Listening => format!("Listening to **{}**", text),
            ActivityKind::Watching => format!("Watching **{}**", text),
            ActivityKind::Competing => format!("Competing in **{}**", text),
        }
    }
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("presence")
        .description("Change what the bot is up to")
        .default_member_permissions(Permissions::MANAGE_MESSAGES)
        .dm_permission(false)
        .create_option(|option| {
            option
                .name("type")
                .description("Kind of activity")
                .kind(CommandOptionType::String)
                .required(true)
                .add_string_choice("Playing", "playing")
                .add_string_choice("Listening", "listening")
                .add_string_choice("Watching", "watching")
                .add_string_choice("Competing", "competing")
        })
        .create_option(|option| {
            option
                .name("text")
                .description("Activity text")
                .kind(CommandOptionType::String)
                .required(true)
        })
}

pub async fn run(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<()> {
    let options = leaf_options(command);
    let kind = string_option(options, "type")
        .as_deref()
        .and_then(ActivityKind::parse)
        .ok_or_else(|| UserError::new("Unknown activity type."))?;
    let text = truncate_chars(string_option(options, "text").unwrap_or_default().trim(), ACTIVITY_LIMIT);
    if text.is_empty() {
        return Err(UserError::new("The activity text cannot be empty.").into());
    }

    ctx.set_activity(kind.activity(&text)).await;
    log::info!("presence set by {}: {:?} {}", command.user.tag(), kind, text);

    reply_ephemeral(ctx, command, format!("Now {}.", kind.describe(&text))).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_choice() {
        for (value, kind) in [
            ("playing", ActivityKind::Playing),
            ("listening", ActivityKind::Listening),
            ("watching", ActivityKind::Watching),
            ("competing", ActivityKind::Competing),
        ] {
            assert_eq!(ActivityKind::parse(value), Some(kind));
        }
        assert_eq!(ActivityKind::parse("streaming"), None);
    }

    #[test]
    fn describes_activity() {
        assert_eq!(
            ActivityKind::Listening.describe("lofi"),
            "Listening to **lofi**"
        );
    }
}
