use anyhow::{Context as _, Result};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::permissions::Permissions;
use serenity::prelude::*;

use super::{channel_option, leaf_options, string_option};
use crate::error_reporter::UserError;
use crate::utils::{MESSAGE_LIMIT, SUCCESS_COLOR};

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("say")
        .description("Make the bot say something")
        .default_member_permissions(Permissions::MANAGE_MESSAGES)
        .dm_permission(false)
        .create_option(|option| {
            option
                .name("message")
                .description("What to say")
                .kind(CommandOptionType::String)
                .required(true)
        })
        .create_option(|option| {
            option
                .name("channel")
                .description("Where to say it, defaults to this channel")
                .kind(CommandOptionType::Channel)
                .required(false)
        })
}

pub async fn run(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<()> {
    let options = leaf_options(command);
    let message = string_option(options, "message").unwrap_or_default();
    if message.trim().is_empty() {
        return Err(UserError::new("There is nothing to say.").into());
    }
    if message.chars().count() > MESSAGE_LIMIT {
        return Err(UserError::new("That message is too long for Discord.").into());
    }
    let channel_id = channel_option(options, "channel").unwrap_or(command.channel_id);

    channel_id
        .send_message(&ctx.http, |m| {
            m.content(&message)
                .allowed_mentions(|am| am.empty_parse())
        })
        .await
        .with_context(|| format!("failed to say something in {}", channel_id))?;

    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| {
                    d.ephemeral(true).embed(|e| {
                        e.title("Message sent")
                            .description(format!("Said it in <#{}>.", channel_id))
                            .color(SUCCESS_COLOR)
                    })
                })
        })
        .await
        .context("failed to answer /say")?;
    Ok(())
}
