use anyhow::{Context as _, Result};
use serenity::model::application::command::{Command, CommandOptionType};
use serenity::model::application::interaction::application_command::{
    ApplicationCommandInteraction, CommandDataOption, CommandDataOptionValue,
};
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::id::ChannelId;
use serenity::model::user::User;
use serenity::prelude::*;

use crate::router::CommandRoute;

pub mod bottom;
pub mod fren;
pub mod ping;
pub mod presence;
pub mod say;
pub mod translate;
pub mod uwurandom;

/// Replaces the global command list with every route
pub async fn register_all(ctx: &Context) -> Result<Vec<Command>> {
    Command::set_global_application_commands(&ctx.http, |commands| {
        for route in CommandRoute::ALL {
            commands.create_application_command(|command| match route {
                CommandRoute::Ping => ping::register(command),
                CommandRoute::Say => say::register(command),
                CommandRoute::Presence => presence::register(command),
                CommandRoute::Bottom => bottom::register(command),
                CommandRoute::UwuRandom => uwurandom::register(command),
                CommandRoute::FrenAdd => fren::register(command),
            });
        }
        commands.create_application_command(|command| translate::register(command))
    })
    .await
    .context("failed to register application commands")
}

/// Name of the invoked subcommand, if any
pub fn subcommand(command: &ApplicationCommandInteraction) -> Option<&str> {
    command
        .data
        .options
        .iter()
        .find(|option| option.kind == CommandOptionType::SubCommand)
        .map(|option| option.name.as_str())
}

/// Options of the invoked leaf command
pub fn leaf_options(command: &ApplicationCommandInteraction) -> &[CommandDataOption] {
    match command
        .data
        .options
        .iter()
        .find(|option| option.kind == CommandOptionType::SubCommand)
    {
        Some(sub) => &sub.options,
        None => &command.data.options,
    }
}

fn resolved<'a>(options: &'a [CommandDataOption], name: &str) -> Option<&'a CommandDataOptionValue> {
    options
        .iter()
        .find(|option| option.name == name)
        .and_then(|option| option.resolved.as_ref())
}

pub fn string_option(options: &[CommandDataOption], name: &str) -> Option<String> {
    match resolved(options, name)? {
        CommandDataOptionValue::String(value) => Some(value.clone()),
        _ => None,
    }
}

pub fn integer_option(options: &[CommandDataOption], name: &str) -> Option<i64> {
    match resolved(options, name)? {
        CommandDataOptionValue::Integer(value) => Some(*value),
        _ => None,
    }
}

pub fn bool_option(options: &[CommandDataOption], name: &str) -> Option<bool> {
    match resolved(options, name)? {
        CommandDataOptionValue::Boolean(value) => Some(*value),
        _ => None,
    }
}

pub fn user_option(options: &[CommandDataOption], name: &str) -> Option<User> {
    match resolved(options, name)? {
        CommandDataOptionValue::User(user, _) => Some(user.clone()),
        _ => None,
    }
}

pub fn channel_option(options: &[CommandDataOption], name: &str) -> Option<ChannelId> {
    match resolved(options, name)? {
        CommandDataOptionValue::Channel(channel) => Some(channel.id),
        _ => None,
    }
}

/// Answers an interaction with a message only the invoker sees
pub async fn reply_ephemeral(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    content: impl ToString,
) -> Result<()> {
    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| d.content(content).ephemeral(true))
        })
        .await
        .with_context(|| format!("failed to answer /{}", command.data.name))
}
