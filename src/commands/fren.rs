use anyhow::{Context as _, Result};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::component::ButtonStyle;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::id::{RoleId, UserId};
use serenity::prelude::*;

use super::{leaf_options, user_option};
use crate::button::ButtonAction;
use crate::error_reporter::UserError;
use crate::store::Store;

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("fren")
        .description("Frens!")
        .dm_permission(false)
        .create_option(|option| {
            option
                .name("add")
                .description("Ask someone to be your fren")
                .kind(CommandOptionType::SubCommand)
                .create_sub_option(|sub| {
                    sub.name("user")
                        .description("Your future fren")
                        .kind(CommandOptionType::User)
                        .required(true)
                })
        })
}

/// Posts a fren request with accept and decline buttons
pub async fn add(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<()> {
    let target = user_option(leaf_options(command), "user")
        .context("/fren add without a user option")?;
    if target.id == command.user.id {
        return Err(UserError::new("You are already your own fren. 💖").into());
    }
    if target.bot {
        return Err(UserError::new("Bots can't be frens, sorry.").into());
    }

    let inviter = command.user.id;
    let accept = ButtonAction::FrenAccept {
        inviter,
        target: target.id,
    };
    let decline = ButtonAction::FrenDecline {
        inviter,
        target: target.id,
    };

    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| {
                    d.content(format!(
                        "<@{}>, <@{}> wants to be your fren!",
                        target.id, inviter
                    ))
                    .allowed_mentions(|am| am.users(vec![target.id]))
                    .components(|c| {
                        c.create_action_row(|row| {
                            row.create_button(|b| {
                                b.custom_id(accept.custom_id())
                                    .label("Accept")
                                    .style(ButtonStyle::Success)
                            })
                            .create_button(|b| {
                                b.custom_id(decline.custom_id())
                                    .label("Decline")
                                    .style(ButtonStyle::Secondary)
                            })
                        })
                    })
                })
        })
        .await
        .context("failed to post the fren request")?;
    Ok(())
}

/// Tells someone the button is not theirs
async fn refuse(ctx: &Context, component: &MessageComponentInteraction) -> Result<()> {
    component
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| {
                    d.content("This fren request isn't for you.").ephemeral(true)
                })
        })
        .await
        .context("failed to refuse the button press")?;
    Ok(())
}

/// Replaces the request with `content` and drops its buttons
async fn close_request(
    ctx: &Context,
    component: &MessageComponentInteraction,
    content: String,
) -> Result<()> {
    component
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::UpdateMessage)
                .interaction_response_data(|d| {
                    d.content(content)
                        .allowed_mentions(|am| am.empty_parse())
                        .components(|c| c)
                })
        })
        .await
        .context("failed to close the fren request")?;
    Ok(())
}

pub async fn accept(
    ctx: &Context,
    component: &MessageComponentInteraction,
    store: &Store,
    fren_role: Option<RoleId>,
    inviter: UserId,
    target: UserId,
) -> Result<()> {
    if component.user.id != target {
        return refuse(ctx, component).await;
    }
    let guild_id = component
        .guild_id
        .context("fren request answered outside a guild")?;

    let is_new = store.add_fren(guild_id, inviter, target).await?;
    if let Some(role) = fren_role {
        for user in [inviter, target] {
            ctx.http
                .add_member_role(guild_id.0, user.0, role.0, Some("fren request accepted"))
                .await
                .with_context(|| format!("failed to give the fren role to {}", user))?;
        }
    }
    let frens = store.frens_of(guild_id, target).await?.len();
    log::info!("{} and {} are frens in {} (new: {})", inviter, target, guild_id, is_new);

    let content = if is_new {
        format!(
            "<@{}> and <@{}> are now frens! 🫂 (<@{}> has {} fren{})",
            inviter,
            target,
            target,
            frens,
            if frens == 1 { "" } else { "s" }
        )
    } else {
        format!("<@{}> and <@{}> were already frens! 🫂", inviter, target)
    };
    close_request(ctx, component, content).await
}

pub async fn decline(
    ctx: &Context,
    component: &MessageComponentInteraction,
    inviter: UserId,
    target: UserId,
) -> Result<()> {
    if component.user.id != target {
        return refuse(ctx, component).await;
    }
    close_request(
        ctx,
        component,
        format!("<@{}> declined <@{}>'s fren request.", target, inviter),
    )
    .await
}
