use std::time::Instant;

use anyhow::{Context as _, Result};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::*;

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command.name("ping").description("Check that the bot is alive")
}

pub async fn run(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<()> {
    let start = Instant::now();
    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| d.content("🏓 Pong!"))
        })
        .await
        .context("failed to answer /ping")?;
    let elapsed = start.elapsed();

    command
        .edit_original_interaction_response(&ctx.http, |r| {
            r.content(format!("🏓 Pong!\nAPI latency: {} ms", elapsed.as_millis()))
        })
        .await
        .context("failed to edit the /ping answer")?;
    Ok(())
}
