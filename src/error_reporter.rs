use std::sync::Arc;

use anyhow::{Context as _, Error, Result};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::model::channel::{Message, Reaction};
use serenity::model::id::{ChannelId, GuildId, UserId};
use serenity::model::Timestamp;
use thiserror::Error;

use crate::dispatch::Reporter;

/// Generic acknowledgement shown to users when a handler fails
pub const GENERIC_FAILURE: &str = "Something went wrong while running that. The error has been reported.";

/// Embed color of error reports
const REPORT_COLOR: u32 = 0xff6b6b;

/// Discord's embed description limit
const DESCRIPTION_LIMIT: usize = 4096;

/// Discord's embed title limit
const TITLE_LIMIT: usize = 256;

/// Failure whose message is meant for the user
#[derive(Error, Debug)]
#[error("{0}")]
pub struct UserError(pub String);

impl UserError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// The event a failure came from
pub enum Origin<'a> {
    Command(&'a ApplicationCommandInteraction),
    Component(&'a MessageComponentInteraction),
    Message(&'a Message),
    Reaction(&'a Reaction),
}

/// Metadata about an origin, included in reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginSummary {
    pub kind: &'static str,
    pub label: String,
    pub user: Option<UserId>,
    pub channel: ChannelId,
    pub guild: Option<GuildId>,
}

impl Origin<'_> {
    pub fn summary(&self) -> OriginSummary {
        match self {
            Origin::Command(command) => OriginSummary {
                kind: "command",
                label: format!("/{}", command.data.name),
                user: Some(command.user.id),
                channel: command.channel_id,
                guild: command.guild_id,
            },
            Origin::Component(component) => OriginSummary {
                kind: "button",
                label: component.data.custom_id.clone(),
                user: Some(component.user.id),
                channel: component.channel_id,
                guild: component.guild_id,
            },
            Origin::Message(message) => OriginSummary {
                kind: "message",
                label: format!("message {}", message.id),
                user: Some(message.author.id),
                channel: message.channel_id,
                guild: message.guild_id,
            },
            Origin::Reaction(reaction) => OriginSummary {
                kind: "reaction",
                label: format!("{} on message {}", reaction.emoji, reaction.message_id),
                user: reaction.user_id,
                channel: reaction.channel_id,
                guild: reaction.guild_id,
            },
        }
    }
}

/// Text shown to the user for a failure
pub fn user_message(error: &Error) -> String {
    match error.downcast_ref::<UserError>() {
        Some(user_error) => user_error.0.clone(),
        None => GENERIC_FAILURE.to_string(),
    }
}

/// Formatted log channel report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
}

/// Builds the operator report for a failure
pub fn format_report(error: &Error, summary: &OriginSummary) -> Report {
    let mut description = format!("```\n{:?}\n```", error);
    if description.len() > DESCRIPTION_LIMIT {
        let mut cut = DESCRIPTION_LIMIT - 8;
        while !description.is_char_boundary(cut) {
            cut -= 1;
        }
        description.truncate(cut);
        description.push_str("\n…\n```");
    }

    let mut fields = vec![
        ("Origin".to_string(), format!("{} `{}`", summary.kind, summary.label)),
        ("Channel".to_string(), format!("<#{}>", summary.channel)),
    ];
    if let Some(user) = summary.user {
        fields.push(("User".to_string(), format!("<@{}> ({})", user, user)));
    }
    if let Some(guild) = summary.guild {
        fields.push(("Guild".to_string(), guild.to_string()));
    }

    Report {
        title: format!("Error: {}", error).chars().take(TITLE_LIMIT).collect(),
        description,
        fields,
    }
}

/// Posts failures to the operator log channel and acknowledges interactions
pub struct DiscordReporter {
    http: Arc<Http>,
    log_channel: ChannelId,
}

impl DiscordReporter {
    pub fn new(http: Arc<Http>, log_channel: ChannelId) -> Self {
        Self { http, log_channel }
    }

    /// Ephemeral failure notice, falling back to a followup when already acknowledged
    async fn respond_with_error(&self, error: &Error, origin: &Origin<'_>) -> Result<()> {
        let content = user_message(error);
        match origin {
            Origin::Command(command) => {
                let created = command
                    .create_interaction_response(&self.http, |r| {
                        r.kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|d| d.content(&content).ephemeral(true))
                    })
                    .await;
                if created.is_err() {
                    command
                        .create_followup_message(&self.http, |f| f.content(&content).ephemeral(true))
                        .await
                        .context("failed to send the failure followup")?;
                }
            }
            Origin::Component(component) => {
                let created = component
                    .create_interaction_response(&self.http, |r| {
                        r.kind(InteractionResponseType::ChannelMessageWithSource)
                            .interaction_response_data(|d| d.content(&content).ephemeral(true))
                    })
                    .await;
                if created.is_err() {
                    component
                        .create_followup_message(&self.http, |f| f.content(&content).ephemeral(true))
                        .await
                        .context("failed to send the failure followup")?;
                }
            }
            // plain messages and reactions have no reply surface
            Origin::Message(_) | Origin::Reaction(_) => {}
        }
        Ok(())
    }

    async fn log_error_to_discord(&self, error: &Error, origin: &Origin<'_>) -> Result<()> {
        let report = format_report(error, &origin.summary());
        self.log_channel
            .send_message(&self.http, |m| {
                m.embed(|e| {
                    e.title(&report.title)
                        .description(&report.description)
                        .color(REPORT_COLOR)
                        .timestamp(Timestamp::now());
                    for (name, value) in &report.fields {
                        e.field(name, value, true);
                    }
                    e
                })
            })
            .await
            .with_context(|| format!("failed to post to log channel {}", self.log_channel))?;
        Ok(())
    }
}

#[async_trait]
impl<'a> Reporter<Origin<'a>> for DiscordReporter {
    async fn report(&self, error: &Error, origin: &Origin<'a>) {
        let (responded, logged) = futures::join!(
            self.respond_with_error(error, origin),
            self.log_error_to_discord(error, origin)
        );
        if let Err(why) = responded {
            log::error!("failed to notify the user: {:?}", why);
        }
        if let Err(why) = logged {
            log::error!("failed to report the error: {:?}", why);
        }
    }
}
