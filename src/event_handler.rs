use anyhow::{Context as _, Result};
use futures::future::join_all;
use serenity::async_trait;
use serenity::model::application::command::CommandType;
use serenity::model::application::component::ComponentType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::message_component::MessageComponentInteraction;
use serenity::model::application::interaction::Interaction;
use serenity::model::channel::{Channel, ChannelType, Message, Reaction};
use serenity::model::gateway::Ready;
use serenity::prelude::*;

use crate::app_config::AppConfig;
use crate::button::handle_button;
use crate::catstare_board::{handle_catstare, wants_reaction};
use crate::chat::{handle_chat, ChatHistory};
use crate::commands::{self, bottom, fren, ping, presence, say, translate, uwurandom};
use crate::dispatch::{guard, Outcome};
use crate::dm_log::log_dm;
use crate::error_reporter::{DiscordReporter, Origin};
use crate::permissions::{everyone_can_view_channel, when_public};
use crate::router::{ChannelKind, CommandRoute, ContextMenuRoute, MessageFacts, MessageRoute};
use crate::startup::{invite_permissions, invite_url, ReadySignal};
use crate::store::Store;

/// Classifies where a message was posted
async fn message_facts(ctx: &Context, msg: &Message) -> Result<MessageFacts> {
    let channel = if msg.guild_id.is_none() {
        ChannelKind::Direct
    } else {
        match msg
            .channel_id
            .to_channel(ctx)
            .await
            .with_context(|| format!("failed to fetch channel {}", msg.channel_id))?
        {
            Channel::Guild(channel) if channel.kind == ChannelType::Text => {
                ChannelKind::GuildText(channel.name)
            }
            Channel::Private(_) => ChannelKind::Direct,
            _ => ChannelKind::Other,
        }
    };
    Ok(MessageFacts {
        channel,
        is_bot: msg.author.bot,
        is_webhook: msg.webhook_id.is_some(),
    })
}

/// Event listener holding the route table
pub struct Handler {
    /// Settings
    app_config: AppConfig,
    /// Board and fren records
    store: Store,
    /// Recent `#chatbot` messages
    chat: ChatHistory,
    /// Client for third party APIs
    http_client: reqwest::Client,
    /// Signals the first `ready`
    ready: ReadySignal,
}

impl Handler {
    /// Constructor
    pub fn new(
        app_config: AppConfig,
        store: Store,
        chat: ChatHistory,
        ready: ReadySignal,
    ) -> Self {
        Self {
            app_config,
            store,
            chat,
            http_client: reqwest::Client::new(),
            ready,
        }
    }

    fn reporter(&self, ctx: &Context) -> DiscordReporter {
        DiscordReporter::new(ctx.http.clone(), self.app_config.log_channel_id)
    }

    async fn run_command(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        route: CommandRoute,
    ) -> Result<()> {
        match route {
            CommandRoute::Ping => ping::run(ctx, command).await,
            CommandRoute::Say => say::run(ctx, command).await,
            CommandRoute::Presence => presence::run(ctx, command).await,
            CommandRoute::Bottom => bottom::run(ctx, command).await,
            CommandRoute::UwuRandom => uwurandom::run(ctx, command).await,
            CommandRoute::FrenAdd => fren::add(ctx, command).await,
        }
    }

    async fn run_context_menu(
        &self,
        ctx: &Context,
        command: &ApplicationCommandInteraction,
        route: ContextMenuRoute,
    ) -> Result<()> {
        match route {
            ContextMenuRoute::Translate => {
                translate::run(
                    ctx,
                    command,
                    &self.http_client,
                    &self.app_config.translate_api_url,
                )
                .await
            }
        }
    }

    /// Slash commands and context menus
    async fn on_command(&self, ctx: &Context, command: &ApplicationCommandInteraction) {
        let reporter = self.reporter(ctx);
        let origin = Origin::Command(command);
        match command.data.kind {
            CommandType::ChatInput => {
                let Some(route) =
                    CommandRoute::resolve(&command.data.name, commands::subcommand(command))
                else {
                    log::debug!("ignoring unknown command /{}", command.data.name);
                    return;
                };
                guard(
                    route.name(),
                    &origin,
                    &reporter,
                    self.run_command(ctx, command, route),
                )
                .await;
            }
            CommandType::Message => {
                let Some(route) = ContextMenuRoute::resolve(&command.data.name) else {
                    log::debug!("ignoring unknown context menu {}", command.data.name);
                    return;
                };
                guard(
                    route.name(),
                    &origin,
                    &reporter,
                    self.run_context_menu(ctx, command, route),
                )
                .await;
            }
            _ => {}
        }
    }

    async fn on_button(&self, ctx: &Context, component: &MessageComponentInteraction) {
        let reporter = self.reporter(ctx);
        guard(
            "button",
            &Origin::Component(component),
            &reporter,
            handle_button(ctx, component, &self.store, &self.app_config),
        )
        .await;
    }

    async fn on_message_route(
        &self,
        ctx: &Context,
        msg: &Message,
        route: MessageRoute,
        reporter: &DiscordReporter,
    ) {
        let origin = Origin::Message(msg);
        match route {
            MessageRoute::Chat => {
                guard(
                    "chat",
                    &origin,
                    reporter,
                    handle_chat(ctx, msg, &self.chat, &self.http_client, &self.app_config.chat),
                )
                .await;
            }
            MessageRoute::DirectMessage => {
                guard(
                    "dm log",
                    &origin,
                    reporter,
                    log_dm(ctx, msg, self.app_config.dm_log_channel_id),
                )
                .await;
            }
        }
    }

    /// Re-fetches a reacted message and forwards public ones to the board
    async fn catstare(&self, ctx: &Context, reaction: &Reaction) -> Result<()> {
        let Some(guild_id) = reaction.guild_id else {
            return Ok(());
        };
        let config = &self.app_config.catstare;
        if !wants_reaction(config, &reaction.emoji, reaction.channel_id) {
            return Ok(());
        }

        let handled = when_public(
            everyone_can_view_channel(ctx, guild_id, reaction.channel_id),
            async {
                // the cached copy may be partial or stale
                let message = reaction
                    .channel_id
                    .message(&ctx.http, reaction.message_id)
                    .await
                    .with_context(|| {
                        format!("failed to fetch reacted message {}", reaction.message_id)
                    })?;
                handle_catstare(ctx, reaction, &message, guild_id, config, &self.store).await
            },
        )
        .await?;
        if handled.is_none() {
            log::debug!("ignoring reaction in private channel {}", reaction.channel_id);
        }
        Ok(())
    }

    async fn on_reaction(&self, ctx: &Context, reaction: &Reaction, label: &str) {
        let reporter = self.reporter(ctx);
        guard(
            label,
            &Origin::Reaction(reaction),
            &reporter,
            self.catstare(ctx, reaction),
        )
        .await;
    }
}

#[async_trait]
impl EventHandler for Handler {
    /// Called whenever the gateway session is ready, including after reconnects
    async fn ready(&self, ctx: Context, ready: Ready) {
        if !self.ready.fire().await {
            log::info!("Discord session resumed as {}", ready.user.tag());
            return;
        }

        log::info!("Discord bot ready as {}!", ready.user.tag());
        log::info!("{}", invite_url(ready.user.id, invite_permissions()));
        if !self.app_config.app_env.is_development() {
            log::warn!("Running in production mode!");
        }

        match commands::register_all(&ctx).await {
            Ok(registered) => log::info!("registered {} application commands", registered.len()),
            Err(why) => log::error!("{:?}", why),
        }
    }

    /// Called for every interaction
    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::ApplicationCommand(command) => self.on_command(&ctx, &command).await,
            Interaction::MessageComponent(component)
                if component.data.component_type == ComponentType::Button =>
            {
                self.on_button(&ctx, &component).await
            }
            _ => {}
        }
    }

    /// Called for every message; the chat and DM listeners run independently
    async fn message(&self, ctx: Context, msg: Message) {
        let reporter = self.reporter(&ctx);
        let Outcome::Handled(facts) = guard(
            "message",
            &Origin::Message(&msg),
            &reporter,
            message_facts(&ctx, &msg),
        )
        .await
        else {
            return;
        };

        join_all(
            MessageRoute::matching(&facts)
                .into_iter()
                .map(|route| self.on_message_route(&ctx, &msg, route, &reporter)),
        )
        .await;
    }

    async fn reaction_add(&self, ctx: Context, add_reaction: Reaction) {
        self.on_reaction(&ctx, &add_reaction, "catstare add").await;
    }

    async fn reaction_remove(&self, ctx: Context, removed_reaction: Reaction) {
        self.on_reaction(&ctx, &removed_reaction, "catstare remove").await;
    }
}
