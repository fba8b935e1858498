use anyhow::{Context as _, Result};
use serenity::async_trait;
use serenity::model::channel::{Message, Reaction, ReactionType};
use serenity::model::id::{ChannelId, GuildId, MessageId};
use serenity::prelude::*;

use crate::app_config::CatstareConfig;
use crate::store::{BoardRecord, Store};
use crate::utils::{guild_emoji, truncate_chars};

/// Embed color of board posts
const BOARD_COLOR: u32 = 0xfcc419;
/// Embed description limit
const DESCRIPTION_LIMIT: usize = 4096;

/// What to do with a message's board post
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardAction {
    Post,
    Update,
    Remove,
    Nothing,
}

/// Decides the board change for a reaction count
pub fn decide(count: u64, threshold: u64, posted: Option<u64>) -> BoardAction {
    match posted {
        None if count >= threshold => BoardAction::Post,
        None => BoardAction::Nothing,
        Some(_) if count < threshold => BoardAction::Remove,
        Some(shown) if shown != count => BoardAction::Update,
        Some(_) => BoardAction::Nothing,
    }
}

/// Whether an emoji is the board emoji
pub fn is_board_emoji(emoji: &ReactionType, name: &str) -> bool {
    match emoji {
        ReactionType::Custom {
            name: Some(emoji_name),
            ..
        } => emoji_name == name,
        ReactionType::Unicode(unicode) => unicode == name,
        _ => false,
    }
}

/// Current count of the board emoji on a message
pub fn board_count(message: &Message, name: &str) -> u64 {
    message
        .reactions
        .iter()
        .filter(|reaction| is_board_emoji(&reaction.reaction_type, name))
        .map(|reaction| reaction.count)
        .sum()
}

/// Line shown above the board embed
pub fn board_line(emoji: &str, count: u64, channel_id: ChannelId) -> String {
    format!("{} **{}** | <#{}>", emoji, count, channel_id)
}

fn first_image(message: &Message) -> Option<String> {
    message
        .attachments
        .iter()
        .find(|attachment| {
            attachment
                .content_type
                .as_deref()
                .map(|kind| kind.starts_with("image/"))
                .unwrap_or(attachment.width.is_some())
        })
        .map(|attachment| attachment.url.clone())
}

/// Whether a reaction can affect the board at all
pub fn wants_reaction(config: &CatstareConfig, emoji: &ReactionType, channel_id: ChannelId) -> bool {
    match config.channel_id {
        Some(board_channel) => channel_id != board_channel && is_board_emoji(emoji, &config.emoji),
        None => false,
    }
}

/// Discord side of the board
#[async_trait]
pub trait Board: Sync {
    /// Posts a message to the board, returns the post id
    async fn post(&self, count: u64) -> Result<MessageId>;
    async fn update(&self, post: MessageId, count: u64) -> Result<()>;
    async fn remove(&self, post: MessageId) -> Result<()>;
}

/// Brings the board post of `message_id` in line with `count`
///
/// The store's board lock is held from the lookup until the record is saved,
/// so concurrent reactions on one message see each other's posts.
pub async fn sync_board<B: Board + ?Sized>(
    store: &Store,
    board: &B,
    message_id: MessageId,
    channel_id: ChannelId,
    count: u64,
    threshold: u64,
) -> Result<BoardAction> {
    let _board = store.lock_board().await;
    let existing = store.board_post(message_id).await?;
    let action = decide(count, threshold, existing.as_ref().map(|post| post.count));
    log::debug!("catstare on {}: {} -> {:?}", message_id, count, action);

    match (action, existing) {
        (BoardAction::Post, _) => {
            let board_message_id = board.post(count).await?;
            store
                .save_board_post(&BoardRecord {
                    message_id,
                    channel_id,
                    board_message_id,
                    count,
                })
                .await?;
        }
        (BoardAction::Update, Some(post)) => {
            board.update(post.board_message_id, count).await?;
            store.save_board_post(&BoardRecord { count, ..post }).await?;
        }
        (BoardAction::Remove, Some(post)) => {
            board.remove(post.board_message_id).await?;
            store.delete_board_post(message_id).await?;
        }
        _ => {}
    }
    Ok(action)
}

/// The board channel, showing one reacted message
struct DiscordBoard<'a> {
    ctx: &'a Context,
    message: &'a Message,
    guild_id: GuildId,
    board_channel: ChannelId,
    emoji: &'a str,
}

impl DiscordBoard<'_> {
    async fn line(&self, count: u64) -> Result<String> {
        let emoji = guild_emoji(self.ctx, self.guild_id, self.emoji).await?;
        Ok(board_line(&emoji, count, self.message.channel_id))
    }
}

#[async_trait]
impl Board for DiscordBoard<'_> {
    async fn post(&self, count: u64) -> Result<MessageId> {
        let message = self.message;
        let line = self.line(count).await?;
        let content = truncate_chars(&message.content, DESCRIPTION_LIMIT);
        let image = first_image(message);
        let post = self
            .board_channel
            .send_message(&self.ctx.http, |m| {
                m.content(line)
                    .allowed_mentions(|am| am.empty_parse())
                    .embed(|e| {
                        e.author(|a| a.name(message.author.tag()).icon_url(message.author.face()))
                            .description(content)
                            .field("Source", format!("[Jump to message]({})", message.link()), false)
                            .color(BOARD_COLOR)
                            .timestamp(message.timestamp);
                        if let Some(image) = image {
                            e.image(image);
                        }
                        e
                    })
            })
            .await
            .with_context(|| format!("failed to post {} to the board", message.id))?;
        Ok(post.id)
    }

    async fn update(&self, post: MessageId, count: u64) -> Result<()> {
        let line = self.line(count).await?;
        self.board_channel
            .edit_message(&self.ctx.http, post, |m| m.content(line))
            .await
            .with_context(|| format!("failed to update the board post of {}", self.message.id))?;
        Ok(())
    }

    async fn remove(&self, post: MessageId) -> Result<()> {
        self.board_channel
            .delete_message(&self.ctx.http, post)
            .await
            .with_context(|| format!("failed to remove the board post of {}", self.message.id))
    }
}

/// Keeps the board post of a reacted message in sync with its count
pub async fn handle_catstare(
    ctx: &Context,
    reaction: &Reaction,
    message: &Message,
    guild_id: GuildId,
    config: &CatstareConfig,
    store: &Store,
) -> Result<()> {
    let Some(board_channel) = config.channel_id else {
        return Ok(());
    };
    if !wants_reaction(config, &reaction.emoji, message.channel_id) {
        return Ok(());
    }

    let board = DiscordBoard {
        ctx,
        message,
        guild_id,
        board_channel,
        emoji: &config.emoji,
    };
    let count = board_count(message, &config.emoji);
    sync_board(
        store,
        &board,
        message.id,
        message.channel_id,
        count,
        config.threshold,
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::model::id::EmojiId;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn custom(name: &str) -> ReactionType {
        ReactionType::Custom {
            animated: false,
            id: EmojiId(1),
            name: Some(name.to_string()),
        }
    }

    #[test]
    fn reaching_the_threshold_posts() {
        assert_eq!(decide(3, 3, None), BoardAction::Post);
        assert_eq!(decide(2, 3, None), BoardAction::Nothing);
    }

    #[test]
    fn posted_messages_follow_the_count() {
        assert_eq!(decide(4, 3, Some(3)), BoardAction::Update);
        assert_eq!(decide(3, 3, Some(3)), BoardAction::Nothing);
        assert_eq!(decide(2, 3, Some(3)), BoardAction::Remove);
        assert_eq!(decide(0, 1, Some(1)), BoardAction::Remove);
    }

    #[test]
    fn only_the_board_emoji_counts() {
        assert!(is_board_emoji(&custom("catstare"), "catstare"));
        assert!(!is_board_emoji(&custom("catjam"), "catstare"));
        assert!(!is_board_emoji(
            &ReactionType::Custom {
                animated: false,
                id: EmojiId(1),
                name: None,
            },
            "catstare"
        ));
        assert!(is_board_emoji(&ReactionType::Unicode("😾".into()), "😾"));
    }

    #[test]
    fn board_line_mentions_the_channel() {
        assert_eq!(
            board_line("<:catstare:1>", 5, ChannelId(9)),
            "<:catstare:1> **5** | <#9>"
        );
    }

    fn config(channel: Option<ChannelId>) -> CatstareConfig {
        CatstareConfig {
            channel_id: channel,
            emoji: "catstare".to_string(),
            threshold: 3,
        }
    }

    #[test]
    fn reactions_outside_the_board_are_wanted() {
        let config = config(Some(ChannelId(100)));
        assert!(wants_reaction(&config, &custom("catstare"), ChannelId(1)));
        assert!(!wants_reaction(&config, &custom("catjam"), ChannelId(1)));
        assert!(!wants_reaction(&config, &custom("catstare"), ChannelId(100)));
    }

    #[test]
    fn disabled_board_wants_nothing() {
        assert!(!wants_reaction(&config(None), &custom("catstare"), ChannelId(1)));
    }

    #[derive(Default)]
    struct FakeBoard {
        posts: AtomicU64,
        updates: AtomicU64,
        removals: AtomicU64,
    }

    #[async_trait]
    impl Board for FakeBoard {
        async fn post(&self, _count: u64) -> Result<MessageId> {
            // give a concurrent reaction the chance to run in between
            tokio::task::yield_now().await;
            let n = self.posts.fetch_add(1, Ordering::SeqCst);
            Ok(MessageId(1000 + n))
        }

        async fn update(&self, _post: MessageId, _count: u64) -> Result<()> {
            tokio::task::yield_now().await;
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn remove(&self, _post: MessageId) -> Result<()> {
            self.removals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_reactions_post_once() {
        let store = Store::in_memory().unwrap();
        let board = FakeBoard::default();
        let (third, fourth) = tokio::join!(
            sync_board(&store, &board, MessageId(1), ChannelId(2), 3, 3),
            sync_board(&store, &board, MessageId(1), ChannelId(2), 4, 3),
        );
        assert_eq!(third.unwrap(), BoardAction::Post);
        assert_eq!(fourth.unwrap(), BoardAction::Update);
        assert_eq!(board.posts.load(Ordering::SeqCst), 1);
        assert_eq!(board.updates.load(Ordering::SeqCst), 1);

        let record = store.board_post(MessageId(1)).await.unwrap().unwrap();
        assert_eq!(record.board_message_id, MessageId(1000));
        assert_eq!(record.count, 4);
    }

    #[tokio::test]
    async fn dropping_below_the_threshold_removes_the_post() {
        let store = Store::in_memory().unwrap();
        let board = FakeBoard::default();
        sync_board(&store, &board, MessageId(1), ChannelId(2), 3, 3)
            .await
            .unwrap();
        let action = sync_board(&store, &board, MessageId(1), ChannelId(2), 2, 3)
            .await
            .unwrap();
        assert_eq!(action, BoardAction::Remove);
        assert_eq!(board.removals.load(Ordering::SeqCst), 1);
        assert_eq!(store.board_post(MessageId(1)).await.unwrap(), None);
    }
}
