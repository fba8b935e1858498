use anyhow::{Context as _, Result};
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use serenity::prelude::*;

use crate::utils::truncate_chars;

/// Embed color of logged direct messages
const DM_COLOR: u32 = 0x5c7cfa;
/// Embed description limit
const DESCRIPTION_LIMIT: usize = 4096;

/// Body of a logged direct message
pub fn describe_dm(content: &str, attachment_urls: &[String]) -> String {
    let mut description = if content.trim().is_empty() {
        "*no text*".to_string()
    } else {
        content.to_string()
    };
    for url in attachment_urls {
        description.push('\n');
        description.push_str(url);
    }
    truncate_chars(&description, DESCRIPTION_LIMIT)
}

/// Forwards a direct message to the DM log channel
pub async fn log_dm(ctx: &Context, msg: &Message, log_channel: ChannelId) -> Result<()> {
    let urls = msg
        .attachments
        .iter()
        .map(|attachment| attachment.url.clone())
        .collect::<Vec<_>>();
    let description = describe_dm(&msg.content, &urls);

    log_channel
        .send_message(&ctx.http, |m| {
            m.allowed_mentions(|am| am.empty_parse()).embed(|e| {
                e.author(|a| a.name(msg.author.tag()).icon_url(msg.author.face()))
                    .title("Direct message")
                    .description(description)
                    .field("User", format!("<@{}> ({})", msg.author.id, msg.author.id), false)
                    .color(DM_COLOR)
                    .timestamp(msg.timestamp)
            })
        })
        .await
        .with_context(|| format!("failed to log the DM from {}", msg.author.id))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dm_is_marked() {
        assert_eq!(describe_dm("  ", &[]), "*no text*");
    }

    #[test]
    fn attachments_are_listed() {
        let urls = vec![
            "https://cdn.discordapp.com/a.png".to_string(),
            "https://cdn.discordapp.com/b.txt".to_string(),
        ];
        assert_eq!(
            describe_dm("look", &urls),
            "look\nhttps://cdn.discordapp.com/a.png\nhttps://cdn.discordapp.com/b.txt"
        );
    }
}
