use anyhow::{Context as _, Result};
use serenity::model::guild::Emoji;
use serenity::model::id::GuildId;
use serenity::prelude::*;

/// Embed color of successful actions
pub const SUCCESS_COLOR: u32 = 0x51cf66;

/// Discord's message length limit
pub const MESSAGE_LIMIT: usize = 2000;

/// Renders a guild emoji by name, `[name]` when the guild has none
pub fn render_emoji<'a>(emojis: impl IntoIterator<Item = &'a Emoji>, name: &str) -> String {
    emojis
        .into_iter()
        .find(|emoji| emoji.name == name)
        .map(|emoji| {
            if emoji.animated {
                format!("<a:{}:{}>", name, emoji.id)
            } else {
                format!("<:{}:{}>", name, emoji.id)
            }
        })
        .unwrap_or_else(|| format!("[{}]", name))
}

/// Fetches and renders a guild emoji by name
pub async fn guild_emoji(ctx: &Context, guild_id: GuildId, name: &str) -> Result<String> {
    let emojis = guild_id
        .emojis(&ctx.http)
        .await
        .with_context(|| format!("failed to fetch emojis of guild {}", guild_id))?;
    Ok(render_emoji(&emojis, name))
}

/// Cuts text to at most `limit` characters
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 5), "hi");
        assert_eq!(truncate_chars("", 0), "");
    }

    #[test]
    fn missing_emoji_falls_back_to_name() {
        assert_eq!(render_emoji(&Vec::<Emoji>::new(), "catstare"), "[catstare]");
    }
}
