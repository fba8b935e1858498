use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as _, Result};
use futures::lock::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serenity::model::channel::Message;
use serenity::model::id::ChannelId;
use serenity::prelude::*;

use crate::app_config::ChatConfig;
use crate::utils::{truncate_chars, MESSAGE_LIMIT};

/// How often the history is swept
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);
/// How long a message stays in the history
pub const MESSAGE_LIFETIME: Duration = Duration::from_secs(1800);
/// Messages kept per channel
pub const HISTORY_LIMIT: usize = 20;

const SYSTEM_PROMPT: &str = "You are a friendly cat who hangs out in a Discord channel called #chatbot. \
Keep answers short and casual. Messages are prefixed with the author's name.";

/// Chat completion message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    message: ChatMessage,
    at: Instant,
}

/// Recent chat messages per channel
#[derive(Clone, Default)]
pub struct ChatHistory {
    channels: Arc<Mutex<HashMap<ChannelId, VecDeque<Entry>>>>,
}

impl ChatHistory {
    /// Appends a message, dropping the oldest past the limit
    pub async fn push(&self, channel_id: ChannelId, message: ChatMessage, at: Instant) {
        let mut channels = self.channels.lock().await;
        let history = channels.entry(channel_id).or_default();
        history.push_back(Entry { message, at });
        while history.len() > HISTORY_LIMIT {
            history.pop_front();
        }
    }

    /// Messages of a channel, oldest first
    pub async fn messages(&self, channel_id: ChannelId) -> Vec<ChatMessage> {
        self.channels
            .lock()
            .await
            .get(&channel_id)
            .map(|history| history.iter().map(|entry| entry.message.clone()).collect())
            .unwrap_or_default()
    }

    /// Evicts entries older than `lifetime`, returns how many were removed
    pub async fn sweep(&self, now: Instant, lifetime: Duration) -> usize {
        let mut channels = self.channels.lock().await;
        let mut removed = 0;
        for history in channels.values_mut() {
            let before = history.len();
            history.retain(|entry| now.saturating_duration_since(entry.at) < lifetime);
            removed += before - history.len();
        }
        channels.retain(|_, history| !history.is_empty());
        removed
    }

    /// Sweeps the history every `interval` for the life of the process
    pub fn spawn_sweeper(&self, interval: Duration, lifetime: Duration) {
        let history = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = history.sweep(Instant::now(), lifetime).await;
                log::debug!("swept {} chat messages", removed);
            }
        });
    }
}

/// Removes user, role and channel mentions
pub fn strip_mentions(content: &str) -> String {
    static MENTION: OnceLock<Regex> = OnceLock::new();
    let mention =
        MENTION.get_or_init(|| Regex::new(r"<(?:@[!&]?|#)\d+>").expect("mention pattern is valid"));
    let stripped = mention.replace_all(content, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// Extracts the answer of a chat completion
pub fn parse_completion(body: &str) -> Result<String> {
    let response: CompletionResponse =
        serde_json::from_str(body).context("chat completion response is malformed")?;
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| anyhow!("chat completion has no answer"))
}

/// Asks the chat completion endpoint for the next message
async fn complete(
    client: &reqwest::Client,
    config: &ChatConfig,
    api_url: &str,
    history: Vec<ChatMessage>,
) -> Result<String> {
    let mut messages = vec![ChatMessage::new("system", SYSTEM_PROMPT)];
    messages.extend(history);

    let mut request = client
        .post(format!("{}/chat/completions", api_url.trim_end_matches('/')))
        .json(&CompletionRequest {
            model: &config.model,
            messages,
        });
    if let Some(key) = &config.api_key {
        request = request.bearer_auth(key);
    }
    let body = request
        .send()
        .await
        .context("chat completion request failed")?
        .error_for_status()
        .context("chat completion endpoint returned an error")?
        .text()
        .await
        .context("failed to read the chat completion")?;
    parse_completion(&body)
}

/// Records a `#chatbot` message and answers it when an endpoint is configured
pub async fn handle_chat(
    ctx: &Context,
    msg: &Message,
    history: &ChatHistory,
    client: &reqwest::Client,
    config: &ChatConfig,
) -> Result<()> {
    let content = strip_mentions(&msg.content);
    if content.is_empty() {
        return Ok(());
    }
    history
        .push(
            msg.channel_id,
            ChatMessage::new("user", format!("{}: {}", msg.author.name, content)),
            Instant::now(),
        )
        .await;

    let Some(api_url) = &config.api_url else {
        return Ok(());
    };

    if let Err(why) = msg.channel_id.broadcast_typing(&ctx.http).await {
        log::debug!("failed to show typing in {}: {:?}", msg.channel_id, why);
    }
    let answer = complete(client, config, api_url, history.messages(msg.channel_id).await).await?;
    let answer = truncate_chars(&answer, MESSAGE_LIMIT);

    msg.reply(ctx, &answer)
        .await
        .context("failed to answer in #chatbot")?;
    history
        .push(
            msg.channel_id,
            ChatMessage::new("assistant", answer),
            Instant::now(),
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mentions_are_removed() {
        assert_eq!(
            strip_mentions("<@123> hi <@!456> in <#789> cc <@&10>"),
            "hi in cc"
        );
        assert_eq!(strip_mentions("<@123>"), "");
    }

    #[test]
    fn completion_answer_is_extracted() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":" meow "}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "meow");
    }

    #[test]
    fn empty_completion_is_an_error() {
        assert!(parse_completion(r#"{"choices":[]}"#).is_err());
        assert!(parse_completion("not json").is_err());
    }

    #[tokio::test]
    async fn history_is_capped() {
        let history = ChatHistory::default();
        let now = Instant::now();
        for i in 0..HISTORY_LIMIT + 5 {
            history
                .push(ChannelId(1), ChatMessage::new("user", i.to_string()), now)
                .await;
        }
        let messages = history.messages(ChannelId(1)).await;
        assert_eq!(messages.len(), HISTORY_LIMIT);
        assert_eq!(messages[0].content, "5");
    }

    #[tokio::test]
    async fn sweep_evicts_old_messages() {
        let history = ChatHistory::default();
        let start = Instant::now();
        history
            .push(ChannelId(1), ChatMessage::new("user", "old"), start)
            .await;
        history
            .push(ChannelId(2), ChatMessage::new("user", "old"), start)
            .await;
        let later = start + Duration::from_secs(1000);
        history
            .push(ChannelId(1), ChatMessage::new("user", "new"), later)
            .await;

        let removed = history
            .sweep(start + MESSAGE_LIFETIME + Duration::from_secs(1), MESSAGE_LIFETIME)
            .await;
        assert_eq!(removed, 2);
        assert_eq!(
            history.messages(ChannelId(1)).await,
            vec![ChatMessage::new("user", "new")]
        );
        assert!(history.messages(ChannelId(2)).await.is_empty());
    }
}
