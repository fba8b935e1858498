use anyhow::{anyhow, Context as _, Result};
use serde_json::Value;
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::*;

use crate::error_reporter::UserError;
use crate::utils::truncate_chars;

/// Language everything is translated into
const TARGET_LANGUAGE: &str = "en";
/// Embed description limit
const DESCRIPTION_LIMIT: usize = 4096;

/// Result of a translation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    /// Detected source language
    pub source_language: String,
    pub text: String,
}

/// Parses a `translate_a/single` response
///
/// The body is a nested array: the first element holds the translated
/// segments (`[translated, original, ...]`), the third the detected language.
pub fn parse_translation(body: &Value) -> Result<Translation> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("translation response has no segments: {}", body))?;
    let text = segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect::<String>();
    let source_language = body
        .get(2)
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    Ok(Translation {
        source_language,
        text,
    })
}

/// Asks the translation endpoint for an English version of `text`
pub async fn translate(client: &reqwest::Client, api_url: &str, text: &str) -> Result<Translation> {
    let body = client
        .get(api_url)
        .query(&[
            ("client", "gtx"),
            ("sl", "auto"),
            ("tl", TARGET_LANGUAGE),
            ("dt", "t"),
            ("q", text),
        ])
        .send()
        .await
        .context("translation request failed")?
        .error_for_status()
        .context("translation endpoint returned an error")?
        .json::<Value>()
        .await
        .context("translation response is not JSON")?;
    parse_translation(&body)
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command.name("Translate").kind(CommandType::Message)
}

pub async fn run(
    ctx: &Context,
    command: &ApplicationCommandInteraction,
    client: &reqwest::Client,
    api_url: &str,
) -> Result<()> {
    let target = command
        .data
        .target_id
        .map(|target| target.to_message_id())
        .and_then(|id| command.data.resolved.messages.get(&id))
        .or_else(|| command.data.resolved.messages.values().next())
        .context("context menu invocation without a target message")?;
    if target.content.trim().is_empty() {
        return Err(UserError::new("That message has no text to translate.").into());
    }

    // translation can outlast the 3 second response window
    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::DeferredChannelMessageWithSource)
                .interaction_response_data(|d| d.ephemeral(true))
        })
        .await
        .context("failed to defer Translate")?;

    let translation = translate(client, api_url, &target.content).await?;
    command
        .edit_original_interaction_response(&ctx.http, |r| {
            r.embed(|e| {
                e.title(format!("Translated from {}", translation.source_language))
                    .description(truncate_chars(&translation.text, DESCRIPTION_LIMIT))
                    .url(target.link())
            })
        })
        .await
        .context("failed to send the translation")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn joins_segments() {
        let body = json!([
            [["Hello, ", "Hola, ", null, null, 10], ["world", "mundo", null, null, 10]],
            null,
            "es"
        ]);
        assert_eq!(
            parse_translation(&body).unwrap(),
            Translation {
                source_language: "es".to_string(),
                text: "Hello, world".to_string(),
            }
        );
    }

    #[test]
    fn missing_language_is_unknown() {
        let body = json!([[["hi", "hi"]]]);
        assert_eq!(parse_translation(&body).unwrap().source_language, "unknown");
    }

    #[test]
    fn rejects_unexpected_shapes() {
        assert!(parse_translation(&json!({"error": "quota"})).is_err());
    }
}
