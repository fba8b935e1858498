use anyhow::{Context as _, Result};
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::*;
use thiserror::Error;

use super::{bool_option, leaf_options, string_option};
use crate::error_reporter::UserError;
use crate::utils::MESSAGE_LIMIT;

/// Ends every encoded byte
const SEPARATOR: &str = "👉👈";
/// Encodes the zero byte
const ZERO: &str = "❤️";
/// Symbols by value, largest first
const SYMBOLS: [(u8, char); 5] = [(200, '🫂'), (50, '💖'), (10, '✨'), (5, '🥺'), (1, ',')];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BottomError {
    #[error("`{0}` is not a bottom character")]
    UnknownSymbol(char),
    #[error("a group adds up to {0}, more than a byte can hold")]
    Overflow(u32),
    #[error("the decoded bytes are not valid UTF-8")]
    InvalidUtf8,
}

/// Encodes text as bottom
pub fn encode(text: &str) -> String {
    let mut out = String::new();
    for byte in text.bytes() {
        if byte == 0 {
            out.push_str(ZERO);
        }
        let mut rest = byte;
        while rest > 0 {
            let (value, symbol) = SYMBOLS
                .iter()
                .find(|(value, _)| *value <= rest)
                .copied()
                .unwrap_or((1, ','));
            out.push(symbol);
            rest -= value;
        }
        out.push_str(SEPARATOR);
    }
    out
}

fn decode_group(group: &str) -> Result<u8, BottomError> {
    let mut sum: u32 = 0;
    for c in group.chars() {
        let value = match c {
            '❤' | '\u{fe0f}' => 0,
            c => SYMBOLS
                .iter()
                .find(|(_, symbol)| *symbol == c)
                .map(|(value, _)| *value as u32)
                .ok_or(BottomError::UnknownSymbol(c))?,
        };
        sum += value;
    }
    u8::try_from(sum).map_err(|_| BottomError::Overflow(sum))
}

/// Decodes bottom back into text
pub fn decode(input: &str) -> Result<String, BottomError> {
    let input = input.trim();
    let input = input.strip_suffix(SEPARATOR).unwrap_or(input);
    if input.is_empty() {
        return Ok(String::new());
    }
    let bytes = input
        .split(SEPARATOR)
        .map(decode_group)
        .collect::<Result<Vec<_>, _>>()?;
    String::from_utf8(bytes).map_err(|_| BottomError::InvalidUtf8)
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("bottom")
        .description("Translate text to and from bottom")
        .create_option(|option| {
            option
                .name("text")
                .description("Text to translate")
                .kind(CommandOptionType::String)
                .required(true)
        })
        .create_option(|option| {
            option
                .name("decode")
                .description("Decode bottom instead of encoding")
                .kind(CommandOptionType::Boolean)
                .required(false)
        })
}

pub async fn run(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<()> {
    let options = leaf_options(command);
    let text = string_option(options, "text").unwrap_or_default();
    let output = if bool_option(options, "decode").unwrap_or(false) {
        decode(&text).map_err(|why| UserError::new(format!("Couldn't decode that: {}.", why)))?
    } else {
        encode(&text)
    };
    if output.is_empty() {
        return Err(UserError::new("There is nothing to translate.").into());
    }
    if output.chars().count() > MESSAGE_LIMIT {
        return Err(UserError::new("The result is too long for Discord.").into());
    }

    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| {
                    d.content(&output).allowed_mentions(|am| am.empty_parse())
                })
        })
        .await
        .context("failed to answer /bottom")?;
    Ok(())
}
