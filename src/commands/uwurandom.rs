use anyhow::{Context as _, Result};
use rand::seq::IndexedRandom;
use rand::Rng;
use serenity::builder::CreateApplicationCommand;
use serenity::model::application::command::CommandOptionType;
use serenity::model::application::interaction::application_command::ApplicationCommandInteraction;
use serenity::model::application::interaction::InteractionResponseType;
use serenity::prelude::*;

use super::{integer_option, leaf_options};
use crate::utils::{truncate_chars, MESSAGE_LIMIT};

/// Length used when none is given
pub const DEFAULT_LENGTH: usize = 100;

const KEYSMASH_KEYS: &[char] = &['a', 's', 'd', 'f', 'g', 'h', 'j', 'k', 'l', ';'];
const FACES: &[&str] = &[
    ":3", "uwu", "owo", ">///<", "^w^", "rawr x3", ">w<", "x3", "*nuzzles*",
    "*pounces on you*", "*blushes*", "*sits on you*",
];
const SOUNDS: &[&str] = &["ny", "mr", "pu", "mrr", "ow"];

/// Random keysmash like `asjdhfkjl`
fn keysmash(rng: &mut impl Rng) -> String {
    let len = rng.random_range(6..16);
    (0..len)
        .filter_map(|_| KEYSMASH_KEYS.choose(rng).copied())
        .collect()
}

/// Stretched cat sound like `nyaaa` or `mrrrr`
fn cat_sound(rng: &mut impl Rng) -> String {
    let stem = SOUNDS.choose(rng).copied().unwrap_or("ny");
    let tail = match stem {
        "ny" => 'a',
        "pu" | "mrr" | "mr" => 'r',
        _ => 'o',
    };
    let stretch = rng.random_range(1..6);
    let mut sound = stem.to_string();
    sound.extend(std::iter::repeat(tail).take(stretch));
    if stem == "ow" {
        sound.push('w');
    }
    sound
}

/// Generates exactly `length` characters of uwu
pub fn generate(rng: &mut impl Rng, length: usize) -> String {
    let mut out = String::new();
    while out.chars().count() < length {
        let fragment = match rng.random_range(0..3) {
            0 => keysmash(rng),
            1 => cat_sound(rng),
            _ => FACES.choose(rng).copied().unwrap_or(":3").to_string(),
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&fragment);
    }
    truncate_chars(&out, length)
}

pub fn register(command: &mut CreateApplicationCommand) -> &mut CreateApplicationCommand {
    command
        .name("uwurandom")
        .description("Generate some random uwu")
        .create_option(|option| {
            option
                .name("length")
                .description("How many characters")
                .kind(CommandOptionType::Integer)
                .min_int_value(1)
                .max_int_value(MESSAGE_LIMIT as u64)
                .required(false)
        })
}

pub async fn run(ctx: &Context, command: &ApplicationCommandInteraction) -> Result<()> {
    let length = integer_option(leaf_options(command), "length")
        .map(|length| length.clamp(1, MESSAGE_LIMIT as i64) as usize)
        .unwrap_or(DEFAULT_LENGTH);
    let text = generate(&mut rand::rng(), length);

    command
        .create_interaction_response(&ctx.http, |r| {
            r.kind(InteractionResponseType::ChannelMessageWithSource)
                .interaction_response_data(|d| d.content(&text))
        })
        .await
        .context("failed to answer /uwurandom")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn output_has_requested_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for length in [1, 2, 13, 100, 2000] {
            assert_eq!(generate(&mut rng, length).chars().count(), length);
        }
    }

    #[test]
    fn same_seed_same_uwu() {
        let a = generate(&mut StdRng::seed_from_u64(42), 200);
        let b = generate(&mut StdRng::seed_from_u64(42), 200);
        assert_eq!(a, b);
    }

    #[test]
    fn keysmash_stays_on_the_home_row() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let smash = keysmash(&mut rng);
            assert!((6..16).contains(&smash.len()));
            assert!(smash.chars().all(|c| KEYSMASH_KEYS.contains(&c)));
        }
    }

    #[test]
    fn cat_sounds_are_stretched() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let sound = cat_sound(&mut rng);
            assert!(sound.len() >= 3, "{sound}");
        }
    }
}
