use std::path::Path;

use anyhow::{Context as _, Result};
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

/// Log configuration file picked up from the working directory
const LOG_CONFIG_FILE: &str = "log4rs.yml";

/// Crates whose chatter is capped at `warn`
const NOISY_CRATES: [&str; 5] = ["serenity", "tracing", "hyper", "rustls", "reqwest"];

/// Initializes the logger
pub fn init(level: LevelFilter) -> Result<()> {
    // Prefer the configuration file when one is deployed
    if Path::new(LOG_CONFIG_FILE).exists() {
        log4rs::init_file(LOG_CONFIG_FILE, Default::default())
            .with_context(|| format!("failed to load {}", LOG_CONFIG_FILE))?;
        return Ok(());
    }

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}",
        )))
        .build();

    let config = NOISY_CRATES
        .iter()
        .fold(
            Config::builder().appender(Appender::builder().build("stdout", Box::new(stdout))),
            |builder, name| builder.logger(Logger::builder().build(*name, LevelFilter::Warn)),
        )
        .build(Root::builder().appender("stdout").build(level))
        .context("invalid log configuration")?;

    log4rs::init_config(config).context("failed to install the logger")?;
    Ok(())
}
