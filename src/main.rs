use std::process;

use anyhow::{Context as _, Result};
use log::LevelFilter;
use serenity::prelude::*;
use tokio::task::JoinHandle;

mod app_config;
mod button;
mod catstare_board;
mod chat;
mod commands;
mod dispatch;
mod dm_log;
mod error_reporter;
mod event_handler;
mod health;
mod logging;
mod permissions;
mod router;
mod startup;
mod store;
mod utils;

use app_config::AppConfig;
use chat::{ChatHistory, MESSAGE_LIFETIME, SWEEP_INTERVAL};
use event_handler::Handler;
use startup::{gateway_intents, ReadySignal, Sequencer, Stage, MESSAGE_CACHE_SIZE};
use store::Store;

type Gateway = JoinHandle<serenity::Result<()>>;

/// Logs the failure and exits with a non-zero status
fn abort(sequencer: &mut Sequencer, why: anyhow::Error) -> ! {
    log::error!("startup failed during {}: {:?}", sequencer.stage(), why);
    sequencer.advance(Stage::Aborted);
    process::exit(1);
}

/// Waits for a gateway task that should not have stopped
async fn gateway_stopped(gateway: &mut Gateway) -> anyhow::Error {
    match gateway.await {
        Ok(Ok(())) => anyhow::anyhow!("Discord gateway closed"),
        Ok(Err(why)) => anyhow::Error::new(why).context("Discord gateway failed"),
        Err(why) => anyhow::Error::new(why).context("Discord gateway task panicked"),
    }
}

async fn build_client(app_config: &AppConfig, handler: Handler) -> Result<Client> {
    Client::builder(&app_config.discord_token, gateway_intents())
        .cache_settings(|settings| settings.max_messages(MESSAGE_CACHE_SIZE))
        .event_handler(handler)
        .await
        .context("Error creating client")
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    if let Err(why) = logging::init(LevelFilter::Info) {
        eprintln!("failed to initialize logging: {:?}", why);
        process::exit(1);
    }

    let mut sequencer = Sequencer::default();

    // Settings
    let app_config = match AppConfig::load_config() {
        Ok(config) => config,
        Err(why) => abort(&mut sequencer, why.into()),
    };
    sequencer.advance(Stage::Configured);

    let store = match Store::open(&app_config.data_dir) {
        Ok(store) => store,
        Err(why) => abort(&mut sequencer, why),
    };

    let chat = ChatHistory::default();
    chat.spawn_sweeper(SWEEP_INTERVAL, MESSAGE_LIFETIME);

    let port = app_config.port;
    let (ready, ready_rx) = ReadySignal::new();
    let handler = Handler::new(app_config.clone(), store, chat, ready);

    // The builder registers the listeners as it builds
    let mut client = match build_client(&app_config, handler).await {
        Ok(client) => client,
        Err(why) => abort(&mut sequencer, why),
    };
    sequencer.advance(Stage::ClientBuilt);
    sequencer.advance(Stage::ListenersRegistered);

    let mut gateway: Gateway = tokio::spawn(async move { client.start().await });

    tokio::select! {
        ready = ready_rx => {
            if ready.is_err() {
                abort(&mut sequencer, anyhow::anyhow!("event handler dropped before ready"));
            }
        }
        why = gateway_stopped(&mut gateway) => abort(&mut sequencer, why),
    }
    sequencer.advance(Stage::Authenticated);

    let listener = match health::bind(port).await {
        Ok(listener) => listener,
        Err(why) => abort(&mut sequencer, why),
    };
    log::info!("Started health check server at http://0.0.0.0:{}/health", port);
    sequencer.advance(Stage::Serving);

    tokio::select! {
        result = health::serve(listener) => {
            if let Err(why) = result {
                log::error!("{:?}", why);
            }
        }
        why = gateway_stopped(&mut gateway) => log::error!("{:?}", why),
    }
    process::exit(1);
}
