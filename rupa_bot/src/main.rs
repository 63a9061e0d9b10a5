mod bot;
mod callbacks;
mod commands;
mod dependencies;
mod job;
mod telegram;
mod transforms;

use std::env;
use std::sync::Arc;

use anyhow::anyhow;
use rupa_core::config::RupaConfig;
use rupa_core::files::{FileStore, cipher::FileCipher, cipher::generate_key, vault::FileVault};
use rupa_core::hub::Hub;
use teloxide::prelude::*;

use crate::bot::handler_tree::handler_tree;
use crate::dependencies::BotDependencies;
use crate::job::job_scheduler::schedule_jobs;
use crate::telegram::TelegramMessenger;
use crate::transforms::ExternalTransformer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    log::info!("Starting rupa_bot...");

    let config = RupaConfig::from_env()?;

    let secret = match env::var("FILE_ENCRYPTION_KEY") {
        Ok(secret) if !secret.trim().is_empty() => secret,
        _ => {
            if let Ok(key) = generate_key() {
                log::error!("FILE_ENCRYPTION_KEY not set. A fresh key you can use: {}", key);
            }
            return Err(anyhow!("FILE_ENCRYPTION_KEY not set"));
        }
    };
    let cipher = FileCipher::new(&secret)?;

    let bot = Bot::from_env();
    let db = sled::open(&config.storage.db_path)?;
    let vault = FileVault::new(
        config.storage.files_dir.clone(),
        config.storage.temp_dir.clone(),
        cipher,
    )?;
    let files = FileStore::new(&db, vault)?;

    let messenger = Arc::new(TelegramMessenger::new(bot.clone()));
    let transformer = Arc::new(ExternalTransformer::new(
        config.tools.clone(),
        config.storage.temp_dir.clone(),
    ));
    let hub = Hub::new(config, messenger, files, transformer);

    let mut scheduler = schedule_jobs(&hub).await?;

    let bot_deps = BotDependencies { hub };

    Dispatcher::builder(bot, handler_tree())
        .dependencies(dptree::deps![bot_deps])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Shutting down rupa_bot...");
    if let Err(e) = scheduler.shutdown().await {
        log::error!("Failed to shut down job scheduler: {}", e);
    }
    db.flush_async().await?;
    Ok(())
}
