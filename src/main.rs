mod bot;
mod commands;
mod config;
mod permissions;
mod pipeline;
mod platform;
mod scheduler;
mod stores;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::BotHandler;
use crate::commands::builtin::mention::CannedReplies;
use crate::commands::builtin::{register_builtin_commands, BuiltinDeps};
use crate::commands::registry::CommandRegistry;
use crate::config::Config;
use crate::permissions::{InMemoryRoleStore, RoleStore};
use crate::pipeline::birthday::BirthdayGreeter;
use crate::pipeline::filters::CensorFilter;
use crate::pipeline::MessagePipeline;
use crate::platform::sender::MessageSender;
use crate::platform::telegram::{self, TelegramSender};
use crate::platform::Platform;
use crate::scheduler::tasks::register_builtin_tasks;
use crate::scheduler::Scheduler;
use crate::stores::{BirthdayStore, CensorWordStore, InMemoryBirthdays, InMemoryCensorWords};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,polybot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Bot name: {}", config.bot.name);
    info!("  Telegram: {}", config.telegram_enabled().is_some());
    info!("  Birthdays: {}", config.birthdays.len());
    info!("  Announcements: {}", config.scheduler.announcements.len());

    // Stores
    let roles: Arc<dyn RoleStore> = Arc::new(InMemoryRoleStore::from_config(&config.roles));
    let censor_words: Arc<dyn CensorWordStore> =
        Arc::new(InMemoryCensorWords::new(config.censor.words.iter()));
    let birthdays: Arc<dyn BirthdayStore> = Arc::new(
        InMemoryBirthdays::from_config(&config.birthdays).context("Invalid [birthdays] table")?,
    );

    // Commands are registered once, before any message is handled
    let mut registry = CommandRegistry::new();
    register_builtin_commands(
        &mut registry,
        BuiltinDeps {
            bot_name: config.bot.name.clone(),
            roles: roles.clone(),
            censor_words: censor_words.clone(),
            replies: Arc::new(CannedReplies::new(config.bot.replies.clone())),
        },
    );
    let registry = Arc::new(registry);
    info!("Registered {} commands", registry.len());

    // Telegram
    let telegram_platform = config.telegram_enabled().map(|telegram_config| {
        let bot = teloxide::Bot::new(&telegram_config.bot_token);
        let sender = Arc::new(TelegramSender::new(
            bot.clone(),
            telegram_config.shortener_url.clone(),
        ));
        let pipeline = MessagePipeline::new(Platform::Telegram, &config.bot.name, roles.clone())
            .with_capacity(config.bot.history_capacity)
            .with_system_marker(config.bot.system_log_marker.clone());
        let handler = BotHandler::new(pipeline, registry.clone(), roles.clone())
            .with_birthdays(BirthdayGreeter::new(birthdays.clone()))
            .with_filter(Arc::new(CensorFilter::new(censor_words.clone())))
            .with_mention_probability(config.bot.mention_probability);
        (bot, sender, Arc::new(handler), telegram_config.clone())
    });

    // Scheduler
    let mut scheduler = Scheduler::new();
    let telegram_sender = telegram_platform
        .as_ref()
        .map(|(_, sender, _, _)| sender.clone() as Arc<dyn MessageSender>);
    register_builtin_tasks(&mut scheduler, &config, birthdays.clone(), telegram_sender)?;
    info!("Scheduler started with {} jobs", scheduler.len());

    info!("Bot is starting...");
    match telegram_platform {
        Some((bot, sender, handler, telegram_config)) => {
            tokio::select! {
                result = telegram::run(bot, handler, sender, telegram_config) => {
                    if let Err(e) = result {
                        error!("Telegram platform stopped: {:#}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
            }
        }
        None => {
            info!("No chat platform enabled, running scheduled tasks only");
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutdown requested");
        }
    }

    scheduler.shutdown().await;
    Ok(())
}
