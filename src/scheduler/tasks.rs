use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use futures::FutureExt;
use tracing::{info, warn};

use crate::config::{Config, ConfigSource};
use crate::platform::sender::MessageSender;
use crate::platform::{ChannelType, ChatContext, PlatformDetails};
use crate::scheduler::Scheduler;
use crate::stores::BirthdayStore;

pub const DEFAULT_BIRTHDAY_TEMPLATE: &str = "Сегодня день рождения у {names}! Поздравляем! 🎂";

/// Synthetic context for messages the bot sends on its own.
fn outbound_context(
    sender: Arc<dyn MessageSender>,
    chat_id: i64,
    channel_type: ChannelType,
    bot_name: &str,
) -> ChatContext {
    ChatContext::new(
        PlatformDetails::Telegram {
            chat_id,
            message_id: None,
            channel_type,
        },
        bot_name,
        sender,
    )
}

/// Posts today's birthdays to the announcement chats.
pub struct BirthdayAnnouncer {
    store: Arc<dyn BirthdayStore>,
    sender: Arc<dyn MessageSender>,
    chats: Vec<i64>,
    template: String,
    bot_name: String,
}

impl BirthdayAnnouncer {
    pub fn new(
        store: Arc<dyn BirthdayStore>,
        sender: Arc<dyn MessageSender>,
        chats: Vec<i64>,
        template: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sender,
            chats,
            template: template.into(),
            bot_name: bot_name.into(),
        }
    }

    /// Returns how many chats were notified. A failed chat does not stop the others.
    pub async fn announce(&self, today: NaiveDate) -> Result<usize> {
        let names = self.store.birthdays_on(today).await?;
        if names.is_empty() {
            return Ok(0);
        }

        let mut notified = 0;
        for &chat_id in &self.chats {
            let ctx = outbound_context(
                self.sender.clone(),
                chat_id,
                ChannelType::Announce,
                &self.bot_name,
            );
            let listed = names
                .iter()
                .map(|name| ctx.format.bold(name))
                .collect::<Vec<_>>()
                .join(", ");
            let text = self.template.replace("{names}", &listed);
            match ctx.send_message(&text).await {
                Ok(()) => notified += 1,
                Err(e) => warn!(chat_id, "Failed to announce birthdays: {:#}", e),
            }
        }
        info!(count = names.len(), notified, "Announced birthdays");
        Ok(notified)
    }
}

/// Register built-in background tasks. Chat-facing jobs are only added when
/// a Telegram sender is available.
pub fn register_builtin_tasks(
    scheduler: &mut Scheduler,
    config: &Config,
    birthdays: Arc<dyn BirthdayStore>,
    telegram: Option<Arc<dyn MessageSender>>,
) -> Result<()> {
    if config.scheduler.heartbeat_secs > 0 {
        scheduler.add_interval_job(
            "heartbeat",
            Duration::from_secs(config.scheduler.heartbeat_secs),
            || {
                async {
                    info!("Heartbeat: bot is alive");
                    Ok(())
                }
                .boxed()
            },
        )?;
    }

    let (Some(sender), Some(telegram_config)) = (telegram, config.telegram_enabled()) else {
        return Ok(());
    };

    let chats = telegram_config.chats_of_type(ChannelType::Announce);
    if !chats.is_empty() {
        let template = match config.raw_value("birthday_template") {
            Some(_) => config.get_config_value::<String>("birthday_template")?,
            None => DEFAULT_BIRTHDAY_TEMPLATE.to_string(),
        };
        let announcer = Arc::new(BirthdayAnnouncer::new(
            birthdays,
            sender.clone(),
            chats,
            template,
            &config.bot.name,
        ));
        scheduler.add_daily_job("birthdays", config.scheduler.birthday_hour, move || {
            let announcer = announcer.clone();
            async move {
                announcer
                    .announce(Local::now().date_naive())
                    .await
                    .map(|_| ())
            }
            .boxed()
        })?;
    }

    for (index, announcement) in config.scheduler.announcements.iter().enumerate() {
        let name = format!("announcement-{}", index + 1);
        let ctx = Arc::new(outbound_context(
            sender.clone(),
            announcement.chat_id,
            telegram_config.channel_type(announcement.chat_id),
            &config.bot.name,
        ));
        let text = Arc::new(announcement.text.clone());
        scheduler
            .add_interval_job(
                &name,
                Duration::from_secs(announcement.interval_secs),
                move || {
                    let ctx = ctx.clone();
                    let text = text.clone();
                    async move {
                        ctx.send_message(&text)
                            .await
                            .context("Failed to send announcement")
                    }
                    .boxed()
                },
            )
            .with_context(|| format!("Invalid announcement for chat {}", announcement.chat_id))?;
    }

    Ok(())
}
