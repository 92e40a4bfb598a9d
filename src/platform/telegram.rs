use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId, ParseMode};
use tracing::{debug, info, warn};

use super::sender::MessageSender;
use super::{Capabilities, ChatContext, PlatformDetails, ReplyRef};
use crate::bot::BotHandler;
use crate::config::TelegramConfig;

/// Outbound side of the Telegram adapter
pub struct TelegramSender {
    bot: Bot,
    http: reqwest::Client,
    shortener_url: Option<String>,
}

impl TelegramSender {
    pub fn new(bot: Bot, shortener_url: Option<String>) -> Self {
        Self {
            bot,
            http: reqwest::Client::new(),
            shortener_url: shortener_url.filter(|u| !u.is_empty()),
        }
    }

    async fn shorten(&self, endpoint: &str, url: &str) -> Result<String> {
        let short = self
            .http
            .get(endpoint)
            .query(&[("url", url)])
            .send()
            .await
            .context("Failed to reach link shortener")?
            .error_for_status()
            .context("Link shortener returned an error")?
            .text()
            .await
            .context("Failed to read shortened link")?;
        let short = short.trim();
        if short.is_empty() {
            bail!("Link shortener returned an empty body");
        }
        Ok(short.to_string())
    }
}

/// Chat and message ids of a Telegram context
fn target(ctx: &ChatContext) -> Result<(ChatId, Option<MessageId>)> {
    match &ctx.details {
        PlatformDetails::Telegram {
            chat_id,
            message_id,
            ..
        } => Ok((ChatId(*chat_id), message_id.map(MessageId))),
        other => bail!("Telegram sender got a {} context", other.platform()),
    }
}

/// Bytes of a `data:<mime>;base64,<payload>` URI.
fn decode_data_uri(data: &str) -> Result<Vec<u8>> {
    let (_, payload) = data
        .split_once(";base64,")
        .context("Photo data is not base64 encoded")?;
    STANDARD
        .decode(payload.trim())
        .context("Invalid base64 photo data")
}

fn input_file(source: &str, file_name: &str) -> Result<InputFile> {
    if source.starts_with("data:") {
        return Ok(InputFile::memory(decode_data_uri(source)?).file_name(file_name.to_string()));
    }
    let url = reqwest::Url::parse(source).with_context(|| format!("Invalid URL: {}", source))?;
    Ok(InputFile::url(url))
}

#[async_trait]
impl MessageSender for TelegramSender {
    fn capabilities(&self) -> Capabilities {
        let caps = Capabilities::PHOTO
            | Capabilities::DOCUMENT
            | Capabilities::DELETE
            | Capabilities::PREPARE;
        if self.shortener_url.is_some() {
            caps | Capabilities::SHORT_LINK
        } else {
            caps
        }
    }

    async fn send_message(&self, ctx: &ChatContext, text: &str) -> Result<()> {
        let (chat_id, _) = target(ctx)?;
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .context("Failed to send Telegram message")?;
        Ok(())
    }

    async fn send_photo(&self, ctx: &ChatContext, photo: &str) -> Result<()> {
        let (chat_id, _) = target(ctx)?;
        self.bot
            .send_photo(chat_id, input_file(photo, "image.png")?)
            .await
            .context("Failed to send Telegram photo")?;
        Ok(())
    }

    async fn send_document(&self, ctx: &ChatContext, url: &str) -> Result<()> {
        let (chat_id, _) = target(ctx)?;
        self.bot
            .send_document(chat_id, input_file(url, "document")?)
            .await
            .context("Failed to send Telegram document")?;
        Ok(())
    }

    async fn send_shortened_url(&self, ctx: &ChatContext, url: &str) -> Result<()> {
        let link = match &self.shortener_url {
            Some(endpoint) => match self.shorten(endpoint, url).await {
                Ok(short) => short,
                Err(e) => {
                    warn!("Sending the full link: {:#}", e);
                    url.to_string()
                }
            },
            None => url.to_string(),
        };
        self.send_message(ctx, &ctx.format.escape(&link)).await
    }

    /// Deletes the triggering message and the `count - 1` before it. Only the
    /// triggering message must succeed.
    async fn delete_messages(&self, ctx: &ChatContext, count: usize) -> Result<()> {
        let (chat_id, message_id) = target(ctx)?;
        let message_id = message_id.context("Context has no message to delete")?;

        for offset in 0..count {
            let Some(id) = i32::try_from(offset)
                .ok()
                .and_then(|o| message_id.0.checked_sub(o))
                .filter(|id| *id > 0)
            else {
                break;
            };
            match self.bot.delete_message(chat_id, MessageId(id)).await {
                Ok(_) => debug!(chat_id = chat_id.0, message_id = id, "Deleted message"),
                Err(e) if offset == 0 => {
                    return Err(e).context("Failed to delete Telegram message");
                }
                Err(e) => warn!(chat_id = chat_id.0, message_id = id, "Failed to delete: {}", e),
            }
        }
        Ok(())
    }

    async fn prepare_message(&self, ctx: &ChatContext) -> Result<()> {
        let (chat_id, _) = target(ctx)?;
        self.bot
            .send_chat_action(chat_id, ChatAction::Typing)
            .await
            .context("Failed to send typing indicator")?;
        Ok(())
    }
}

/// Shared state for the update handler
struct TelegramState {
    handler: Arc<BotHandler>,
    sender: Arc<TelegramSender>,
    config: TelegramConfig,
    /// Our own username, lower-cased
    own_username: Option<String>,
}

/// Run the Telegram platform until the dispatcher stops.
pub async fn run(
    bot: Bot,
    handler: Arc<BotHandler>,
    sender: Arc<TelegramSender>,
    config: TelegramConfig,
) -> Result<()> {
    info!("Starting Telegram platform...");

    let me = bot.get_me().await.context("Failed to fetch bot identity")?;
    let own_username = me.username.as_ref().map(|u| u.to_lowercase());
    info!("Logged in to Telegram as {:?}", own_username);

    let state = Arc::new(TelegramState {
        handler,
        sender,
        config,
        own_username,
    });

    let handler = Update::filter_message().endpoint(handle_message);

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn display_name(user: &teloxide::types::User) -> String {
    user.username
        .clone()
        .unwrap_or_else(|| user.first_name.clone())
}

async fn handle_message(msg: Message, state: Arc<TelegramState>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let username = display_name(user);
    let chat_id = msg.chat.id.0;
    debug!("Telegram message from {} in {}: {}", username, chat_id, text);

    let reply = msg.reply_to_message().and_then(|replied| {
        let author = replied.from.as_ref()?;
        let author_name = display_name(author);
        let from_bot = author.is_bot
            && state
                .own_username
                .as_deref()
                .is_some_and(|own| author_name.to_lowercase() == own);
        Some(ReplyRef {
            username: author_name,
            text: replied.text().or(replied.caption()).unwrap_or_default().to_string(),
            from_bot,
        })
    });

    let sender: Arc<dyn MessageSender> = state.sender.clone();
    let ctx = ChatContext::new(
        PlatformDetails::Telegram {
            chat_id,
            message_id: Some(msg.id.0),
            channel_type: state.config.channel_type(chat_id),
        },
        username,
        sender,
    )
    .with_reply(reply)
    .with_max_message_length(state.config.max_message_length);

    let outcome = state.handler.handle_message(ctx, text).await;
    debug!(chat_id, ?outcome, "Telegram message handled");
    Ok(())
}
