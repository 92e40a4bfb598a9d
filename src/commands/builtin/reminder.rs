use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::commands::{Command, CommandKind, ParsedCommand};
use crate::permissions::{is_official_channel, is_streaming_channel, UserRole};

const MAX_MINUTES: u64 = 24 * 60;

/// `!напомни <минуты> <текст>`: acknowledges right away and sends the
/// reminder from a background task once the delay has passed.
pub struct ReminderCommand {
    unit: Duration,
}

impl ReminderCommand {
    pub fn new() -> Self {
        Self {
            unit: Duration::from_secs(60),
        }
    }
}

impl Default for ReminderCommand {
    fn default() -> Self {
        Self::new()
    }
}

/// Splits `"<minutes> <text>"`; the text may span several lines.
fn parse_reminder(arguments: &str) -> Option<(u64, &str)> {
    let (minutes, text) = arguments.split_once(char::is_whitespace)?;
    let minutes: u64 = minutes.parse().ok()?;
    let text = text.trim();
    if minutes == 0 || minutes > MAX_MINUTES || text.is_empty() {
        return None;
    }
    Some((minutes, text))
}

#[async_trait]
impl Command for ReminderCommand {
    fn name(&self) -> &str {
        "!напомни"
    }

    fn description(&self) -> &str {
        "напомнить через указанное число минут"
    }

    fn usage(&self) -> Option<&str> {
        Some("!напомни <минуты> <текст>")
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Reminder
    }

    /// Stream chats scroll too fast for a delayed reply to be useful.
    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        !matches!(parsed.role, UserRole::Ignored | UserRole::Bot)
            && is_official_channel(parsed)
            && !is_streaming_channel(parsed)
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        let Some((minutes, text)) = parse_reminder(&parsed.arguments) else {
            parsed.set_response(format!(
                "Укажите время от 1 до {} минут и текст напоминания.",
                MAX_MINUTES
            ));
            return Ok(());
        };
        let text_format = parsed.context.format;
        let reminder = format!(
            "@{}, напоминаю: {}",
            text_format.escape(&parsed.context.username),
            text_format.escape(text)
        );
        let wait = self.unit.saturating_mul(u32::try_from(minutes).unwrap_or(u32::MAX));
        let ctx = parsed.context.clone();

        info!(username = %ctx.username, minutes, "Reminder scheduled");
        tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Err(e) = ctx.send_message(&reminder).await {
                warn!(username = %ctx.username, "Failed to send reminder: {:#}", e);
            }
        });

        parsed.set_response(format!("Хорошо, напомню через {} мин.", minutes));
        Ok(())
    }
}
