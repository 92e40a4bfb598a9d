use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use tokio::sync::Mutex;
use tracing::debug;

use crate::commands::{Command, CommandKind, ParsedCommand};
use crate::permissions::UserRole;

/// Produces the bot's answer when it is addressed.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// `history` holds the conversation lines the pipeline handed over when
    /// the bot joined unprompted; it is empty for direct mentions. `username`
    /// arrives already escaped for the chat's text format.
    async fn reply(&self, username: &str, text: &str, history: &[String]) -> Result<String>;
}

/// Picks one of a fixed set of phrases.
pub struct CannedReplies {
    phrases: Vec<String>,
    rng: Mutex<StdRng>,
}

impl CannedReplies {
    pub fn new(phrases: Vec<String>) -> Self {
        Self::with_rng(phrases, StdRng::from_os_rng())
    }

    pub fn with_rng(phrases: Vec<String>, rng: StdRng) -> Self {
        Self {
            phrases: phrases.into_iter().filter(|p| !p.trim().is_empty()).collect(),
            rng: Mutex::new(rng),
        }
    }
}

#[async_trait]
impl ReplyGenerator for CannedReplies {
    async fn reply(&self, username: &str, _text: &str, history: &[String]) -> Result<String> {
        let mut rng = self.rng.lock().await;
        let Some(phrase) = self.phrases.choose(&mut *rng) else {
            bail!("No reply phrases configured");
        };
        if history.is_empty() {
            Ok(format!("{}, {}", username, phrase))
        } else {
            Ok(phrase.clone())
        }
    }
}

/// `@<bot>`: answers messages addressed to the bot.
pub struct MentionCommand {
    name: String,
    replies: Arc<dyn ReplyGenerator>,
}

impl MentionCommand {
    pub fn new(bot_name: &str, replies: Arc<dyn ReplyGenerator>) -> Self {
        Self {
            name: format!("@{}", bot_name.to_lowercase()),
            replies,
        }
    }
}

#[async_trait]
impl Command for MentionCommand {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "ответ на обращение к боту"
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Mention
    }

    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        !matches!(parsed.role, UserRole::Ignored | UserRole::Bot)
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        debug!(
            username = %parsed.context.username,
            history = parsed.context.history.len(),
            "Answering mention"
        );
        let username = parsed.context.format.escape(&parsed.context.username);
        let reply = self
            .replies
            .reply(
                &username,
                &parsed.arguments,
                &parsed.context.history,
            )
            .await?;
        parsed.set_response(reply);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{run_command, Outcome};
    use crate::platform::sender::testing::{telegram_context, RecordingSender};
    use crate::platform::{Capabilities, ChannelType};

    fn replies(phrases: &[&str]) -> Arc<CannedReplies> {
        Arc::new(CannedReplies::with_rng(
            phrases.iter().map(|p| p.to_string()).collect(),
            StdRng::seed_from_u64(1),
        ))
    }

    #[test]
    fn name_is_lowercased_mention() {
        let command = MentionCommand::new("PolyBot", replies(&["Да?"]));
        assert_eq!(command.name(), "@polybot");
    }

    #[tokio::test]
    async fn direct_mentions_address_the_user() {
        let command = MentionCommand::new("PolyBot", replies(&["Да?"]));
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("alice", ChannelType::General, sender.clone());
        let mut parsed = ParsedCommand::new("@polybot", "привет", ctx, UserRole::Default);

        assert_eq!(run_command(&command, &mut parsed).await.unwrap(), Outcome::Sent);
        assert_eq!(sender.messages(), vec!["alice, Да?".to_string()]);
    }

    #[tokio::test]
    async fn display_names_are_escaped() {
        let command = MentionCommand::new("PolyBot", replies(&["Да?"]));
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("<Вася>", ChannelType::General, sender.clone());
        let mut parsed = ParsedCommand::new("@polybot", "привет", ctx, UserRole::Default);

        run_command(&command, &mut parsed).await.unwrap();
        assert_eq!(sender.messages(), vec!["&lt;Вася&gt;, Да?".to_string()]);
    }

    #[tokio::test]
    async fn joining_a_conversation_skips_the_address() {
        let command = MentionCommand::new("PolyBot", replies(&["Согласен."]));
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let mut ctx = telegram_context("alice", ChannelType::General, sender.clone());
        ctx.history = vec!["bob: как вам погода?".to_string()];
        let mut parsed = ParsedCommand::new("@polybot", "скучно", ctx, UserRole::Default);

        run_command(&command, &mut parsed).await.unwrap();
        assert_eq!(sender.messages(), vec!["Согласен.".to_string()]);
    }

    #[tokio::test]
    async fn other_bots_are_not_answered() {
        let command = MentionCommand::new("PolyBot", replies(&["Да?"]));
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("otherbot", ChannelType::General, sender.clone());
        let mut parsed = ParsedCommand::new("@polybot", "", ctx, UserRole::Bot);

        assert_eq!(run_command(&command, &mut parsed).await.unwrap(), Outcome::Denied);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn empty_phrase_list_is_an_error() {
        let generator = CannedReplies::new(vec!["  ".to_string()]);
        assert!(generator.reply("alice", "", &[]).await.is_err());
    }
}
