use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, error, info, warn};

use crate::commands::parser::{is_command, CommandParser};
use crate::commands::registry::CommandRegistry;
use crate::commands::{run_command, Command, CommandKind, Outcome};
use crate::permissions::{RoleStore, UserRole};
use crate::pipeline::birthday::BirthdayGreeter;
use crate::pipeline::filters::{FilterOutcome, MessageFilter};
use crate::pipeline::{starts_with_name, MessagePipeline, DEFAULT_MENTION_PROBABILITY};
use crate::platform::ChatContext;

/// What happened to one inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Sender is ignored; nothing was processed
    Ignored,
    /// A filter consumed the message
    Filtered,
    NotACommand,
    /// Looked like a command but nothing in the registry is close enough
    UnknownCommand,
    Handled(Outcome),
    /// Command logic failed; the error was logged
    Failed,
}

/// Per-platform message handler.
///
/// One instance per platform, created at startup. Messages for a platform
/// are handled one at a time, in arrival order.
pub struct BotHandler {
    parser: CommandParser,
    registry: Arc<CommandRegistry>,
    roles: Arc<dyn RoleStore>,
    pipeline: MessagePipeline,
    birthdays: Option<BirthdayGreeter>,
    filters: Vec<Arc<dyn MessageFilter>>,
    mention_probability: f64,
    mention_token: String,
}

impl BotHandler {
    pub fn new(
        pipeline: MessagePipeline,
        registry: Arc<CommandRegistry>,
        roles: Arc<dyn RoleStore>,
    ) -> Self {
        let mention_token = format!("@{}", pipeline.bot_name().to_lowercase());
        Self {
            parser: CommandParser::new(),
            registry,
            roles,
            pipeline,
            birthdays: None,
            filters: Vec::new(),
            mention_probability: DEFAULT_MENTION_PROBABILITY,
            mention_token,
        }
    }

    pub fn with_birthdays(mut self, greeter: BirthdayGreeter) -> Self {
        self.birthdays = Some(greeter);
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn MessageFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_mention_probability(mut self, probability: f64) -> Self {
        self.mention_probability = probability.clamp(0.0, 1.0);
        self
    }

    #[allow(dead_code)]
    pub fn pipeline(&self) -> &MessagePipeline {
        &self.pipeline
    }

    pub async fn handle_message(&self, ctx: ChatContext, text: &str) -> Dispatch {
        self.handle_message_on(ctx, text, Local::now().date_naive()).await
    }

    /// Run one message through greeting, filters, mention handling, parsing
    /// and command execution.
    pub async fn handle_message_on(
        &self,
        mut ctx: ChatContext,
        text: &str,
        today: NaiveDate,
    ) -> Dispatch {
        let role = self.roles.get_user_role(&ctx.username).await;
        debug!(platform = %ctx.platform(), username = %ctx.username, ?role, "Inbound message");

        if let Some(greeter) = &self.birthdays {
            if !matches!(role, UserRole::Ignored | UserRole::Bot) {
                if let Err(e) = greeter.greet_if_birthday(&ctx, today).await {
                    warn!("Birthday greeting failed: {:#}", e);
                }
            }
        }

        for filter in &self.filters {
            match filter.filter(text, &ctx, role).await {
                Ok(FilterOutcome::Continue) => {}
                Ok(FilterOutcome::Stop) => {
                    debug!(filter = filter.name(), "Message stopped by filter");
                    return Dispatch::Filtered;
                }
                Err(e) => warn!(filter = filter.name(), "Filter failed: {:#}", e),
            }
        }

        let Some(processed) = self
            .pipeline
            .handle_mention(text, &mut ctx, self.mention_probability)
            .await
        else {
            return Dispatch::Ignored;
        };

        if processed == text && !is_command(text) {
            self.pipeline.save_last_message(&ctx.username, text).await;
        }

        let Some(mut parsed) = self.parser.parse(&processed, ctx, role) else {
            return Dispatch::NotACommand;
        };

        let Some(command) = self.resolve(&parsed.command) else {
            debug!(command = %parsed.command, "Unknown command");
            return Dispatch::UnknownCommand;
        };

        info!(
            platform = %parsed.context.platform(),
            username = %parsed.context.username,
            command = %command.name(),
            "Running command"
        );
        match run_command(command.as_ref(), &mut parsed).await {
            Ok(outcome) => Dispatch::Handled(outcome),
            Err(e) => {
                error!(command = %command.name(), "Command failed: {:#}", e);
                Dispatch::Failed
            }
        }
    }

    /// Mentions of the bot go to the mention command whatever punctuation
    /// follows the name. Other `@` tokens address people, not commands.
    fn resolve(&self, token: &str) -> Option<Arc<dyn Command>> {
        if starts_with_name(token, &self.mention_token) {
            return self.registry.find_by_kind(CommandKind::Mention);
        }
        if token.starts_with('@') {
            return None;
        }
        self.registry.find_by_name(token)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::commands::builtin::mention::CannedReplies;
    use crate::commands::builtin::{register_builtin_commands, BuiltinDeps};
    use crate::permissions::InMemoryRoleStore;
    use crate::pipeline::filters::CensorFilter;
    use crate::platform::sender::testing::{telegram_context, RecordingSender, Sent};
    use crate::platform::{Capabilities, ChannelType, Platform};
    use crate::stores::{CensorWordStore, InMemoryBirthdays, InMemoryCensorWords};

    struct Fixture {
        handler: BotHandler,
        censor_words: Arc<InMemoryCensorWords>,
    }

    async fn fixture(phrases: &[&str]) -> Fixture {
        let roles = Arc::new(InMemoryRoleStore::new());
        roles.set_user_role("boss", UserRole::Administrator).await.unwrap();
        roles.set_user_role("troll", UserRole::Ignored).await.unwrap();

        let censor_words = Arc::new(InMemoryCensorWords::new(["редиска"]));
        let replies = Arc::new(CannedReplies::with_rng(
            phrases.iter().map(|p| p.to_string()).collect(),
            StdRng::seed_from_u64(3),
        ));

        let mut registry = CommandRegistry::new();
        register_builtin_commands(
            &mut registry,
            BuiltinDeps {
                bot_name: "PolyBot".to_string(),
                roles: roles.clone(),
                censor_words: censor_words.clone(),
                replies,
            },
        );

        let pipeline = MessagePipeline::new(Platform::Telegram, "PolyBot", roles.clone())
            .with_rng(StdRng::seed_from_u64(11));
        let birthdays = HashMap::from([("alice".to_string(), "03-14".to_string())]);
        let greeter = BirthdayGreeter::new(Arc::new(
            InMemoryBirthdays::from_config(&birthdays).unwrap(),
        ));

        let handler = BotHandler::new(pipeline, Arc::new(registry), roles)
            .with_birthdays(greeter)
            .with_filter(Arc::new(CensorFilter::new(censor_words.clone())))
            .with_mention_probability(0.0);
        Fixture {
            handler,
            censor_words,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn context(
        username: &str,
        channel: ChannelType,
        caps: Capabilities,
    ) -> (ChatContext, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::new(caps));
        (telegram_context(username, channel, sender.clone()), sender)
    }

    #[tokio::test]
    async fn ignored_user_gets_no_response() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("troll", ChannelType::Premium, Capabilities::NONE);

        let result = fx.handler.handle_message_on(ctx, "!команды", today()).await;

        assert_eq!(result, Dispatch::Ignored);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn administrator_adds_censored_word() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("boss", ChannelType::Administrative, Capabilities::NONE);

        let result = fx
            .handler
            .handle_message_on(ctx, "!добавитьцензуру слово", today())
            .await;

        assert_eq!(result, Dispatch::Handled(Outcome::Sent));
        assert_eq!(sender.messages(), vec!["Слово «слово» добавлено в цензуру.".to_string()]);
        assert!(fx.censor_words.words().await.unwrap().contains(&"слово".to_string()));
    }

    #[tokio::test]
    async fn typos_still_reach_the_command() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("boss", ChannelType::Administrative, Capabilities::NONE);

        let result = fx
            .handler
            .handle_message_on(ctx, "!добавитьцензур слово", today())
            .await;

        assert_eq!(result, Dispatch::Handled(Outcome::Sent));
        assert_eq!(sender.messages().len(), 1);
    }

    #[tokio::test]
    async fn unrelated_tokens_are_unknown() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("boss", ChannelType::Premium, Capabilities::NONE);

        let result = fx.handler.handle_message_on(ctx, "!погода", today()).await;

        assert_eq!(result, Dispatch::UnknownCommand);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn plain_chatter_is_remembered() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("bob", ChannelType::General, Capabilities::NONE);

        let result = fx.handler.handle_message_on(ctx, "всем привет", today()).await;

        assert_eq!(result, Dispatch::NotACommand);
        assert!(sender.sent().is_empty());
        assert_eq!(
            fx.handler.pipeline().history().await,
            vec!["bob: всем привет".to_string()]
        );
    }

    #[tokio::test]
    async fn censored_messages_are_deleted() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("bob", ChannelType::General, Capabilities::DELETE);

        let result = fx.handler.handle_message_on(ctx, "сам ты Редиска!", today()).await;

        assert_eq!(result, Dispatch::Filtered);
        assert_eq!(sender.sent(), vec![Sent::Deleted(1)]);
        assert!(fx.handler.pipeline().history().await.is_empty());
    }

    #[tokio::test]
    async fn mentions_are_answered() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("bob", ChannelType::General, Capabilities::NONE);

        let result = fx
            .handler
            .handle_message_on(ctx, "@PolyBot, ты тут?", today())
            .await;

        assert_eq!(result, Dispatch::Handled(Outcome::Sent));
        assert_eq!(sender.messages(), vec!["bob, Да?".to_string()]);
    }

    #[tokio::test]
    async fn similar_usernames_do_not_reach_the_bot() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("bob", ChannelType::General, Capabilities::NONE);

        let result = fx
            .handler
            .handle_message_on(ctx, "@polybotfan привет", today())
            .await;

        assert_eq!(result, Dispatch::UnknownCommand);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reminders_do_not_hold_up_the_chat() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, sender) = context("bob", ChannelType::Premium, Capabilities::NONE);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            fx.handler.handle_message_on(ctx, "!напомни 60 чай", today()),
        )
        .await
        .expect("handler returns before the reminder is due");

        assert_eq!(result, Dispatch::Handled(Outcome::Sent));
        assert_eq!(sender.messages(), vec!["Хорошо, напомню через 60 мин.".to_string()]);

        let (ctx, _) = context("bob", ChannelType::General, Capabilities::DELETE);
        let result = fx.handler.handle_message_on(ctx, "ну ты редиска", today()).await;
        assert_eq!(result, Dispatch::Filtered);
    }

    #[tokio::test]
    async fn censored_phrases_are_deleted() {
        let fx = fixture(&["Да?"]).await;
        let (ctx, _) = context("boss", ChannelType::Administrative, Capabilities::NONE);
        fx.handler
            .handle_message_on(ctx, "!добавитьцензуру плохое слово", today())
            .await;

        let (ctx, sender) = context("bob", ChannelType::General, Capabilities::DELETE);
        let result = fx.handler.handle_message_on(ctx, "это плохое слово", today()).await;

        assert_eq!(result, Dispatch::Filtered);
        assert_eq!(sender.sent(), vec![Sent::Deleted(1)]);
    }

    #[tokio::test]
    async fn failing_commands_are_contained() {
        let fx = fixture(&[]).await;
        let (ctx, sender) = context("bob", ChannelType::General, Capabilities::NONE);

        let result = fx.handler.handle_message_on(ctx, "@PolyBot привет", today()).await;

        assert_eq!(result, Dispatch::Failed);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn birthday_greeting_comes_first_and_once() {
        let fx = fixture(&["Да?"]).await;
        let march_14 = NaiveDate::from_ymd_opt(2024, 3, 14).unwrap();

        let (ctx, sender) = context("alice", ChannelType::General, Capabilities::NONE);
        fx.handler.handle_message_on(ctx, "@PolyBot привет", march_14).await;
        let (ctx, _) = context("alice", ChannelType::General, Capabilities::NONE);
        fx.handler.handle_message_on(ctx, "ещё раз", march_14).await;

        assert_eq!(
            sender.messages(),
            vec![
                "С днём рождения, <b>alice</b>! 🎉".to_string(),
                "alice, Да?".to_string(),
            ]
        );
    }
}
