pub mod birthday;
pub mod filters;

use std::collections::VecDeque;
use std::sync::{Arc, LazyLock};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use tokio::sync::Mutex;
use tracing::debug;

use crate::permissions::{RoleStore, UserRole};
use crate::platform::{ChatContext, Platform};

pub const DEFAULT_HISTORY_CAPACITY: usize = 10;
pub const DEFAULT_MENTION_PROBABILITY: f64 = 0.005;

/// A stored conversational line: `username: message`
static CONVERSATION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^[^\s:]+: \S.*$").expect("conversation pattern is a valid regex")
});

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `text` begins with `name` and no word character follows it.
pub fn starts_with_name(text: &str, name: &str) -> bool {
    text.strip_prefix(name)
        .is_some_and(|rest| !rest.starts_with(is_word_char))
}

/// True when `name` occurs in `text` as a whole word on its right side.
fn contains_name(text: &str, name: &str) -> bool {
    text.match_indices(name)
        .any(|(at, _)| !text[at + name.len()..].starts_with(is_word_char))
}

/// Per-platform preprocessing ahead of command parsing.
///
/// Owns the recent-message ring buffer and the random engagement draw for
/// one platform; created once at startup.
pub struct MessagePipeline {
    platform: Platform,
    bot_name: String,
    system_marker: Option<String>,
    capacity: usize,
    history: Mutex<VecDeque<String>>,
    rng: Mutex<StdRng>,
    roles: Arc<dyn RoleStore>,
}

impl MessagePipeline {
    pub fn new(platform: Platform, bot_name: impl Into<String>, roles: Arc<dyn RoleStore>) -> Self {
        Self {
            platform,
            bot_name: bot_name.into(),
            system_marker: None,
            capacity: DEFAULT_HISTORY_CAPACITY,
            history: Mutex::new(VecDeque::with_capacity(DEFAULT_HISTORY_CAPACITY + 1)),
            rng: Mutex::new(StdRng::from_os_rng()),
            roles,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    pub fn with_system_marker(mut self, marker: Option<String>) -> Self {
        self.system_marker = marker.filter(|m| !m.is_empty());
        self
    }

    #[allow(dead_code)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    #[allow(dead_code)]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn bot_name(&self) -> &str {
        &self.bot_name
    }

    /// True unless the text looks like a stored conversation line or a
    /// platform system-log entry.
    pub fn is_message_invalid(&self, text: &str) -> bool {
        let is_system_log = self
            .system_marker
            .as_deref()
            .is_some_and(|marker| text.starts_with(marker));
        !(CONVERSATION_LINE.is_match(text) || is_system_log)
    }

    /// Prefix the text with `@<bot>` unless it is already a command or
    /// already addressed to the bot.
    pub fn add_bot_mention(&self, text: &str) -> String {
        let trimmed = text.trim_start();
        if trimmed.starts_with('!') {
            return trimmed.to_string();
        }

        let lower = trimmed.to_lowercase();
        let name = self.bot_name.to_lowercase();
        if starts_with_name(&lower, &format!("@{}", name)) {
            return trimmed.to_string();
        }
        if starts_with_name(&lower, &name) {
            return format!("@{}", trimmed);
        }
        format!("@{} {}", self.bot_name, trimmed)
    }

    /// @-mention in the text or the platform mention list, or a reply to the bot.
    pub fn is_bot_mentioned(&self, text: &str, ctx: &ChatContext) -> bool {
        let name = self.bot_name.to_lowercase();
        let mention = format!("@{}", name);
        contains_name(&text.to_lowercase(), &mention)
            || ctx.mentions().iter().any(|m| m.to_lowercase() == name)
            || ctx.reply.as_ref().is_some_and(|reply| {
                reply.from_bot || reply.username.to_lowercase() == name
            })
    }

    /// Decide whether the bot should treat the message as addressed to it.
    ///
    /// Returns `None` for ignored users; the caller must drop the message.
    /// Otherwise returns the text to hand to the parser, with a bot mention
    /// added when the bot was addressed or randomly decided to join in. On
    /// the random path the history buffer is moved into `ctx.history`.
    pub async fn handle_mention(
        &self,
        text: &str,
        ctx: &mut ChatContext,
        probability: f64,
    ) -> Option<String> {
        let role = self.roles.get_user_role(&ctx.username).await;
        if role == UserRole::Ignored {
            debug!(platform = %self.platform, username = %ctx.username, "Ignoring message");
            return None;
        }

        let quotes_conversation = ctx
            .reply
            .as_ref()
            .is_some_and(|reply| !self.is_message_invalid(&reply.text));

        if self.is_bot_mentioned(text, ctx) && !quotes_conversation {
            self.clear_history().await;
            return Some(self.add_bot_mention(text));
        }

        if !text.trim_start().starts_with('!') && self.should_randomly_mention_bot(probability).await {
            debug!(platform = %self.platform, "Joining the conversation unprompted");
            ctx.history = self.take_history().await;
            return Some(self.add_bot_mention(text));
        }

        Some(text.to_string())
    }

    /// Append `username: text`, evicting the oldest lines beyond capacity.
    pub async fn save_last_message(&self, username: &str, text: &str) {
        let mut history = self.history.lock().await;
        history.push_back(format!("{}: {}", username, text));
        while history.len() > self.capacity {
            history.pop_front();
        }
    }

    /// True iff the buffer is full and a uniform draw lands below `probability`.
    pub async fn should_randomly_mention_bot(&self, probability: f64) -> bool {
        if self.history.lock().await.len() < self.capacity {
            return false;
        }
        let draw: f64 = self.rng.lock().await.random();
        draw < probability
    }

    #[allow(dead_code)]
    pub async fn history(&self) -> Vec<String> {
        self.history.lock().await.iter().cloned().collect()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    async fn take_history(&self) -> Vec<String> {
        self.history.lock().await.drain(..).collect()
    }
}
