use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::permissions::UserRole;
use crate::platform::{Capabilities, ChatContext};
use crate::stores::CensorWordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Continue,
    /// The message was handled; nothing downstream should see it
    Stop,
}

/// A processor that runs on every inbound message before command parsing.
#[async_trait]
pub trait MessageFilter: Send + Sync {
    fn name(&self) -> &str;

    async fn filter(&self, text: &str, ctx: &ChatContext, role: UserRole) -> Result<FilterOutcome>;
}

/// Removes messages containing a censored word.
pub struct CensorFilter {
    words: Arc<dyn CensorWordStore>,
}

impl CensorFilter {
    pub fn new(words: Arc<dyn CensorWordStore>) -> Self {
        Self { words }
    }
}

/// Lower-cased alphanumeric runs of `text`
pub fn split_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// First censored entry whose words appear consecutively in `text`. Entries
/// may be phrases; punctuation between their words is not significant.
fn find_censored<'a>(text: &str, entries: &'a [String]) -> Option<&'a str> {
    let tokens = split_words(text);
    entries
        .iter()
        .find(|entry| {
            let needle = split_words(entry);
            !needle.is_empty() && tokens.windows(needle.len()).any(|w| w == needle.as_slice())
        })
        .map(String::as_str)
}

#[async_trait]
impl MessageFilter for CensorFilter {
    fn name(&self) -> &str {
        "censor"
    }

    async fn filter(&self, text: &str, ctx: &ChatContext, role: UserRole) -> Result<FilterOutcome> {
        if role.is_staff() {
            return Ok(FilterOutcome::Continue);
        }

        let words = self.words.words().await?;
        let Some(word) = find_censored(text, &words) else {
            return Ok(FilterOutcome::Continue);
        };

        info!(platform = %ctx.platform(), username = %ctx.username, %word, "Censored message");
        if ctx.supports(Capabilities::DELETE) {
            ctx.sender().delete_messages(ctx, 1).await?;
        } else {
            warn!(platform = %ctx.platform(), "Cannot delete censored message on this platform");
        }
        Ok(FilterOutcome::Stop)
    }
}
