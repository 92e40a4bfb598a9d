pub mod sender;
pub mod telegram;

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;

use self::sender::MessageSender;

/// Chat backend a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Telegram,
    Discord,
    Twitch,
    VkPlay,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Telegram => "telegram",
            Platform::Discord => "discord",
            Platform::Twitch => "twitch",
            Platform::VkPlay => "vkplay",
        }
    }

    /// Hard limit on a single outbound message for the platform.
    pub fn default_max_message_length(&self) -> usize {
        match self {
            Platform::Telegram => 4096,
            Platform::Discord => 2000,
            Platform::Twitch | Platform::VkPlay => 500,
        }
    }

    pub fn default_format(&self) -> TextFormat {
        match self {
            Platform::Telegram => TextFormat::Html,
            Platform::Discord => TextFormat::Markdown,
            Platform::Twitch | Platform::VkPlay => TextFormat::Plain,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of a channel, used only for authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    General,
    Premium,
    Administrative,
    Announce,
}

/// Optional outbound operations a sender supports beyond plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    pub const PHOTO: Self = Self(1);
    pub const DOCUMENT: Self = Self(1 << 1);
    pub const SHORT_LINK: Self = Self(1 << 2);
    pub const DELETE: Self = Self(1 << 3);
    pub const PREPARE: Self = Self(1 << 4);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Platform-specific text escaping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    /// Telegram HTML parse mode
    Html,
    /// Discord flavoured markdown
    Markdown,
}

impl TextFormat {
    pub fn escape(&self, text: &str) -> String {
        match self {
            TextFormat::Plain => text.to_string(),
            TextFormat::Html => {
                let mut out = String::with_capacity(text.len());
                for ch in text.chars() {
                    match ch {
                        '&' => out.push_str("&amp;"),
                        '<' => out.push_str("&lt;"),
                        '>' => out.push_str("&gt;"),
                        _ => out.push(ch),
                    }
                }
                out
            }
            TextFormat::Markdown => {
                let mut out = String::with_capacity(text.len() + 8);
                for ch in text.chars() {
                    if matches!(ch, '*' | '_' | '~' | '`' | '|' | '>' | '\\') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out
            }
        }
    }

    pub fn bold(&self, text: &str) -> String {
        let escaped = self.escape(text);
        match self {
            TextFormat::Plain => escaped,
            TextFormat::Html => format!("<b>{}</b>", escaped),
            TextFormat::Markdown => format!("**{}**", escaped),
        }
    }
}

/// The message an inbound message replies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRef {
    pub username: String,
    pub text: String,
    /// Set when the quoted message was authored by this bot
    pub from_bot: bool,
}

/// Platform payload carried alongside the common context fields.
#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformDetails {
    Telegram {
        chat_id: i64,
        message_id: Option<i32>,
        channel_type: ChannelType,
    },
    Discord {
        guild_id: u64,
        channel_id: u64,
        message_id: Option<u64>,
        guild_type: ChannelType,
        channel_type: ChannelType,
        mentions: Vec<String>,
    },
    Twitch {
        channel: String,
    },
    VkPlay {
        channel: String,
    },
}

impl PlatformDetails {
    pub fn platform(&self) -> Platform {
        match self {
            PlatformDetails::Telegram { .. } => Platform::Telegram,
            PlatformDetails::Discord { .. } => Platform::Discord,
            PlatformDetails::Twitch { .. } => Platform::Twitch,
            PlatformDetails::VkPlay { .. } => Platform::VkPlay,
        }
    }
}

/// Platform-neutral carrier for one inbound event.
///
/// Built by a platform adapter per message (or synthetically by scheduled
/// jobs) and dropped once the response has been sent.
#[derive(Clone)]
pub struct ChatContext {
    pub username: String,
    pub max_message_length: usize,
    pub format: TextFormat,
    pub details: PlatformDetails,
    pub reply: Option<ReplyRef>,
    /// Recent conversation lines handed over by the pipeline
    pub history: Vec<String>,
    capabilities: Capabilities,
    sender: Arc<dyn MessageSender>,
}

impl ChatContext {
    pub fn new(
        details: PlatformDetails,
        username: impl Into<String>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        let platform = details.platform();
        Self {
            username: username.into(),
            max_message_length: platform.default_max_message_length(),
            format: platform.default_format(),
            details,
            reply: None,
            history: Vec::new(),
            capabilities: sender.capabilities(),
            sender,
        }
    }

    pub fn with_reply(mut self, reply: Option<ReplyRef>) -> Self {
        self.reply = reply;
        self
    }

    pub fn with_max_message_length(mut self, max: usize) -> Self {
        self.max_message_length = max;
        self
    }

    pub fn platform(&self) -> Platform {
        self.details.platform()
    }

    /// Classification of the channel itself (not its parent group).
    pub fn channel_type(&self) -> Option<ChannelType> {
        match &self.details {
            PlatformDetails::Telegram { channel_type, .. }
            | PlatformDetails::Discord { channel_type, .. } => Some(*channel_type),
            _ => None,
        }
    }

    /// Classification of the parent group on two-level platforms.
    pub fn parent_channel_type(&self) -> Option<ChannelType> {
        match &self.details {
            PlatformDetails::Discord { guild_type, .. } => Some(*guild_type),
            _ => None,
        }
    }

    pub fn mentions(&self) -> &[String] {
        match &self.details {
            PlatformDetails::Discord { mentions, .. } => mentions,
            _ => &[],
        }
    }

    #[allow(dead_code)]
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn sender(&self) -> &Arc<dyn MessageSender> {
        &self.sender
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        self.sender.send_message(self, text).await
    }
}

impl fmt::Debug for ChatContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatContext")
            .field("platform", &self.platform())
            .field("username", &self.username)
            .field("details", &self.details)
            .field("reply", &self.reply)
            .field("history", &self.history.len())
            .field("capabilities", &self.capabilities)
            .finish()
    }
}
