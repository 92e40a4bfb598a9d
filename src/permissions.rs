use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::info;

use crate::commands::ParsedCommand;
use crate::config::RolesConfig;
use crate::platform::{ChannelType, ChatContext, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UserRole {
    Administrator,
    Moderator,
    #[default]
    Default,
    Ignored,
    Bot,
}

impl UserRole {
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Administrator | UserRole::Moderator)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UserRole::Administrator => "администратор",
            UserRole::Moderator => "модератор",
            UserRole::Default => "пользователь",
            UserRole::Ignored => "игнорируемый",
            UserRole::Bot => "бот",
        };
        f.write_str(name)
    }
}

impl FromStr for UserRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "administrator" | "администратор" | "админ" => Ok(UserRole::Administrator),
            "moderator" | "mod" | "модератор" | "модер" => Ok(UserRole::Moderator),
            "default" | "user" | "пользователь" => Ok(UserRole::Default),
            "ignored" | "ignore" | "игнорируемый" | "игнор" => Ok(UserRole::Ignored),
            "bot" | "бот" => Ok(UserRole::Bot),
            other => anyhow::bail!("Unknown role: {}", other),
        }
    }
}

/// Username → role lookup, owned outside the core.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn get_user_role(&self, username: &str) -> UserRole;
    async fn set_user_role(&self, username: &str, role: UserRole) -> Result<()>;
}

/// Role store seeded from `[roles]`; usernames are matched case-insensitively.
#[derive(Default)]
pub struct InMemoryRoleStore {
    roles: RwLock<HashMap<String, UserRole>>,
}

impl InMemoryRoleStore {
    #[allow(dead_code)]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &RolesConfig) -> Self {
        let mut roles = HashMap::new();
        let groups = [
            (&config.bots, UserRole::Bot),
            (&config.ignored, UserRole::Ignored),
            (&config.moderators, UserRole::Moderator),
            (&config.administrators, UserRole::Administrator),
        ];
        // Later groups win, so an administrator listed twice stays administrator.
        for (names, role) in groups {
            for name in names {
                roles.insert(name.to_lowercase(), role);
            }
        }
        info!("Role store seeded with {} users", roles.len());
        Self {
            roles: RwLock::new(roles),
        }
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn get_user_role(&self, username: &str) -> UserRole {
        self.roles
            .read()
            .await
            .get(&username.to_lowercase())
            .copied()
            .unwrap_or_default()
    }

    async fn set_user_role(&self, username: &str, role: UserRole) -> Result<()> {
        self.roles.write().await.insert(username.to_lowercase(), role);
        info!(%username, %role, "User role updated");
        Ok(())
    }
}

pub fn context_is_administrative(ctx: &ChatContext) -> bool {
    match ctx.platform() {
        Platform::Discord => {
            ctx.parent_channel_type() == Some(ChannelType::Premium)
                && ctx.channel_type() == Some(ChannelType::Administrative)
        }
        _ => ctx.channel_type() == Some(ChannelType::Administrative),
    }
}

pub fn context_is_official(ctx: &ChatContext) -> bool {
    match ctx.platform() {
        Platform::Telegram => matches!(
            ctx.channel_type(),
            Some(ChannelType::Premium | ChannelType::Administrative)
        ),
        Platform::Discord => ctx.parent_channel_type() == Some(ChannelType::Premium),
        Platform::Twitch | Platform::VkPlay => true,
    }
}

pub fn is_administrative_channel(cmd: &ParsedCommand) -> bool {
    context_is_administrative(&cmd.context)
}

pub fn is_official_channel(cmd: &ParsedCommand) -> bool {
    context_is_official(&cmd.context)
}

/// True on the live-streaming platforms.
pub fn is_streaming_channel(cmd: &ParsedCommand) -> bool {
    matches!(cmd.context.platform(), Platform::Twitch | Platform::VkPlay)
}
