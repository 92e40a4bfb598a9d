use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::commands::{Command, CommandKind, ParsedCommand};
use crate::permissions::{RoleStore, UserRole};

/// `!роль <user> <role>`: administrators assign roles.
pub struct SetRoleCommand {
    roles: Arc<dyn RoleStore>,
}

impl SetRoleCommand {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }
}

#[async_trait]
impl Command for SetRoleCommand {
    fn name(&self) -> &str {
        "!роль"
    }

    fn description(&self) -> &str {
        "назначить роль пользователю"
    }

    fn priority(&self) -> i32 {
        5
    }

    fn usage(&self) -> Option<&str> {
        Some("!роль <пользователь> <админ|модератор|пользователь|игнор|бот>")
    }

    fn kind(&self) -> CommandKind {
        CommandKind::SetRole
    }

    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        parsed.role == UserRole::Administrator
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        let mut parts = parsed.arguments.split_whitespace();
        let (Some(user), Some(role_name)) = (parts.next(), parts.next()) else {
            parsed.set_response("Укажите пользователя и роль.");
            return Ok(());
        };
        let user = user.trim_start_matches('@').to_string();
        let text_format = parsed.context.format;

        let response = match role_name.parse::<UserRole>() {
            Ok(role) => {
                self.roles.set_user_role(&user, role).await?;
                format!("Роль пользователя {}: {}.", text_format.escape(&user), role)
            }
            Err(_) => format!("Неизвестная роль «{}».", text_format.escape(role_name)),
        };
        parsed.set_response(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::run_command;
    use crate::permissions::InMemoryRoleStore;
    use crate::platform::sender::testing::{telegram_context, RecordingSender};
    use crate::platform::{Capabilities, ChannelType};

    async fn run(args: &str, roles: Arc<InMemoryRoleStore>) -> Vec<String> {
        let command = SetRoleCommand::new(roles);
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("boss", ChannelType::General, sender.clone());
        let mut parsed = ParsedCommand::new("!роль", args, ctx, UserRole::Administrator);
        run_command(&command, &mut parsed).await.unwrap();
        sender.messages()
    }

    #[tokio::test]
    async fn assigns_roles() {
        let roles = Arc::new(InMemoryRoleStore::new());
        let messages = run("@Troll игнор", roles.clone()).await;

        assert_eq!(messages, vec!["Роль пользователя Troll: игнорируемый.".to_string()]);
        assert_eq!(roles.get_user_role("troll").await, UserRole::Ignored);
    }

    #[tokio::test]
    async fn rejects_unknown_roles_and_missing_parts() {
        let roles = Arc::new(InMemoryRoleStore::new());
        assert_eq!(
            run("troll король", roles.clone()).await,
            vec!["Неизвестная роль «король».".to_string()]
        );
        assert_eq!(
            run("troll", roles.clone()).await,
            vec!["Укажите пользователя и роль.".to_string()]
        );
        assert_eq!(roles.get_user_role("troll").await, UserRole::Default);
    }

    #[tokio::test]
    async fn user_supplied_parts_are_escaped() {
        let roles = Arc::new(InMemoryRoleStore::new());
        assert_eq!(
            run("a<b бот", roles.clone()).await,
            vec!["Роль пользователя a&lt;b: бот.".to_string()]
        );
        assert_eq!(
            run("troll <b>&", roles).await,
            vec!["Неизвестная роль «&lt;b&gt;&amp;».".to_string()]
        );
    }
}
