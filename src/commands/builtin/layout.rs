use anyhow::Result;
use async_trait::async_trait;

use crate::commands::{Command, CommandKind, ParsedCommand};
use crate::permissions::UserRole;

const LATIN_LOWER: &str = "qwertyuiop[]asdfghjkl;'zxcvbnm,./`";
const CYRILLIC_LOWER: &str = "йцукенгшщзхъфывапролджэячсмитьбю.ё";
const LATIN_UPPER: &str = "QWERTYUIOP{}ASDFGHJKL:\"ZXCVBNM<>?~";
const CYRILLIC_UPPER: &str = "ЙЦУКЕНГШЩЗХЪФЫВАПРОЛДЖЭЯЧСМИТЬБЮ,Ё";

fn map_char(ch: char) -> char {
    for (from, to) in [(LATIN_LOWER, CYRILLIC_LOWER), (LATIN_UPPER, CYRILLIC_UPPER)] {
        if let Some(idx) = from.chars().position(|c| c == ch) {
            return to.chars().nth(idx).unwrap_or(ch);
        }
    }
    ch
}

/// Retype text typed with an English layout as if the Russian one was active.
pub fn fix_layout(text: &str) -> String {
    text.chars().map(map_char).collect()
}

/// `!раскладка [текст]`: fixes the given text, or the replied-to message.
pub struct LayoutFixCommand;

#[async_trait]
impl Command for LayoutFixCommand {
    fn name(&self) -> &str {
        "!раскладка"
    }

    fn description(&self) -> &str {
        "исправить раскладку (текст или ответ на сообщение)"
    }

    fn kind(&self) -> CommandKind {
        CommandKind::LayoutFix
    }

    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        !matches!(parsed.role, UserRole::Ignored | UserRole::Bot)
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        let source = if parsed.arguments.is_empty() {
            parsed.context.reply.as_ref().map(|r| r.text.clone())
        } else {
            Some(parsed.arguments.clone())
        };

        let response = match source.filter(|s| !s.trim().is_empty()) {
            Some(text) => parsed.context.format.escape(&fix_layout(&text)),
            None => "Нечего исправлять: ответьте на сообщение или добавьте текст.".to_string(),
        };
        parsed.set_response(response);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::commands::run_command;
    use crate::platform::sender::testing::{telegram_context, RecordingSender};
    use crate::platform::{Capabilities, ChannelType, ReplyRef};

    #[test]
    fn maps_both_cases() {
        assert_eq!(fix_layout("ghbdtn"), "привет");
        assert_eq!(fix_layout("Ghbdtn? rfr ltkf"), "Привет, как дела");
        assert_eq!(fix_layout("123 уже"), "123 уже");
    }

    #[tokio::test]
    async fn falls_back_to_the_replied_message() {
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("alice", ChannelType::General, sender.clone()).with_reply(Some(
            ReplyRef {
                username: "bob".to_string(),
                text: "yt pyf.".to_string(),
                from_bot: false,
            },
        ));
        let mut parsed = ParsedCommand::new("!раскладка", "", ctx, UserRole::Default);

        run_command(&LayoutFixCommand, &mut parsed).await.unwrap();

        assert_eq!(sender.messages(), vec!["не знаю".to_string()]);
    }

    #[tokio::test]
    async fn fixed_text_is_escaped() {
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("alice", ChannelType::General, sender.clone());
        let mut parsed = ParsedCommand::new("!раскладка", "x<y & z", ctx, UserRole::Default);

        run_command(&LayoutFixCommand, &mut parsed).await.unwrap();

        assert_eq!(sender.messages(), vec!["чБн &amp; я".to_string()]);
    }

    #[tokio::test]
    async fn nothing_to_fix() {
        let sender = Arc::new(RecordingSender::new(Capabilities::NONE));
        let ctx = telegram_context("alice", ChannelType::General, sender.clone());
        let mut parsed = ParsedCommand::new("!раскладка", "", ctx, UserRole::Default);

        run_command(&LayoutFixCommand, &mut parsed).await.unwrap();

        assert_eq!(
            sender.messages(),
            vec!["Нечего исправлять: ответьте на сообщение или добавьте текст.".to_string()]
        );
    }
}
