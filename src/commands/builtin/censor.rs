use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::commands::{Command, CommandKind, ParsedCommand};
use crate::permissions::is_administrative_channel;
use crate::pipeline::filters::split_words;
use crate::stores::CensorWordStore;

const NO_WORDS: &str = "Нужно слово или фраза из букв и цифр.";

/// Staff only, and only where administration happens.
fn staff_in_admin_channel(parsed: &ParsedCommand) -> bool {
    parsed.role.is_staff() && is_administrative_channel(parsed)
}

pub struct AddCensorCommand {
    words: Arc<dyn CensorWordStore>,
}

impl AddCensorCommand {
    pub fn new(words: Arc<dyn CensorWordStore>) -> Self {
        Self { words }
    }
}

#[async_trait]
impl Command for AddCensorCommand {
    fn name(&self) -> &str {
        "!добавитьцензуру"
    }

    fn description(&self) -> &str {
        "добавить слово в цензуру"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn usage(&self) -> Option<&str> {
        Some("!добавитьцензуру <слово>")
    }

    fn kind(&self) -> CommandKind {
        CommandKind::AddCensor
    }

    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        staff_in_admin_channel(parsed)
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        let word = parsed.arguments.to_lowercase();
        if split_words(&word).is_empty() {
            parsed.set_response(NO_WORDS);
            return Ok(());
        }
        let shown = parsed.context.format.escape(&word);
        let response = if self.words.add_word(&word).await? {
            format!("Слово «{}» добавлено в цензуру.", shown)
        } else {
            format!("Слово «{}» уже есть в цензуре.", shown)
        };
        parsed.set_response(response);
        Ok(())
    }
}

pub struct RemoveCensorCommand {
    words: Arc<dyn CensorWordStore>,
}

impl RemoveCensorCommand {
    pub fn new(words: Arc<dyn CensorWordStore>) -> Self {
        Self { words }
    }
}

#[async_trait]
impl Command for RemoveCensorCommand {
    fn name(&self) -> &str {
        "!удалитьцензуру"
    }

    fn description(&self) -> &str {
        "убрать слово из цензуры"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn usage(&self) -> Option<&str> {
        Some("!удалитьцензуру <слово>")
    }

    fn kind(&self) -> CommandKind {
        CommandKind::RemoveCensor
    }

    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        staff_in_admin_channel(parsed)
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        let word = parsed.arguments.to_lowercase();
        let shown = parsed.context.format.escape(&word);
        let response = if self.words.remove_word(&word).await? {
            format!("Слово «{}» убрано из цензуры.", shown)
        } else {
            format!("Слова «{}» нет в цензуре.", shown)
        };
        parsed.set_response(response);
        Ok(())
    }
}
