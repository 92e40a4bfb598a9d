use anyhow::Result;
use async_trait::async_trait;

use crate::commands::registry::CommandRegistry;
use crate::commands::{Command, CommandKind, ParsedCommand};
use crate::permissions::{is_official_channel, UserRole};

pub const NAME: &str = "!команды";
const DESCRIPTION: &str = "список команд";
const PRIORITY: i32 = 100;

struct Entry {
    name: String,
    description: String,
    usage: Option<String>,
}

/// Lists the registered commands, highest priority first.
pub struct HelpCommand {
    entries: Vec<Entry>,
}

impl HelpCommand {
    /// Snapshot the registry; the help command itself is listed first.
    pub fn from_registry(registry: &CommandRegistry) -> Self {
        let mut entries = vec![Entry {
            name: NAME.to_string(),
            description: DESCRIPTION.to_string(),
            usage: None,
        }];
        entries.extend(
            registry
                .list()
                .into_iter()
                .filter(|c| c.name() != NAME && c.kind() != CommandKind::Mention)
                .map(|c| Entry {
                    name: c.name().to_string(),
                    description: c.description().to_string(),
                    usage: c.usage().map(str::to_string),
                }),
        );
        Self { entries }
    }
}

#[async_trait]
impl Command for HelpCommand {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn priority(&self) -> i32 {
        PRIORITY
    }

    fn kind(&self) -> CommandKind {
        CommandKind::Help
    }

    fn can_execute(&self, parsed: &ParsedCommand) -> bool {
        parsed.role != UserRole::Ignored && is_official_channel(parsed)
    }

    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
        let format = parsed.context.format;
        let mut text = String::from("Доступные команды:\n");
        for entry in &self.entries {
            text.push_str(&format!(
                "{}: {}",
                format.bold(&entry.name),
                format.escape(&entry.description)
            ));
            if let Some(usage) = &entry.usage {
                text.push_str(&format!(" ({})", format.escape(usage)));
            }
            text.push('\n');
        }
        parsed.set_response(text.trim_end());
        Ok(())
    }
}
