use std::sync::LazyLock;

use regex::Regex;

use super::ParsedCommand;
use crate::permissions::UserRole;
use crate::platform::ChatContext;

/// Introducer plus a non-whitespace run, then whatever follows.
static COMMAND_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^([!@]\S+)(.*)$").expect("command pattern is a valid regex")
});

/// Splits raw text into a command token and an argument string.
///
/// Arguments are only trimmed; each command owns its own argument grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser;

impl CommandParser {
    pub fn new() -> Self {
        Self
    }

    /// Returns `None` when the text is not a command.
    pub fn parse(&self, raw: &str, context: ChatContext, role: UserRole) -> Option<ParsedCommand> {
        let (command, arguments) = split_command(raw)?;
        Some(ParsedCommand::new(command, arguments, context, role))
    }
}

/// The lower-cased command token and trimmed arguments, if `raw` is a command.
pub fn split_command(raw: &str) -> Option<(String, String)> {
    let captures = COMMAND_PATTERN.captures(raw)?;
    let command = captures.get(1)?.as_str().to_lowercase();
    let arguments = captures
        .get(2)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    Some((command, arguments))
}

pub fn is_command(raw: &str) -> bool {
    COMMAND_PATTERN.is_match(raw)
}
