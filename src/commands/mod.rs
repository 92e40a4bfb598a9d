pub mod builtin;
pub mod fuzzy;
pub mod parser;
pub mod registry;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::permissions::UserRole;
use crate::platform::{Capabilities, ChatContext};

/// Variant tag used to find a specific singleton command in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Help,
    AddCensor,
    RemoveCensor,
    SetRole,
    Reminder,
    LayoutFix,
    Mention,
}

/// A message recognised as a command, carried through one invocation.
#[derive(Debug)]
pub struct ParsedCommand {
    /// Lower-cased token including the `!`/`@` introducer
    pub command: String,
    /// Trimmed remainder of the message, possibly empty
    pub arguments: String,
    pub context: ChatContext,
    pub role: UserRole,
    response: Option<String>,
}

impl ParsedCommand {
    pub fn new(
        command: impl Into<String>,
        arguments: impl Into<String>,
        context: ChatContext,
        role: UserRole,
    ) -> Self {
        Self {
            command: command.into(),
            arguments: arguments.into(),
            context,
            role,
            response: None,
        }
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    /// Set the response once. A second call is ignored and returns `false`.
    pub fn set_response(&mut self, text: impl Into<String>) -> bool {
        if self.response.is_some() {
            warn!(command = %self.command, "Response already set, ignoring the new one");
            return false;
        }
        self.response = Some(text.into());
        true
    }
}

#[async_trait]
pub trait Command: Send + Sync {
    /// Registry key, including the introducer
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Higher values are listed first
    fn priority(&self) -> i32 {
        0
    }

    /// When set, the command requires arguments and this hint is sent if none are given.
    fn usage(&self) -> Option<&str> {
        None
    }

    fn kind(&self) -> CommandKind;

    fn can_execute(&self, parsed: &ParsedCommand) -> bool;

    /// Command-specific logic; must leave a response on `parsed`.
    async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()>;
}

/// How an invocation of [`run_command`] ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `can_execute` refused; nothing was sent
    Denied,
    /// Arguments were missing; the usage hint was sent
    Usage,
    /// The command ran and its response was sent
    Sent,
}

/// Drive one command through permission check, preparation, parameter
/// validation, execution and the final send.
///
/// Errors from the command logic propagate to the caller untouched.
pub async fn run_command(command: &dyn Command, parsed: &mut ParsedCommand) -> Result<Outcome> {
    if !command.can_execute(parsed) {
        debug!(command = %parsed.command, role = ?parsed.role, "Command denied");
        return Ok(Outcome::Denied);
    }

    if parsed.context.supports(Capabilities::PREPARE) {
        if let Err(e) = parsed.context.sender().prepare_message(&parsed.context).await {
            warn!("Failed to prepare message: {:#}", e);
        }
    }

    if let Some(usage) = command.usage() {
        if parsed.arguments.is_empty() {
            parsed
                .context
                .send_message(usage)
                .await
                .context("Failed to send usage hint")?;
            return Ok(Outcome::Usage);
        }
    }

    command.execute(parsed).await?;

    let response = parsed
        .response()
        .with_context(|| format!("Command {} finished without a response", command.name()))?;
    send_response(&parsed.context, response).await?;
    Ok(Outcome::Sent)
}

/// Send through the richest capability that fits: photo, document, short
/// link, then plain text.
pub async fn send_response(ctx: &ChatContext, response: &str) -> Result<()> {
    let trimmed = response.trim();
    let sender = ctx.sender();

    if is_image_like(trimmed) && ctx.supports(Capabilities::PHOTO) {
        return sender.send_photo(ctx, trimmed).await;
    }
    if is_single_url(trimmed) {
        if is_document_like(trimmed) && ctx.supports(Capabilities::DOCUMENT) {
            return sender.send_document(ctx, trimmed).await;
        }
        if ctx.supports(Capabilities::SHORT_LINK) {
            return sender.send_shortened_url(ctx, trimmed).await;
        }
    }

    let text = truncate_message(response, ctx.max_message_length);
    sender.send_message(ctx, &text).await
}

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".webp"];
const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".txt", ".zip"];

fn is_single_url(text: &str) -> bool {
    (text.starts_with("http://") || text.starts_with("https://"))
        && !text.contains(char::is_whitespace)
}

fn url_path_ends_with(text: &str, extensions: &[&str]) -> bool {
    let path = text.split(['?', '#']).next().unwrap_or(text).to_lowercase();
    extensions.iter().any(|ext| path.ends_with(ext))
}

fn is_image_like(text: &str) -> bool {
    text.starts_with("data:image/")
        || (is_single_url(text) && url_path_ends_with(text, IMAGE_EXTENSIONS))
}

fn is_document_like(text: &str) -> bool {
    url_path_ends_with(text, DOCUMENT_EXTENSIONS)
}

/// Cut `text` to at most `max_chars` characters, preferring a newline or
/// space boundary.
pub fn truncate_message(text: &str, max_chars: usize) -> String {
    let Some((end, _)) = text.char_indices().nth(max_chars) else {
        return text.to_string();
    };
    let head = &text[..end];
    let cut = head
        .rfind('\n')
        .or_else(|| head.rfind(' '))
        .filter(|pos| *pos > 0)
        .unwrap_or(end);
    text[..cut].trim_end().to_string()
}
