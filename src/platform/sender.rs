use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{Capabilities, ChatContext};

/// Outbound side of a chat backend.
///
/// Only `send_message` is mandatory. The richer operations are checked through
/// [`MessageSender::capabilities`]; callers must check the matching flag
/// before invoking one, the default bodies just refuse.
#[async_trait]
pub trait MessageSender: Send + Sync {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }

    async fn send_message(&self, ctx: &ChatContext, text: &str) -> Result<()>;

    /// `photo` is either a URL or a `data:image/...;base64,` payload.
    async fn send_photo(&self, ctx: &ChatContext, _photo: &str) -> Result<()> {
        bail!("{} does not support photos", ctx.platform())
    }

    async fn send_document(&self, ctx: &ChatContext, _url: &str) -> Result<()> {
        bail!("{} does not support documents", ctx.platform())
    }

    async fn send_shortened_url(&self, ctx: &ChatContext, _url: &str) -> Result<()> {
        bail!("{} does not support link shortening", ctx.platform())
    }

    /// Delete the `count` most recent messages ending with the one in `ctx`.
    async fn delete_messages(&self, ctx: &ChatContext, _count: usize) -> Result<()> {
        bail!("{} does not support deleting messages", ctx.platform())
    }

    /// Platform preparation before a response, e.g. a typing indicator.
    async fn prepare_message(&self, _ctx: &ChatContext) -> Result<()> {
        Ok(())
    }
}
