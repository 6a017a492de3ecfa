//! Notification delivery (spec §6 "Notification channel"): the default
//! `NotificationSender` wired into the binary, logging each chunk instead
//! of actually calling out to a channel — there is no outbound Telegram/
//! WhatsApp transport in this workspace, only the Gateway's own HTTP/CLI
//! surfaces, so delivery is observable via logs until a real channel
//! adapter is added.

use async_trait::async_trait;
use hive_core::Result;
use tracing::info;

use hive_workflow::NotificationSender;

/// Logs each chunk at `info` instead of delivering it anywhere.
#[derive(Debug, Default)]
pub struct LoggingNotificationSender;

#[async_trait]
impl NotificationSender for LoggingNotificationSender {
    async fn send_chunk(&self, channel: &str, recipient: &str, chunk: &str) -> Result<()> {
        info!(channel, recipient, chunk_len = chunk.len(), "{chunk}");
        Ok(())
    }
}
