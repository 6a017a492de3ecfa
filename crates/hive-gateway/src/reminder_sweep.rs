//! Reminder sweeper (spec §5, ambient actor list: "the reminder sweeper
//! (60 s tick)"). Mirrors `hive-scheduler`'s tick-loop/`CancellationToken`
//! shutdown shape, but needs no per-item task or missed-run catch-up: every
//! tick scans for reminders whose `dueAt` has passed and delivers each one
//! exactly once via `mark_reminder_notified`'s atomic unique-winner update.

use std::sync::Arc;
use std::time::Duration;

use hive_core::time::now_rfc3339;
use hive_store::types::{MessageRole, Reminder};
use hive_store::Store;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hive_workflow::NotificationSender;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CHANNEL: &str = "cli";

/// Polls `Store::due_reminders` every 60 s and delivers each newly-due
/// reminder through `notifier`, persisting an assistant turn so the
/// delivery shows up in the user's conversation history.
pub struct ReminderSweeper {
    store: Arc<Store>,
    notifier: Arc<dyn NotificationSender>,
    chunk_size: usize,
}

impl ReminderSweeper {
    pub fn new(store: Arc<Store>, notifier: Arc<dyn NotificationSender>, chunk_size: usize) -> Self {
        Self { store, notifier, chunk_size }
    }

    /// Runs the sweep loop until `cancel` fires. Intended to be spawned as
    /// its own task from the composition root alongside the scheduler.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("reminder sweeper cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep().await {
                        error!(error = %err, "reminder sweep failed");
                    }
                }
            }
        }
    }

    async fn sweep(&self) -> hive_core::Result<()> {
        let now = now_rfc3339();
        for reminder in self.store.due_reminders(&now)? {
            if let Err(err) = self.deliver(&reminder).await {
                warn!(reminder_id = %reminder.id, error = %err, "failed to deliver reminder");
            }
        }
        Ok(())
    }

    async fn deliver(&self, reminder: &Reminder) -> hive_core::Result<()> {
        if !self.store.mark_reminder_notified(&reminder.id)? {
            // Another sweep tick already claimed it.
            return Ok(());
        }

        let recipient = match self.store.first_identity_for_channel(&reminder.user_id, DEFAULT_CHANNEL)? {
            Some(identity) => identity.channel_user_id,
            None => reminder.user_id.clone(),
        };

        let text = format!("Reminder: {}", reminder.text);
        for chunk in hive_workflow::chunk_message(&text, self.chunk_size) {
            self.notifier.send_chunk(DEFAULT_CHANNEL, &recipient, &chunk).await?;
        }

        let conversation = self.store.open_or_create_conversation(&reminder.user_id, None)?;
        self.store
            .append_message(&conversation.id, MessageRole::Assistant, &format!("\u{23F0} {text}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingNotifier {
        async fn send_chunk(&self, channel: &str, recipient: &str, chunk: &str) -> hive_core::Result<()> {
            self.sent.lock().unwrap().push((channel.to_string(), recipient.to_string(), chunk.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn due_reminder_is_delivered_exactly_once() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        let reminder = store.add_reminder("alice", "water the plants", Some("2020-01-01T00:00:00Z")).unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(store.clone(), notifier.clone(), 4096);

        sweeper.sweep().await.unwrap();
        sweeper.sweep().await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].2.contains("water the plants"));

        let reloaded = store.get_reminder(&reminder.id).unwrap().unwrap();
        assert!(reloaded.notified_at.is_some());
    }

    #[tokio::test]
    async fn future_reminder_is_not_delivered() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        store.ensure_user("alice").unwrap();
        store.add_reminder("alice", "later", Some("2999-01-01T00:00:00Z")).unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(store.clone(), notifier.clone(), 4096);
        sweeper.sweep().await.unwrap();

        assert!(notifier.sent.lock().unwrap().is_empty());
    }
}
