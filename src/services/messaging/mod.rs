pub mod twilio;

use async_trait::async_trait;

/// Outbound text channel. Errors propagate on the primary webhook reply;
/// courtesy paths (reminders, nudges, reward congratulations) log and move on.
#[async_trait]
pub trait MessagingProvider: Send + Sync {
    async fn send_message(&self, to: &str, body: &str) -> anyhow::Result<()>;
}
