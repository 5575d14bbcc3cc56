use async_trait::async_trait;
use tracing::info;

/// Best-effort notification channel. Returns whether the send was accepted;
/// callers never roll back state on a `false`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> bool;
}

/// Logs the notification instead of delivering it. Stands in until a real
/// transport (SMTP, webhook) is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, recipients: &[String], subject: &str, body: &str) -> bool {
        info!(
            event_name = "notify.logged",
            recipients = recipients.join(", "),
            subject,
            body,
        );
        true
    }
}
