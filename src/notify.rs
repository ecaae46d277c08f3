//! Rejection notification seam.
//!
//! Delivery (email or otherwise) is an external concern; the engine only
//! dispatches the event, best-effort, after the rejection is durably
//! committed. A failed notification never fails the rejection.

pub trait Notifier: Send + Sync {
    fn notify_rejected(
        &self,
        document_id: &str,
        rejected_by: &str,
        reason: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// Default notifier that only emits a structured log line. Useful in tests
/// and anywhere a real delivery channel is not wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_rejected(
        &self,
        document_id: &str,
        rejected_by: &str,
        reason: Option<&str>,
    ) -> anyhow::Result<()> {
        tracing::info!(
            document_id,
            rejected_by,
            reason = reason.unwrap_or("-"),
            "rejection notice"
        );
        Ok(())
    }
}
