use cove_types::models::Invitation;
use tracing::info;

/// Outbound invitation mail, as seen from the core: fire-and-forget. The
/// orchestrator logs a failure and moves on — a created invitation is never
/// rolled back because delivery hiccupped.
pub trait Notifier: Send + Sync {
    fn send_invitation(
        &self,
        to: &str,
        invitation: &Invitation,
        channel_name: &str,
    ) -> anyhow::Result<()>;
}

/// Default notifier: writes the invitation to the log. Actual delivery
/// transport is the embedding application's concern.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_invitation(
        &self,
        to: &str,
        invitation: &Invitation,
        channel_name: &str,
    ) -> anyhow::Result<()> {
        info!(
            invitation_id = %invitation.id,
            to,
            channel = channel_name,
            "invitation notification"
        );
        Ok(())
    }
}
