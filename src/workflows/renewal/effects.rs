use serde::Serialize;

use super::domain::{Application, Notification, NotificationChannel, NotificationType};
use super::status::ApplicationStatus;
use super::store::NotificationDispatcher;

/// An action contractually tied to a specific transition, beyond the status
/// write and history entry themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEffect {
    NotifyClient {
        kind: NotificationType,
        title: &'static str,
        body: &'static str,
        action_url: &'static str,
    },
}

/// The declarative map from a committed `(from, to)` pair to its effects.
/// Most pairs carry no effect beyond the history entry, so the default arm is
/// empty; this is a lookup, not an on-every-transition hook. Payment notices
/// live in the billing service, keyed on the payment event rather than the
/// status entry, so a bare staff transition never fires them.
pub fn effects_for(_from: ApplicationStatus, to: ApplicationStatus) -> &'static [TransitionEffect] {
    match to {
        ApplicationStatus::PassportIssued => &[TransitionEffect::NotifyClient {
            kind: NotificationType::PassportReady,
            title: "Passport Issued",
            body: "Your new passport has been issued. Please confirm collection.",
            action_url: "/dashboard",
        }],
        _ => &[],
    }
}

/// Reported to the caller when a non-primary action fails after the status
/// write committed. Never rolls the transition back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideEffectWarning {
    pub effect: String,
    pub error: String,
}

/// Run every effect for the committed pair, catching each failure
/// individually so partial delivery cannot poison the transition.
pub(crate) fn dispatch<N>(
    notifier: &N,
    application: &Application,
    from: ApplicationStatus,
    to: ApplicationStatus,
) -> Vec<SideEffectWarning>
where
    N: NotificationDispatcher + ?Sized,
{
    let mut warnings = Vec::new();

    for effect in effects_for(from, to) {
        match *effect {
            TransitionEffect::NotifyClient {
                kind,
                title,
                body,
                action_url,
            } => {
                let notification = Notification {
                    recipient_id: application.client_id.clone(),
                    application_id: Some(application.id.clone()),
                    kind,
                    title: title.to_string(),
                    body: body.to_string(),
                    action_url: Some(action_url.to_string()),
                    channel: NotificationChannel::Both,
                };
                if let Err(error) = notifier.notify(notification) {
                    warnings.push(SideEffectWarning {
                        effect: format!("notify_client:{title}"),
                        error: error.to_string(),
                    });
                }
            }
        }
    }

    warnings
}
