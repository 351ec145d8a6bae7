//! Mail notification of the run result.
//!
//! Notification is advisory: missing configuration or delivery faults are
//! reported as a [`Delivery`] value and never affect the exit code.

pub mod smtp;

pub use smtp::{MailTransport, OutgoingMail, SmtpMailer};

use crate::models::RunStatus;
use tracing::{info, warn};

/// Why no mail was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Sender address or mail password is not configured.
    NotConfigured,
    /// Neither a committer email nor a sender address is available.
    NoRecipient,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotConfigured => write!(f, "SENDER_EMAIL or GEMINI_APP_PASSWORD missing"),
            SkipReason::NoRecipient => write!(f, "no recipient address"),
        }
    }
}

/// What happened to the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { recipient: String },
    Skipped(SkipReason),
    Failed { recipient: String, reason: String },
}

/// Mail subject for a run verdict.
pub fn subject(project_name: &str, status: RunStatus) -> String {
    match status {
        RunStatus::Success => format!("Success: {} — Code validé", project_name),
        RunStatus::Failure => format!("Failure: {} — Erreurs détectées", project_name),
    }
}

/// Committer email if present, otherwise the sender address.
pub fn resolve_recipient(committer: Option<&str>, sender: Option<&str>) -> Option<String> {
    fn usable(address: Option<&str>) -> Option<&str> {
        address.map(str::trim).filter(|a| !a.is_empty())
    }

    usable(committer).or_else(|| usable(sender)).map(str::to_string)
}

/// Sends the run result to the committer.
pub struct Notifier {
    transport: Option<Box<dyn MailTransport>>,
    sender: Option<String>,
    project_name: String,
}

impl Notifier {
    /// `transport` is `None` when SMTP credentials are missing.
    pub fn new(
        transport: Option<Box<dyn MailTransport>>,
        sender: Option<String>,
        project_name: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            sender,
            project_name: project_name.into(),
        }
    }

    /// Notifier that never sends.
    pub fn disabled() -> Self {
        Self::new(None, None, String::new())
    }

    /// Send at most one mail describing `status`, with `body` as content.
    pub async fn notify(&self, status: RunStatus, body: &str, committer: Option<&str>) -> Delivery {
        let (Some(transport), Some(sender)) = (self.transport.as_deref(), self.sender.as_deref())
        else {
            warn!("Mail disabled ({})", SkipReason::NotConfigured);
            return Delivery::Skipped(SkipReason::NotConfigured);
        };

        let Some(recipient) = resolve_recipient(committer, Some(sender)) else {
            warn!("No recipient, mail skipped");
            return Delivery::Skipped(SkipReason::NoRecipient);
        };

        let mail = OutgoingMail {
            from: sender.to_string(),
            to: recipient.clone(),
            subject: subject(&self.project_name, status),
            body: body.to_string(),
            html: body.trim_start().starts_with('<'),
        };

        match transport.send(&mail).await {
            Ok(()) => {
                info!("Mail sent to {}", recipient);
                Delivery::Sent { recipient }
            }
            Err(e) => {
                warn!("Failed to send mail to {}: {}", recipient, e);
                Delivery::Failed {
                    recipient,
                    reason: e.to_string(),
                }
            }
        }
    }
}
