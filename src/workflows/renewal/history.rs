use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::StatusHistoryEntry;
use super::status::ApplicationStatus;
use super::transitions::is_legal_transition;

/// Row shape for timeline display.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntryView {
    pub from: Option<&'static str>,
    pub from_label: Option<&'static str>,
    pub to: &'static str,
    pub to_label: &'static str,
    pub changed_by: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Project a creation-ordered history into display rows, most recent first.
pub fn timeline(entries: &[StatusHistoryEntry]) -> Vec<TimelineEntryView> {
    let mut views: Vec<TimelineEntryView> = entries
        .iter()
        .map(|entry| TimelineEntryView {
            from: entry.from.map(|status| status.as_str()),
            from_label: entry.from.map(|status| status.label()),
            to: entry.to.as_str(),
            to_label: entry.to.label(),
            changed_by: entry.changed_by.0.clone(),
            reason: entry.reason.clone(),
            created_at: entry.created_at,
        })
        .collect();
    views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    views
}

/// Replay a creation-ordered history and check it walks the transition table:
/// the opening entry has no prior status, every later entry continues from the
/// previous one, and every edge is legal. The KYC clear auto-advance writes
/// the one edge the table does not list (`client_request` straight to
/// `invoice_sent`), so that pair is accepted too. Anything else means the
/// journal was tampered with or a write bypassed the engine.
pub fn replay_is_legal(entries: &[StatusHistoryEntry]) -> bool {
    let mut previous = None;
    for (position, entry) in entries.iter().enumerate() {
        match (position, entry.from) {
            (0, None) => {}
            (0, Some(_)) | (_, None) => return false,
            (_, Some(from)) => {
                if previous != Some(from) || !is_replayable_edge(from, entry.to) {
                    return false;
                }
            }
        }
        previous = Some(entry.to);
    }
    true
}

fn is_replayable_edge(from: ApplicationStatus, to: ApplicationStatus) -> bool {
    is_legal_transition(from, to)
        || (from == ApplicationStatus::ClientRequest && to == ApplicationStatus::InvoiceSent)
}
