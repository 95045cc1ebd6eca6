use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bookkeeping for one record instance. Never persisted with the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// When the record last became attached (commit or load).
    pub attached_at: Option<DateTime<Utc>>,
    /// When the last partial update was sent.
    pub last_update_at: Option<DateTime<Utc>>,
    /// Partial updates sent to the gateway.
    pub updates_sent: u64,
    /// Mutations that reached the record funnel.
    pub mutations_observed: u64,
    /// Mutations dropped because the record was detached.
    pub mutations_suppressed: u64,
}

impl RecordMetadata {
    pub(crate) fn attached(&mut self, now: DateTime<Utc>) {
        self.attached_at = Some(now);
    }

    pub(crate) fn detached(&mut self) {
        self.attached_at = None;
    }

    pub(crate) fn observed(&mut self) {
        self.mutations_observed += 1;
    }

    pub(crate) fn suppressed(&mut self) {
        self.mutations_suppressed += 1;
    }

    pub(crate) fn update_sent(&mut self, now: DateTime<Utc>) {
        self.updates_sent += 1;
        self.last_update_at = Some(now);
    }
}
