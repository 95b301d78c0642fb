//! Append-only workflow audit log.
//!
//! Every state mutation appends exactly one [`WorkflowEvent`]. Records are
//! immutable and ordered by a monotonically increasing sequence number, so
//! reads are reproducible; this is the audit surface behind "archival, not
//! deletion".

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::ActorId;

/// All recognised workflow event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    WasteDeclared,
    RequestOpened,
    RequestClaimed,
    RequestRejected,
    RequestExpired,
    DeliveryCompleted,
    PointsCredited,
    PointsRedeemed,
    BatchListed,
    ProduceListed,
    PurchaseCompleted,
}

impl EventKind {
    /// Short identifier string, stable across releases.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WasteDeclared => "waste_declared",
            Self::RequestOpened => "request_opened",
            Self::RequestClaimed => "request_claimed",
            Self::RequestRejected => "request_rejected",
            Self::RequestExpired => "request_expired",
            Self::DeliveryCompleted => "delivery_completed",
            Self::PointsCredited => "points_credited",
            Self::PointsRedeemed => "points_redeemed",
            Self::BatchListed => "batch_listed",
            Self::ProduceListed => "produce_listed",
            Self::PurchaseCompleted => "purchase_completed",
        }
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub seq: u64,
    pub kind: EventKind,
    /// The entity the event is about (lot, request, batch, produce id).
    pub subject_id: Option<u64>,
    /// The actor that caused it, when one did.
    pub actor_id: Option<ActorId>,
    pub detail: String,
    pub at: DateTime<Utc>,
}

pub struct EventLog {
    entries: RwLock<Vec<WorkflowEvent>>,
    next_seq: AtomicU64,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn append(
        &self,
        kind: EventKind,
        subject_id: Option<u64>,
        actor_id: Option<ActorId>,
        detail: impl Into<String>,
        at: DateTime<Utc>,
    ) -> WorkflowEvent {
        let event = WorkflowEvent {
            seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
            kind,
            subject_id,
            actor_id,
            detail: detail.into(),
            at,
        };
        self.entries
            .write()
            .expect("event log lock poisoned")
            .push(event.clone());
        event
    }

    /// All events, sequence ascending.
    pub fn all(&self) -> Vec<WorkflowEvent> {
        self.entries
            .read()
            .expect("event log lock poisoned")
            .clone()
    }

    /// Events about one subject, sequence ascending.
    pub fn for_subject(&self, subject_id: u64) -> Vec<WorkflowEvent> {
        self.entries
            .read()
            .expect("event log lock poisoned")
            .iter()
            .filter(|ev| ev.subject_id == Some(subject_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("event log lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
