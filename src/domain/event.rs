//! Immutable transaction ledger entries.
//!
//! Events are append-only: every change to a plan's derived economics is the
//! result of exactly one appended event, and replaying the events in
//! (timestamp, insertion) order must reproduce the stored aggregates.

use crate::domain::{Decimal, PlanId, TimeMs};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    InitialEntry,
    AddPosition,
    PartialExit,
    FullExit,
}

impl EventKind {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::InitialEntry => "INITIAL_ENTRY",
            EventKind::AddPosition => "ADD_POSITION",
            EventKind::PartialExit => "PARTIAL_EXIT",
            EventKind::FullExit => "FULL_EXIT",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIAL_ENTRY" => Some(EventKind::InitialEntry),
            "ADD_POSITION" => Some(EventKind::AddPosition),
            "PARTIAL_EXIT" => Some(EventKind::PartialExit),
            "FULL_EXIT" => Some(EventKind::FullExit),
            _ => None,
        }
    }

    /// True for events that buy shares.
    pub fn is_buy(&self) -> bool {
        matches!(self, EventKind::InitialEntry | EventKind::AddPosition)
    }

    /// True for events that sell shares.
    pub fn is_sell(&self) -> bool {
        matches!(self, EventKind::PartialExit | EventKind::FullExit)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single economic event on a plan's ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEvent {
    /// Database rowid; ties insertion order for same-timestamp events.
    pub id: i64,
    /// Stable unique key, assigned at append time.
    pub event_key: String,
    pub plan_id: PlanId,
    pub kind: EventKind,
    pub price: Decimal,
    pub quantity: i64,
    pub timestamp: TimeMs,
    /// Rationale recorded at the time of the action.
    pub logic_snapshot: Option<String>,
}

impl TransactionEvent {
    /// Generate a fresh stable key for a new event.
    pub fn new_event_key() -> String {
        Uuid::new_v4().to_string()
    }
}
