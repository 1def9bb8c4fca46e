//! Trade plan entity and lifecycle status.

use crate::domain::{Decimal, PlanId, Symbol, TimeMs};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a trade plan.
///
/// `Pending` plans hold no shares; the first entry fill opens them. `Closed`
/// and `Cancelled` are terminal; no mutation is permitted afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanStatus {
    Pending,
    Open,
    Closed,
    Cancelled,
}

impl PlanStatus {
    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "PENDING",
            PlanStatus::Open => "OPEN",
            PlanStatus::Closed => "CLOSED",
            PlanStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse the storage representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PlanStatus::Pending),
            "OPEN" => Some(PlanStatus::Open),
            "CLOSED" => Some(PlanStatus::Closed),
            "CANCELLED" => Some(PlanStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states accept no further business transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Closed | PlanStatus::Cancelled)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One trading idea/position, long-only.
///
/// The planned fields are what the trader committed to before entry; the
/// derived fields (`avg_entry_price`, `total_quantity`, `remaining_quantity`,
/// `realized_pnl`) are owned by the cost-basis engine and only ever change
/// through a ledger append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradePlan {
    pub id: PlanId,
    pub symbol: Symbol,
    pub display_name: Option<String>,

    // Planned economics.
    pub planned_entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub planned_quantity: i64,
    pub risk_reward_ratio: Decimal,
    pub entry_logic: String,

    // Derived economics, replayable from the event ledger.
    pub avg_entry_price: Option<Decimal>,
    pub total_quantity: i64,
    pub remaining_quantity: i64,
    pub realized_pnl: Decimal,

    pub status: PlanStatus,
    pub created_at: TimeMs,
    pub closed_at: Option<TimeMs>,
}

impl TradePlan {
    /// True if the plan currently holds shares.
    pub fn has_open_position(&self) -> bool {
        self.remaining_quantity > 0
    }
}

/// Close record written when a plan reaches `Closed`, either by an explicit
/// close or by a trim that empties the position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeExecution {
    pub id: i64,
    pub plan_id: PlanId,
    pub exit_price: Decimal,
    /// Final cumulative realized PnL, trims included.
    pub realized_pnl: Decimal,
    pub exit_logic: String,
    pub emotional_state: Option<String>,
    pub created_at: TimeMs,
}
