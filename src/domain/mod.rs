//! Domain types: decimal arithmetic, identifiers, plans, and ledger events.

pub mod decimal;
pub mod event;
pub mod plan;
pub mod primitives;

pub use decimal::Decimal;
pub use event::{EventKind, TransactionEvent};
pub use plan::{PlanStatus, TradeExecution, TradePlan};
pub use primitives::{PlanId, Symbol, TimeMs};
