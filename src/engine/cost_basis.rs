//! Cost-basis engine: a pure fold from ledger events to plan aggregates.
//!
//! Buys move the weighted-average entry price; sells book realized PnL
//! against the average and leave it untouched. Replaying a plan's full event
//! history must always reproduce the aggregates stored on the plan row; the
//! lifecycle service verifies this after every mutation.

use crate::domain::{Decimal, EventKind, TradePlan, TransactionEvent};
use thiserror::Error;

/// Errors surfaced while folding ledger events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("exit quantity {requested} exceeds remaining position {remaining}")]
    OverExit { requested: i64, remaining: i64 },
    #[error("event quantity must be positive, got {0}")]
    NonPositiveQuantity(i64),
    #[error("sell event before any entry on the plan's ledger")]
    SellBeforeEntry,
}

/// Derived economics of a plan, reproducible from its event ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Aggregates {
    /// Total cost of all buys; the numerator of the weighted average.
    total_cost: Decimal,
    /// Cumulative quantity ever bought (never reduced by exits).
    pub total_quantity: i64,
    /// Current open size.
    pub remaining_quantity: i64,
    /// Cumulative booked PnL from exits.
    pub realized_pnl: Decimal,
}

impl Aggregates {
    /// Empty position, no events applied.
    pub fn new() -> Self {
        Aggregates::default()
    }

    /// Weighted-average entry price; defined only once shares were bought.
    pub fn avg_entry_price(&self) -> Option<Decimal> {
        if self.total_quantity > 0 {
            Some(self.total_cost / Decimal::from_i64(self.total_quantity))
        } else {
            None
        }
    }

    /// Apply a single event in ledger order.
    ///
    /// # Errors
    /// `OverExit` if a sell exceeds the remaining position, `SellBeforeEntry`
    /// if a sell arrives before any buy, `NonPositiveQuantity` for a
    /// zero/negative quantity.
    pub fn apply(
        &mut self,
        kind: EventKind,
        price: Decimal,
        quantity: i64,
    ) -> Result<(), LedgerError> {
        if quantity <= 0 {
            return Err(LedgerError::NonPositiveQuantity(quantity));
        }

        if kind.is_buy() {
            self.total_cost = self.total_cost + price * Decimal::from_i64(quantity);
            self.total_quantity += quantity;
            self.remaining_quantity += quantity;
        } else {
            let avg = self.avg_entry_price().ok_or(LedgerError::SellBeforeEntry)?;
            if quantity > self.remaining_quantity {
                return Err(LedgerError::OverExit {
                    requested: quantity,
                    remaining: self.remaining_quantity,
                });
            }
            // Exits never move the average; they realize against it.
            self.realized_pnl =
                self.realized_pnl + (price - avg) * Decimal::from_i64(quantity);
            self.remaining_quantity -= quantity;
        }

        Ok(())
    }

    /// True when these aggregates equal the ones stored on a plan row.
    pub fn matches_plan(&self, plan: &TradePlan) -> bool {
        self.avg_entry_price() == plan.avg_entry_price
            && self.total_quantity == plan.total_quantity
            && self.remaining_quantity == plan.remaining_quantity
            && self.realized_pnl == plan.realized_pnl
    }
}

/// Fold a plan's full event history, in (timestamp, insertion) order.
///
/// Idempotent: the result depends only on the events, never on stored state.
///
/// # Errors
/// Propagates the first `LedgerError` encountered.
pub fn replay(events: &[TransactionEvent]) -> Result<Aggregates, LedgerError> {
    let mut aggregates = Aggregates::new();
    for event in events {
        aggregates.apply(event.kind, event.price, event.quantity)?;
    }
    Ok(aggregates)
}
