//! Dashboard projector: read-only composition of a plan with a live price.
//!
//! Never mutates plan state; calling it twice with the same inputs yields
//! identical output.

use crate::domain::{Decimal, PlanStatus, TradePlan};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fraction of the stop-to-target span within which a price counts as
/// dangerously close to the stop.
fn danger_band() -> Decimal {
    Decimal::from_i64(15) / Decimal::hundred()
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectError {
    #[error("plan has no position to project (no entry recorded)")]
    NoPosition,
}

/// Risk banding for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Safe,
    Danger,
}

/// Mark-to-market view of an open plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub current_price: Decimal,
    /// Unrealized PnL on the open remainder only; realized PnL is carried
    /// separately on the plan.
    pub pnl_amount: Decimal,
    pub pnl_percentage: Decimal,
    pub distance_to_stop_loss: Decimal,
    pub risk_level: RiskLevel,
    /// Unrealized PnL normalized by the capital at risk. `None` when the
    /// risk distance or remaining quantity is zero: not displayable, never
    /// zero.
    pub r_multiple: Option<Decimal>,
}

/// Project a plan against an externally supplied current price.
///
/// # Errors
/// `NoPosition` when the plan has never recorded an entry.
pub fn project(plan: &TradePlan, current_price: Decimal) -> Result<DashboardView, ProjectError> {
    let avg_entry = plan.avg_entry_price.ok_or(ProjectError::NoPosition)?;
    let remaining = Decimal::from_i64(plan.remaining_quantity);

    let price_diff = current_price - avg_entry;
    let pnl_amount = (price_diff * remaining).round_dp(2);

    let pnl_percentage = if avg_entry.is_positive() {
        (price_diff / avg_entry * Decimal::hundred()).round_dp(2)
    } else {
        Decimal::zero()
    };

    // Long-only: positive means the price is still above the stop.
    let distance_to_stop_loss = (current_price - plan.stop_loss).round_dp(2);

    let risk_level = classify_risk(current_price, plan.stop_loss, plan.take_profit);

    let risk_per_share = (avg_entry - plan.stop_loss).abs();
    let r_multiple = if risk_per_share.is_zero() || plan.remaining_quantity == 0 {
        None
    } else {
        Some((pnl_amount / (risk_per_share * remaining)).round_dp(2))
    };

    Ok(DashboardView {
        current_price,
        pnl_amount,
        pnl_percentage,
        distance_to_stop_loss,
        risk_level,
        r_multiple,
    })
}

/// Danger when the price has crossed to within a fixed fraction of the
/// stop-to-target span above the stop, or sits at/below the stop.
fn classify_risk(current: Decimal, stop: Decimal, target: Decimal) -> RiskLevel {
    if current <= stop {
        return RiskLevel::Danger;
    }
    let span = (target - stop).abs();
    let band = span * danger_band();
    if current - stop <= band {
        RiskLevel::Danger
    } else {
        RiskLevel::Safe
    }
}

/// True for plans the live dashboard should include.
pub fn is_projectable(plan: &TradePlan) -> bool {
    plan.status == PlanStatus::Open && plan.avg_entry_price.is_some()
}
