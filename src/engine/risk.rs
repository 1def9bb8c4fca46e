//! Risk guard: pre-trade discipline checks.
//!
//! Purely functional; nothing here touches storage. The same checks gate
//! plan creation and every later quantity-bearing operation.

use crate::domain::Decimal;
use thiserror::Error;

/// Errors raised by the risk guard.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RiskError {
    #[error("entry price equals stop loss; risk distance is zero")]
    ZeroRiskDistance,
    #[error("risk/reward ratio {0} is below 1.0; plan rejected")]
    CriticalRiskReward(Decimal),
    #[error("quantity {quantity} is not a positive multiple of the lot size {lot_size}")]
    InvalidLot { quantity: i64, lot_size: i64 },
}

/// Outcome of the risk/reward screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskVerdict {
    /// Ratio >= 1.5.
    Clean,
    /// Ratio in [1.0, 1.5): tradeable, but the caller should surface a
    /// discipline warning.
    Warning,
}

/// Result of assessing a plan's planned economics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskAssessment {
    pub ratio: Decimal,
    pub verdict: RiskVerdict,
}

impl RiskAssessment {
    /// True when the caller should show a non-blocking discipline warning.
    pub fn warns(&self) -> bool {
        self.verdict == RiskVerdict::Warning
    }
}

/// Pre-trade validation rules, parameterized by the market's lot size.
#[derive(Debug, Clone, Copy)]
pub struct RiskGuard {
    lot_size: i64,
}

/// Threshold below which a plan is rejected outright.
fn critical_ratio() -> Decimal {
    Decimal::from_i64(1)
}

/// Threshold above which a plan passes without a warning.
fn clean_ratio() -> Decimal {
    Decimal::from_i64(3) / Decimal::from_i64(2)
}

impl RiskGuard {
    /// Create a guard for the given lot size (shares per lot).
    pub fn new(lot_size: i64) -> Self {
        RiskGuard { lot_size }
    }

    /// The configured lot size.
    pub fn lot_size(&self) -> i64 {
        self.lot_size
    }

    /// Reward distance divided by risk distance: `|target - entry| / |entry - stop|`.
    ///
    /// # Errors
    /// `ZeroRiskDistance` when entry equals stop.
    pub fn risk_reward_ratio(
        entry: Decimal,
        stop: Decimal,
        target: Decimal,
    ) -> Result<Decimal, RiskError> {
        let risk = (entry - stop).abs();
        if risk.is_zero() {
            return Err(RiskError::ZeroRiskDistance);
        }
        let reward = (target - entry).abs();
        Ok(reward / risk)
    }

    /// Screen the planned economics.
    ///
    /// Ratio below 1.0 blocks the plan; [1.0, 1.5) passes with a warning the
    /// caller is expected to surface; 1.5 and above passes clean.
    ///
    /// # Errors
    /// `ZeroRiskDistance` or `CriticalRiskReward`.
    pub fn assess(
        &self,
        entry: Decimal,
        stop: Decimal,
        target: Decimal,
    ) -> Result<RiskAssessment, RiskError> {
        let ratio = Self::risk_reward_ratio(entry, stop, target)?;

        if ratio < critical_ratio() {
            return Err(RiskError::CriticalRiskReward(ratio));
        }
        let verdict = if ratio < clean_ratio() {
            RiskVerdict::Warning
        } else {
            RiskVerdict::Clean
        };
        Ok(RiskAssessment { ratio, verdict })
    }

    /// Position size from capital at risk:
    /// `floor(capital * risk_percent / |entry - stop|)`, floored to a lot
    /// multiple, minimum one lot.
    ///
    /// # Errors
    /// `ZeroRiskDistance` when entry equals stop.
    pub fn suggested_position_size(
        &self,
        capital: Decimal,
        risk_percent: Decimal,
        entry: Decimal,
        stop: Decimal,
    ) -> Result<i64, RiskError> {
        let risk_distance = (entry - stop).abs();
        if risk_distance.is_zero() {
            return Err(RiskError::ZeroRiskDistance);
        }

        let raw = (capital * risk_percent / risk_distance).floor_to_i64();
        let lots = std::cmp::max(1, raw / self.lot_size);
        Ok(lots * self.lot_size)
    }

    /// Reject any quantity that is not a positive multiple of the lot size.
    /// Never rounds.
    ///
    /// # Errors
    /// `InvalidLot`.
    pub fn validate_lot(&self, quantity: i64) -> Result<(), RiskError> {
        if quantity <= 0 || quantity % self.lot_size != 0 {
            return Err(RiskError::InvalidLot {
                quantity,
                lot_size: self.lot_size,
            });
        }
        Ok(())
    }
}
