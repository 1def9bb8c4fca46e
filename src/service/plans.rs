//! Plan lifecycle service.
//!
//! Every mutating operation follows the same shape: take the plan's mutation
//! lock, load the plan and its ledger, verify the stored aggregates still
//! replay from the ledger, apply the new event through the cost-basis engine,
//! persist plan + event (+ close record) in one transaction, then verify the
//! replay again against what was stored. A divergence at either point aborts
//! with a consistency fault.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::db::repo::{NewEvent, NewExecution, NewPlan};
use crate::db::{Repository, Settings};
use crate::domain::{
    Decimal, EventKind, PlanId, PlanStatus, Symbol, TimeMs, TradeExecution, TradePlan,
    TransactionEvent,
};
use crate::engine::{replay, Aggregates, RiskAssessment, RiskGuard};
use crate::error::AppError;

use super::locks::PlanLocks;

/// Inputs for creating a plan. Quantity is optional: when omitted, the
/// position is sized from the capital-at-risk settings.
#[derive(Debug, Clone)]
pub struct CreatePlan {
    pub symbol: String,
    pub display_name: Option<String>,
    pub planned_entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub quantity: Option<i64>,
    pub entry_logic: String,
}

/// Inputs for the initial entry fill. Quantity defaults to the planned
/// quantity when omitted.
#[derive(Debug, Clone)]
pub struct ExecuteFill {
    pub price: Decimal,
    pub quantity: Option<i64>,
    pub logic: Option<String>,
}

/// Inputs for adding to an open position.
#[derive(Debug, Clone)]
pub struct AddFill {
    pub price: Decimal,
    pub quantity: i64,
    pub logic: Option<String>,
}

/// Inputs for a partial exit. Stop and target may be moved at the same time.
#[derive(Debug, Clone)]
pub struct TrimFill {
    pub price: Decimal,
    pub quantity: i64,
    pub logic: Option<String>,
    pub new_stop_loss: Option<Decimal>,
    pub new_take_profit: Option<Decimal>,
    pub emotional_state: Option<String>,
}

/// Inputs for closing out the full remaining position.
#[derive(Debug, Clone)]
pub struct CloseFill {
    pub price: Decimal,
    pub exit_logic: String,
    pub emotional_state: Option<String>,
}

/// Orchestrates the plan lifecycle over the repository, the risk guard, and
/// the cost-basis engine.
pub struct PlanService {
    repo: Arc<Repository>,
    guard: RiskGuard,
    default_settings: Settings,
    locks: PlanLocks,
}

impl PlanService {
    pub fn new(repo: Arc<Repository>, guard: RiskGuard, default_settings: Settings) -> Self {
        PlanService {
            repo,
            guard,
            default_settings,
            locks: PlanLocks::new(),
        }
    }

    /// Create a plan in PENDING state. The risk guard screens the planned
    /// economics first; a ratio below 1.0 blocks creation outright, and a
    /// ratio in [1.0, 1.5) is returned as a warning for the caller to
    /// surface.
    pub async fn create_plan(
        &self,
        input: CreatePlan,
    ) -> Result<(TradePlan, RiskAssessment), AppError> {
        if input.symbol.trim().is_empty() {
            return Err(AppError::Validation("symbol must not be empty".to_string()));
        }
        if input.entry_logic.trim().is_empty() {
            return Err(AppError::Validation(
                "entry logic must not be empty".to_string(),
            ));
        }
        if !input.planned_entry_price.is_positive()
            || !input.stop_loss.is_positive()
            || !input.take_profit.is_positive()
        {
            return Err(AppError::Validation(
                "entry, stop loss and take profit must be positive".to_string(),
            ));
        }
        // Long-only: the stop protects below and the target sits above.
        if input.stop_loss >= input.planned_entry_price {
            return Err(AppError::Validation(
                "stop loss must be below the planned entry price".to_string(),
            ));
        }
        if input.take_profit <= input.planned_entry_price {
            return Err(AppError::Validation(
                "take profit must be above the planned entry price".to_string(),
            ));
        }

        let assessment = self.guard.assess(
            input.planned_entry_price,
            input.stop_loss,
            input.take_profit,
        )?;

        let quantity = match input.quantity {
            Some(quantity) => {
                self.guard.validate_lot(quantity)?;
                quantity
            }
            None => {
                let settings = self.repo.get_settings(self.default_settings).await?;
                self.guard.suggested_position_size(
                    settings.total_capital,
                    settings.risk_percent,
                    input.planned_entry_price,
                    input.stop_loss,
                )?
            }
        };

        let plan_id = self
            .repo
            .insert_plan(&NewPlan {
                symbol: Symbol::new(input.symbol.trim().to_string()),
                display_name: input.display_name,
                planned_entry_price: input.planned_entry_price,
                stop_loss: input.stop_loss,
                take_profit: input.take_profit,
                planned_quantity: quantity,
                risk_reward_ratio: assessment.ratio,
                entry_logic: input.entry_logic,
                created_at: TimeMs::now(),
            })
            .await?;

        let plan = self.must_get(plan_id).await?;
        info!(
            plan_id = %plan_id,
            symbol = %plan.symbol,
            ratio = %assessment.ratio,
            warning = assessment.warns(),
            "Created plan"
        );
        Ok((plan, assessment))
    }

    /// Record the initial entry fill: PENDING -> OPEN.
    pub async fn execute(
        &self,
        plan_id: PlanId,
        fill: ExecuteFill,
    ) -> Result<TradePlan, AppError> {
        let lock = self.locks.lock_for(plan_id);
        let _guard = lock.lock().await;

        let (plan, aggregates) = self.load_verified(plan_id).await?;
        if plan.status != PlanStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "plan {plan_id} is {}, only PENDING plans can be executed",
                plan.status
            )));
        }
        require_positive_price(fill.price)?;
        let quantity = fill.quantity.unwrap_or(plan.planned_quantity);
        self.guard.validate_lot(quantity)?;

        self.apply_and_commit(
            plan,
            aggregates,
            EventKind::InitialEntry,
            fill.price,
            quantity,
            fill.logic,
            None,
        )
        .await
        .map(|(plan, _)| plan)
    }

    /// Add shares to an OPEN position, rebasing the weighted average.
    pub async fn add_position(
        &self,
        plan_id: PlanId,
        fill: AddFill,
    ) -> Result<TradePlan, AppError> {
        let lock = self.locks.lock_for(plan_id);
        let _guard = lock.lock().await;

        let (plan, aggregates) = self.load_verified(plan_id).await?;
        require_open(&plan)?;
        require_positive_price(fill.price)?;
        self.guard.validate_lot(fill.quantity)?;

        self.apply_and_commit(
            plan,
            aggregates,
            EventKind::AddPosition,
            fill.price,
            fill.quantity,
            fill.logic,
            None,
        )
        .await
        .map(|(plan, _)| plan)
    }

    /// Sell part of an OPEN position, booking realized PnL against the
    /// average. The event is always recorded as a partial exit; a trim that
    /// empties the position additionally closes the plan and writes a close
    /// record, with the same final aggregates an explicit close would yield.
    pub async fn trim(
        &self,
        plan_id: PlanId,
        fill: TrimFill,
    ) -> Result<(TradePlan, Option<TradeExecution>), AppError> {
        let lock = self.locks.lock_for(plan_id);
        let _guard = lock.lock().await;

        let (mut plan, aggregates) = self.load_verified(plan_id).await?;
        require_open(&plan)?;
        require_positive_price(fill.price)?;
        self.guard.validate_lot(fill.quantity)?;

        let empties = fill.quantity == aggregates.remaining_quantity;

        // Stop/target re-base applies to the open remainder only; there is
        // nothing left to re-base when the trim clears the position.
        if !empties {
            if let Some(stop) = fill.new_stop_loss {
                if !stop.is_positive() {
                    return Err(AppError::Validation(
                        "new stop loss must be positive".to_string(),
                    ));
                }
                plan.stop_loss = stop;
            }
            if let Some(target) = fill.new_take_profit {
                if !target.is_positive() {
                    return Err(AppError::Validation(
                        "new take profit must be positive".to_string(),
                    ));
                }
                plan.take_profit = target;
            }
        }

        let execution = empties.then(|| NewExecution {
            exit_price: fill.price,
            realized_pnl: Decimal::zero(), // final value filled in after apply
            exit_logic: fill
                .logic
                .clone()
                .unwrap_or_else(|| "position trimmed to zero".to_string()),
            emotional_state: fill.emotional_state.clone(),
            created_at: TimeMs::now(),
        });

        self.apply_and_commit(
            plan,
            aggregates,
            EventKind::PartialExit,
            fill.price,
            fill.quantity,
            fill.logic,
            execution,
        )
        .await
    }

    /// Exit the full remaining position: OPEN -> CLOSED, with a close record.
    pub async fn close(
        &self,
        plan_id: PlanId,
        fill: CloseFill,
    ) -> Result<(TradePlan, TradeExecution), AppError> {
        let lock = self.locks.lock_for(plan_id);
        let _guard = lock.lock().await;

        let (plan, aggregates) = self.load_verified(plan_id).await?;
        require_open(&plan)?;
        require_positive_price(fill.price)?;
        if fill.exit_logic.trim().is_empty() {
            return Err(AppError::Validation(
                "exit logic must not be empty".to_string(),
            ));
        }
        if aggregates.remaining_quantity == 0 {
            return Err(AppError::InvalidState(format!(
                "plan {plan_id} holds no shares to close"
            )));
        }

        let quantity = aggregates.remaining_quantity;
        let execution = NewExecution {
            exit_price: fill.price,
            realized_pnl: Decimal::zero(),
            exit_logic: fill.exit_logic.clone(),
            emotional_state: fill.emotional_state,
            created_at: TimeMs::now(),
        };

        let (plan, execution) = self
            .apply_and_commit(
                plan,
                aggregates,
                EventKind::FullExit,
                fill.price,
                quantity,
                Some(fill.exit_logic),
                Some(execution),
            )
            .await?;
        let execution = execution.ok_or_else(|| {
            AppError::Internal("close committed without an execution record".to_string())
        })?;
        Ok((plan, execution))
    }

    /// Abandon a PENDING plan. No shares were ever held, so nothing touches
    /// the ledger.
    pub async fn cancel(&self, plan_id: PlanId) -> Result<TradePlan, AppError> {
        let lock = self.locks.lock_for(plan_id);
        let _guard = lock.lock().await;

        let plan = self.must_get(plan_id).await?;
        if plan.status != PlanStatus::Pending {
            return Err(AppError::InvalidState(format!(
                "plan {plan_id} is {}, only PENDING plans can be cancelled",
                plan.status
            )));
        }

        self.repo
            .set_plan_status(plan_id, PlanStatus::Cancelled)
            .await?;
        info!(plan_id = %plan_id, "Cancelled plan");
        self.must_get(plan_id).await
    }

    /// Administrative delete: removes the plan and its ledger regardless of
    /// state. Lifecycle rules do not apply here.
    pub async fn delete(&self, plan_id: PlanId) -> Result<(), AppError> {
        let lock = self.locks.lock_for(plan_id);
        let _guard = lock.lock().await;

        if !self.repo.delete_plan(plan_id).await? {
            return Err(AppError::UnknownPlan(plan_id.as_i64()));
        }
        warn!(plan_id = %plan_id, "Deleted plan and its ledger");
        drop(_guard);
        self.locks.remove(plan_id);
        Ok(())
    }

    pub async fn get_plan(&self, plan_id: PlanId) -> Result<TradePlan, AppError> {
        self.must_get(plan_id).await
    }

    pub async fn list_pending(&self) -> Result<Vec<TradePlan>, AppError> {
        Ok(self.repo.list_plans_by_status(PlanStatus::Pending).await?)
    }

    pub async fn list_active(&self) -> Result<Vec<TradePlan>, AppError> {
        Ok(self.repo.list_plans_by_status(PlanStatus::Open).await?)
    }

    /// Closed-trade history, most recent close first.
    pub async fn list_history(&self) -> Result<Vec<(TradeExecution, TradePlan)>, AppError> {
        Ok(self.repo.list_history().await?)
    }

    /// A plan's full ledger in replay order.
    pub async fn transactions(
        &self,
        plan_id: PlanId,
    ) -> Result<Vec<TransactionEvent>, AppError> {
        self.must_get(plan_id).await?;
        Ok(self.repo.list_events(plan_id).await?)
    }

    /// Storage connectivity check backing the readiness endpoint.
    pub async fn ping(&self) -> Result<(), AppError> {
        Ok(self.repo.ping().await?)
    }

    pub async fn get_settings(&self) -> Result<Settings, AppError> {
        Ok(self.repo.get_settings(self.default_settings).await?)
    }

    pub async fn update_settings(&self, settings: Settings) -> Result<Settings, AppError> {
        if !settings.total_capital.is_positive() {
            return Err(AppError::Validation(
                "total capital must be positive".to_string(),
            ));
        }
        let one = Decimal::from_i64(1);
        if !settings.risk_percent.is_positive() || settings.risk_percent > one {
            return Err(AppError::Validation(
                "risk percent must be in (0, 1]".to_string(),
            ));
        }
        self.repo.update_settings(settings).await?;
        self.repo.get_settings(self.default_settings).await.map_err(Into::into)
    }

    async fn must_get(&self, plan_id: PlanId) -> Result<TradePlan, AppError> {
        self.repo
            .get_plan(plan_id)
            .await?
            .ok_or(AppError::UnknownPlan(plan_id.as_i64()))
    }

    /// Load a plan with its replayed aggregates, failing with a consistency
    /// fault if the stored row no longer matches the ledger.
    async fn load_verified(
        &self,
        plan_id: PlanId,
    ) -> Result<(TradePlan, Aggregates), AppError> {
        let plan = self.must_get(plan_id).await?;
        let events = self.repo.list_events(plan_id).await?;
        let aggregates =
            replay(&events).map_err(|e| consistency_fault(plan_id, &e.to_string()))?;
        if !aggregates.matches_plan(&plan) {
            return Err(consistency_fault(
                plan_id,
                "stored aggregates diverged from ledger replay",
            ));
        }
        Ok((plan, aggregates))
    }

    /// Apply one event to the verified aggregates, persist everything
    /// atomically, then re-verify the stored row against a fresh replay.
    #[allow(clippy::too_many_arguments)]
    async fn apply_and_commit(
        &self,
        mut plan: TradePlan,
        mut aggregates: Aggregates,
        kind: EventKind,
        price: Decimal,
        quantity: i64,
        logic: Option<String>,
        execution: Option<NewExecution>,
    ) -> Result<(TradePlan, Option<TradeExecution>), AppError> {
        aggregates.apply(kind, price, quantity)?;

        plan.avg_entry_price = aggregates.avg_entry_price();
        plan.total_quantity = aggregates.total_quantity;
        plan.remaining_quantity = aggregates.remaining_quantity;
        plan.realized_pnl = aggregates.realized_pnl;

        let now = TimeMs::now();
        if kind == EventKind::InitialEntry {
            plan.status = PlanStatus::Open;
        }
        if kind.is_sell() && aggregates.remaining_quantity == 0 {
            plan.status = PlanStatus::Closed;
            plan.closed_at = Some(now);
        }

        let execution = execution.map(|e| NewExecution {
            realized_pnl: aggregates.realized_pnl,
            ..e
        });

        let event = NewEvent {
            event_key: TransactionEvent::new_event_key(),
            kind,
            price,
            quantity,
            event_time: now,
            logic_snapshot: logic,
        };
        let (_, execution_id) = self
            .repo
            .commit_mutation(&crate::db::repo::PlanMutation {
                plan: &plan,
                event: &event,
                execution: execution.as_ref(),
            })
            .await?;

        let plan = self.verify_after_commit(plan.id).await?;
        let execution = match execution_id {
            Some(id) => self.repo.get_execution(id).await?,
            None => None,
        };

        info!(
            plan_id = %plan.id,
            kind = %kind,
            price = %price,
            quantity,
            status = %plan.status,
            remaining = plan.remaining_quantity,
            "Committed ledger event"
        );
        Ok((plan, execution))
    }

    /// Re-read the plan and its ledger after a commit and confirm the replay
    /// still reproduces the stored aggregates.
    async fn verify_after_commit(&self, plan_id: PlanId) -> Result<TradePlan, AppError> {
        let plan = self.must_get(plan_id).await?;
        let events = self.repo.list_events(plan_id).await?;
        let replayed =
            replay(&events).map_err(|e| consistency_fault(plan_id, &e.to_string()))?;
        if !replayed.matches_plan(&plan) {
            return Err(consistency_fault(
                plan_id,
                "post-commit replay diverged from stored aggregates",
            ));
        }
        Ok(plan)
    }
}

fn consistency_fault(plan_id: PlanId, detail: &str) -> AppError {
    error!(plan_id = %plan_id, detail, "Ledger consistency fault");
    AppError::Consistency(format!("plan {plan_id}: {detail}"))
}

fn require_open(plan: &TradePlan) -> Result<(), AppError> {
    if plan.status != PlanStatus::Open {
        return Err(AppError::InvalidState(format!(
            "plan {} is {}, operation requires an OPEN plan",
            plan.id, plan.status
        )));
    }
    Ok(())
}

fn require_positive_price(price: Decimal) -> Result<(), AppError> {
    if !price.is_positive() {
        return Err(AppError::Validation("price must be positive".to_string()));
    }
    Ok(())
}
