//! Plan row operations: creation, reads, and the single-transaction mutation
//! that keeps ledger appends and aggregate updates atomic.

use crate::domain::{
    Decimal, EventKind, PlanId, PlanStatus, Symbol, TimeMs, TradeExecution, TradePlan,
    TransactionEvent,
};
use sqlx::Row;

use super::{get_time_ms, parse_stored_decimal, parse_stored_status, Repository};

/// Fields required to insert a new plan in PENDING state.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub symbol: Symbol,
    pub display_name: Option<String>,
    pub planned_entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub planned_quantity: i64,
    pub risk_reward_ratio: Decimal,
    pub entry_logic: String,
    pub created_at: TimeMs,
}

/// Ledger event to append as part of a mutation.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_key: String,
    pub kind: EventKind,
    pub price: Decimal,
    pub quantity: i64,
    pub event_time: TimeMs,
    pub logic_snapshot: Option<String>,
}

/// Close record to insert when a mutation takes the plan to CLOSED.
#[derive(Debug, Clone)]
pub struct NewExecution {
    pub exit_price: Decimal,
    pub realized_pnl: Decimal,
    pub exit_logic: String,
    pub emotional_state: Option<String>,
    pub created_at: TimeMs,
}

/// One atomic mutating operation: the fully updated plan row, the event that
/// caused the change, and the close record if the plan just closed.
#[derive(Debug)]
pub struct PlanMutation<'a> {
    pub plan: &'a TradePlan,
    pub event: &'a NewEvent,
    pub execution: Option<&'a NewExecution>,
}

impl Repository {
    /// Insert a new plan and return its id.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert_plan(&self, new_plan: &NewPlan) -> Result<PlanId, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO trade_plans
            (symbol, display_name, planned_entry_price, stop_loss, take_profit,
             planned_quantity, risk_reward_ratio, entry_logic,
             avg_entry_price, total_quantity, remaining_quantity, realized_pnl,
             status, created_at, closed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, 0, 0, '0', ?, ?, NULL)
            "#,
        )
        .bind(new_plan.symbol.as_str())
        .bind(new_plan.display_name.as_deref())
        .bind(new_plan.planned_entry_price.to_canonical_string())
        .bind(new_plan.stop_loss.to_canonical_string())
        .bind(new_plan.take_profit.to_canonical_string())
        .bind(new_plan.planned_quantity)
        .bind(new_plan.risk_reward_ratio.to_canonical_string())
        .bind(&new_plan.entry_logic)
        .bind(PlanStatus::Pending.as_str())
        .bind(new_plan.created_at.as_i64())
        .execute(self.pool())
        .await?;

        Ok(PlanId::new(result.last_insert_rowid()))
    }

    /// Fetch a plan by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_plan(&self, plan_id: PlanId) -> Result<Option<TradePlan>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM trade_plans WHERE id = ?")
            .bind(plan_id.as_i64())
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|row| plan_from_row(&row)))
    }

    /// List plans in a given status, oldest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_plans_by_status(
        &self,
        status: PlanStatus,
    ) -> Result<Vec<TradePlan>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT * FROM trade_plans WHERE status = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(status.as_str())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.iter().map(plan_from_row).collect())
    }

    /// Set a plan's status without touching the ledger (cancel path only).
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn set_plan_status(
        &self,
        plan_id: PlanId,
        status: PlanStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE trade_plans SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(plan_id.as_i64())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Persist one mutating operation atomically: update the plan row, append
    /// the ledger event, and insert the close record when present. Either all
    /// three land or none do.
    ///
    /// Returns the ids of the appended event and of the execution row, if any.
    ///
    /// # Errors
    /// Returns an error if any statement fails; the transaction rolls back.
    pub async fn commit_mutation(
        &self,
        mutation: &PlanMutation<'_>,
    ) -> Result<(i64, Option<i64>), sqlx::Error> {
        let plan = mutation.plan;
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r#"
            UPDATE trade_plans
            SET stop_loss = ?, take_profit = ?,
                avg_entry_price = ?, total_quantity = ?, remaining_quantity = ?,
                realized_pnl = ?, status = ?, closed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(plan.stop_loss.to_canonical_string())
        .bind(plan.take_profit.to_canonical_string())
        .bind(plan.avg_entry_price.map(|p| p.to_canonical_string()))
        .bind(plan.total_quantity)
        .bind(plan.remaining_quantity)
        .bind(plan.realized_pnl.to_canonical_string())
        .bind(plan.status.as_str())
        .bind(plan.closed_at.map(|t| t.as_i64()))
        .bind(plan.id.as_i64())
        .execute(&mut *tx)
        .await?;

        let event = mutation.event;
        let event_result = sqlx::query(
            r#"
            INSERT INTO trade_events
            (event_key, plan_id, kind, price, quantity, event_time, logic_snapshot)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.event_key)
        .bind(plan.id.as_i64())
        .bind(event.kind.as_str())
        .bind(event.price.to_canonical_string())
        .bind(event.quantity)
        .bind(event.event_time.as_i64())
        .bind(event.logic_snapshot.as_deref())
        .execute(&mut *tx)
        .await?;

        let execution_id = if let Some(execution) = mutation.execution {
            let result = sqlx::query(
                r#"
                INSERT INTO trade_executions
                (plan_id, exit_price, realized_pnl, exit_logic, emotional_state, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(plan.id.as_i64())
            .bind(execution.exit_price.to_canonical_string())
            .bind(execution.realized_pnl.to_canonical_string())
            .bind(&execution.exit_logic)
            .bind(execution.emotional_state.as_deref())
            .bind(execution.created_at.as_i64())
            .execute(&mut *tx)
            .await?;
            Some(result.last_insert_rowid())
        } else {
            None
        };

        tx.commit().await?;
        Ok((event_result.last_insert_rowid(), execution_id))
    }

    /// Administrative delete: removes the plan with its events and execution
    /// records in one transaction. Bypasses lifecycle rules by design.
    ///
    /// Returns false if the plan did not exist.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn delete_plan(&self, plan_id: PlanId) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        sqlx::query("DELETE FROM trade_events WHERE plan_id = ?")
            .bind(plan_id.as_i64())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM trade_executions WHERE plan_id = ?")
            .bind(plan_id.as_i64())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM trade_plans WHERE id = ?")
            .bind(plan_id.as_i64())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fetch an execution row by id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_execution(&self, id: i64) -> Result<Option<TradeExecution>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM trade_executions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|row| execution_from_row(&row)))
    }

    /// Closed-trade history: executions joined with their plans, most recent
    /// close first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_history(
        &self,
    ) -> Result<Vec<(TradeExecution, TradePlan)>, sqlx::Error> {
        let execution_rows = sqlx::query(
            "SELECT * FROM trade_executions ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self.pool())
        .await?;

        let mut out = Vec::with_capacity(execution_rows.len());
        for row in &execution_rows {
            let execution = execution_from_row(row);
            if let Some(plan) = self.get_plan(execution.plan_id).await? {
                out.push((execution, plan));
            }
        }
        Ok(out)
    }
}

fn plan_from_row(row: &sqlx::sqlite::SqliteRow) -> TradePlan {
    TradePlan {
        id: PlanId::new(row.get::<i64, _>("id")),
        symbol: Symbol::new(row.get::<String, _>("symbol")),
        display_name: row.get::<Option<String>, _>("display_name"),
        planned_entry_price: parse_stored_decimal(
            &row.get::<String, _>("planned_entry_price"),
            "planned_entry_price",
        ),
        stop_loss: parse_stored_decimal(&row.get::<String, _>("stop_loss"), "stop_loss"),
        take_profit: parse_stored_decimal(&row.get::<String, _>("take_profit"), "take_profit"),
        planned_quantity: row.get::<i64, _>("planned_quantity"),
        risk_reward_ratio: parse_stored_decimal(
            &row.get::<String, _>("risk_reward_ratio"),
            "risk_reward_ratio",
        ),
        entry_logic: row.get::<String, _>("entry_logic"),
        avg_entry_price: row
            .get::<Option<String>, _>("avg_entry_price")
            .map(|s| parse_stored_decimal(&s, "avg_entry_price")),
        total_quantity: row.get::<i64, _>("total_quantity"),
        remaining_quantity: row.get::<i64, _>("remaining_quantity"),
        realized_pnl: parse_stored_decimal(&row.get::<String, _>("realized_pnl"), "realized_pnl"),
        status: parse_stored_status(&row.get::<String, _>("status")),
        created_at: get_time_ms(row, "created_at"),
        closed_at: row
            .get::<Option<i64>, _>("closed_at")
            .map(crate::domain::TimeMs::new),
    }
}

fn execution_from_row(row: &sqlx::sqlite::SqliteRow) -> TradeExecution {
    TradeExecution {
        id: row.get::<i64, _>("id"),
        plan_id: PlanId::new(row.get::<i64, _>("plan_id")),
        exit_price: parse_stored_decimal(&row.get::<String, _>("exit_price"), "exit_price"),
        realized_pnl: parse_stored_decimal(&row.get::<String, _>("realized_pnl"), "realized_pnl"),
        exit_logic: row.get::<String, _>("exit_logic"),
        emotional_state: row.get::<Option<String>, _>("emotional_state"),
        created_at: get_time_ms(row, "created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sample_plan() -> NewPlan {
        NewPlan {
            symbol: Symbol::new("600519".to_string()),
            display_name: Some("Kweichow Moutai".to_string()),
            planned_entry_price: dec("10.00"),
            stop_loss: dec("9.00"),
            take_profit: dec("12.00"),
            planned_quantity: 200,
            risk_reward_ratio: dec("2"),
            entry_logic: "pullback to support".to_string(),
            created_at: TimeMs::new(1000),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_plan() {
        let (repo, _temp) = setup_test_db().await;

        let id = repo.insert_plan(&sample_plan()).await.unwrap();
        let plan = repo.get_plan(id).await.unwrap().expect("plan missing");

        assert_eq!(plan.id, id);
        assert_eq!(plan.symbol.as_str(), "600519");
        assert_eq!(plan.status, PlanStatus::Pending);
        assert_eq!(plan.avg_entry_price, None);
        assert_eq!(plan.total_quantity, 0);
        assert_eq!(plan.realized_pnl, Decimal::zero());
    }

    #[tokio::test]
    async fn test_get_missing_plan() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.get_plan(PlanId::new(999)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let (repo, _temp) = setup_test_db().await;

        let id = repo.insert_plan(&sample_plan()).await.unwrap();
        repo.insert_plan(&sample_plan()).await.unwrap();

        assert_eq!(
            repo.list_plans_by_status(PlanStatus::Pending)
                .await
                .unwrap()
                .len(),
            2
        );

        repo.set_plan_status(id, PlanStatus::Cancelled).await.unwrap();
        let pending = repo.list_plans_by_status(PlanStatus::Pending).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].id, id);
    }

    #[tokio::test]
    async fn test_commit_mutation_updates_plan_and_appends_event() {
        let (repo, _temp) = setup_test_db().await;

        let id = repo.insert_plan(&sample_plan()).await.unwrap();
        let mut plan = repo.get_plan(id).await.unwrap().unwrap();
        plan.avg_entry_price = Some(dec("10.10"));
        plan.total_quantity = 200;
        plan.remaining_quantity = 200;
        plan.status = PlanStatus::Open;

        let event = NewEvent {
            event_key: TransactionEvent::new_event_key(),
            kind: EventKind::InitialEntry,
            price: dec("10.10"),
            quantity: 200,
            event_time: TimeMs::new(2000),
            logic_snapshot: Some("initial entry".to_string()),
        };

        let (event_id, execution_id) = repo
            .commit_mutation(&PlanMutation {
                plan: &plan,
                event: &event,
                execution: None,
            })
            .await
            .unwrap();
        assert!(event_id > 0);
        assert_eq!(execution_id, None);

        let stored = repo.get_plan(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PlanStatus::Open);
        assert_eq!(stored.avg_entry_price, Some(dec("10.1")));
        assert_eq!(stored.remaining_quantity, 200);

        let events = repo.list_events(id).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::InitialEntry);
        assert_eq!(events[0].quantity, 200);
    }

    #[tokio::test]
    async fn test_commit_mutation_with_execution() {
        let (repo, _temp) = setup_test_db().await;

        let id = repo.insert_plan(&sample_plan()).await.unwrap();
        let mut plan = repo.get_plan(id).await.unwrap().unwrap();
        plan.avg_entry_price = Some(dec("10"));
        plan.total_quantity = 200;
        plan.remaining_quantity = 0;
        plan.realized_pnl = dec("400");
        plan.status = PlanStatus::Closed;
        plan.closed_at = Some(TimeMs::new(3000));

        let event = NewEvent {
            event_key: TransactionEvent::new_event_key(),
            kind: EventKind::FullExit,
            price: dec("12"),
            quantity: 200,
            event_time: TimeMs::new(3000),
            logic_snapshot: None,
        };
        let execution = NewExecution {
            exit_price: dec("12"),
            realized_pnl: dec("400"),
            exit_logic: "target reached".to_string(),
            emotional_state: Some("calm".to_string()),
            created_at: TimeMs::new(3000),
        };

        let (_, execution_id) = repo
            .commit_mutation(&PlanMutation {
                plan: &plan,
                event: &event,
                execution: Some(&execution),
            })
            .await
            .unwrap();

        let stored = repo
            .get_execution(execution_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.plan_id, id);
        assert_eq!(stored.realized_pnl, dec("400"));
        assert_eq!(stored.emotional_state.as_deref(), Some("calm"));

        let history = repo.list_history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].1.id, id);
    }

    #[tokio::test]
    async fn test_delete_plan_removes_children() {
        let (repo, _temp) = setup_test_db().await;

        let id = repo.insert_plan(&sample_plan()).await.unwrap();
        let mut plan = repo.get_plan(id).await.unwrap().unwrap();
        plan.status = PlanStatus::Open;
        plan.avg_entry_price = Some(dec("10"));
        plan.total_quantity = 200;
        plan.remaining_quantity = 200;

        let event = NewEvent {
            event_key: TransactionEvent::new_event_key(),
            kind: EventKind::InitialEntry,
            price: dec("10"),
            quantity: 200,
            event_time: TimeMs::new(2000),
            logic_snapshot: None,
        };
        repo.commit_mutation(&PlanMutation {
            plan: &plan,
            event: &event,
            execution: None,
        })
        .await
        .unwrap();

        assert!(repo.delete_plan(id).await.unwrap());
        assert_eq!(repo.get_plan(id).await.unwrap(), None);
        assert!(repo.list_events(id).await.unwrap().is_empty());

        // Second delete is a no-op.
        assert!(!repo.delete_plan(id).await.unwrap());
    }
}
