//! Append-only ledger reads.
//!
//! Events are written exclusively through `commit_mutation`; this module only
//! reads them back, in replay order.

use crate::domain::{EventKind, PlanId, TransactionEvent};
use sqlx::Row;
use tracing::warn;

use super::{get_time_ms, parse_stored_decimal, Repository};

impl Repository {
    /// List a plan's ledger events in replay order: timestamp, then insertion
    /// order for same-timestamp events. Returns an empty vec for an unknown
    /// plan; existence is the caller's concern.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn list_events(
        &self,
        plan_id: PlanId,
    ) -> Result<Vec<TransactionEvent>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_key, plan_id, kind, price, quantity, event_time, logic_snapshot
            FROM trade_events
            WHERE plan_id = ?
            ORDER BY event_time ASC, id ASC
            "#,
        )
        .bind(plan_id.as_i64())
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let kind_str = row.get::<String, _>("kind");
                let Some(kind) = EventKind::parse(&kind_str) else {
                    // An unknown kind would corrupt any replay; skip it loudly
                    // and let the consistency check catch the divergence.
                    warn!(plan_id = %plan_id, kind = %kind_str, "Unknown event kind in ledger, skipping");
                    return None;
                };
                Some(TransactionEvent {
                    id: row.get::<i64, _>("id"),
                    event_key: row.get::<String, _>("event_key"),
                    plan_id: PlanId::new(row.get::<i64, _>("plan_id")),
                    kind,
                    price: parse_stored_decimal(&row.get::<String, _>("price"), "price"),
                    quantity: row.get::<i64, _>("quantity"),
                    timestamp: get_time_ms(row, "event_time"),
                    logic_snapshot: row.get::<Option<String>, _>("logic_snapshot"),
                })
            })
            .collect())
    }
}
