//! Repository layer for database operations.
//!
//! Methods are organized across submodules by domain:
//! - `plans.rs` - Plan rows, atomic mutations, administrative delete
//! - `events.rs` - Append-only ledger reads
//! - `settings.rs` - Singleton capital/risk settings

mod events;
mod plans;
mod settings;

use crate::domain::{Decimal, PlanStatus, TimeMs};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

pub use plans::{NewExecution, NewEvent, NewPlan, PlanMutation};
pub use settings::Settings;

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap connectivity check for the readiness endpoint.
    ///
    /// # Errors
    /// Returns an error if the pool cannot serve a query.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Parse a stored canonical decimal, warning and defaulting on corruption.
///
/// A defaulted value can never silently pass the post-mutation replay check,
/// so corruption surfaces as a consistency fault rather than a wrong number.
pub(crate) fn parse_stored_decimal(raw: &str, column: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(column = column, value = raw, error = %e, "Failed to parse stored decimal, using default");
        Decimal::default()
    })
}

/// Parse a stored status string, warning and defaulting to Cancelled so a
/// corrupt row can never accept further mutations.
pub(crate) fn parse_stored_status(raw: &str) -> PlanStatus {
    PlanStatus::parse(raw).unwrap_or_else(|| {
        warn!(value = raw, "Unknown plan status in storage, treating as CANCELLED");
        PlanStatus::Cancelled
    })
}

pub(crate) fn get_time_ms(row: &sqlx::sqlite::SqliteRow, column: &str) -> TimeMs {
    TimeMs::new(row.get::<i64, _>(column))
}
