//! Singleton application settings: total capital and per-trade risk percent.

use crate::domain::Decimal;
use sqlx::Row;
use tracing::info;

use super::{parse_stored_decimal, Repository};

/// Capital-at-risk parameters used by position sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub total_capital: Decimal,
    pub risk_percent: Decimal,
}

const SETTINGS_ID: i64 = 1;

impl Repository {
    /// Insert the default settings row if none exists yet.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn ensure_default_settings(
        &self,
        defaults: Settings,
    ) -> Result<(), sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO app_settings (id, total_capital, risk_percent)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(SETTINGS_ID)
        .bind(defaults.total_capital.to_canonical_string())
        .bind(defaults.risk_percent.to_canonical_string())
        .execute(self.pool())
        .await?;

        if result.rows_affected() > 0 {
            info!(
                total_capital = %defaults.total_capital,
                risk_percent = %defaults.risk_percent,
                "Seeded default settings"
            );
        }
        Ok(())
    }

    /// Read the settings row; falls back to the provided defaults if the row
    /// is missing.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn get_settings(&self, defaults: Settings) -> Result<Settings, sqlx::Error> {
        let row = sqlx::query("SELECT total_capital, risk_percent FROM app_settings WHERE id = ?")
            .bind(SETTINGS_ID)
            .fetch_optional(self.pool())
            .await?;

        Ok(row
            .map(|row| Settings {
                total_capital: parse_stored_decimal(
                    &row.get::<String, _>("total_capital"),
                    "total_capital",
                ),
                risk_percent: parse_stored_decimal(
                    &row.get::<String, _>("risk_percent"),
                    "risk_percent",
                ),
            })
            .unwrap_or(defaults))
    }

    /// Overwrite the settings row.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn update_settings(&self, settings: Settings) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (id, total_capital, risk_percent)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                total_capital = excluded.total_capital,
                risk_percent = excluded.risk_percent
            "#,
        )
        .bind(SETTINGS_ID)
        .bind(settings.total_capital.to_canonical_string())
        .bind(settings.risk_percent.to_canonical_string())
        .execute(self.pool())
        .await?;

        info!(
            total_capital = %settings.total_capital,
            risk_percent = %settings.risk_percent,
            "Updated settings"
        );
        Ok(())
    }
}
