use crate::api::AppState;
use crate::db::Settings;
use crate::domain::Decimal;
use crate::error::AppError;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsDto {
    pub total_capital: String,
    pub risk_percent: String,
}

impl From<Settings> for SettingsDto {
    fn from(settings: Settings) -> Self {
        SettingsDto {
            total_capital: settings.total_capital.to_canonical_string(),
            risk_percent: settings.risk_percent.to_canonical_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub total_capital: Decimal,
    pub risk_percent: Decimal,
}

pub async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<SettingsDto>, AppError> {
    let settings = state.service.get_settings().await?;
    Ok(Json(SettingsDto::from(settings)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsDto>, AppError> {
    let updated = state
        .service
        .update_settings(Settings {
            total_capital: request.total_capital,
            risk_percent: request.risk_percent,
        })
        .await?;
    Ok(Json(SettingsDto::from(updated)))
}
