use crate::api::AppState;
use crate::domain::{Decimal, PlanId, TimeMs, TradePlan};
use crate::engine::{is_projectable, project, RiskLevel};
use crate::error::AppError;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQuery {
    /// Explicit mark price; overrides the live quote source.
    pub current_price: Option<Decimal>,
}

/// How the mark price used for a projection was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PriceOrigin {
    /// Supplied by the caller.
    Manual,
    /// Fetched from the quote source.
    Live,
    /// Quote unavailable; marked at the average entry price, so unrealized
    /// PnL reads as zero.
    Fallback,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardEntryDto {
    pub plan_id: i64,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub current_price: String,
    pub price_origin: PriceOrigin,
    pub avg_entry_price: String,
    pub remaining_quantity: i64,
    pub stop_loss: String,
    pub take_profit: String,
    pub realized_pnl: String,
    pub pnl_amount: String,
    pub pnl_percentage: String,
    pub distance_to_stop_loss: String,
    pub risk_level: RiskLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_multiple: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardResponse {
    pub positions: Vec<DashboardEntryDto>,
    pub generated_at: i64,
}

pub async fn get_plan_dashboard(
    Path(id): Path<i64>,
    Query(params): Query<DashboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<DashboardEntryDto>, AppError> {
    let plan = state.service.get_plan(PlanId::new(id)).await?;
    if !is_projectable(&plan) {
        return Err(AppError::InvalidState(format!(
            "plan {} has no open position to project",
            plan.id
        )));
    }

    let (price, origin) = resolve_price(&state, &plan, params.current_price).await;
    let entry = project_entry(&plan, price, origin)?;
    Ok(Json(entry))
}

pub async fn get_dashboard(
    Query(params): Query<DashboardQuery>,
    State(state): State<AppState>,
) -> Result<Json<DashboardResponse>, AppError> {
    let plans = state.service.list_active().await?;

    let mut positions = Vec::with_capacity(plans.len());
    for plan in plans.iter().filter(|p| is_projectable(p)) {
        let (price, origin) = resolve_price(&state, plan, params.current_price).await;
        positions.push(project_entry(plan, price, origin)?);
    }

    Ok(Json(DashboardResponse {
        positions,
        generated_at: TimeMs::now().as_i64(),
    }))
}

/// Pick the mark price: explicit caller price, then the live quote source,
/// then the average entry price as a degraded fallback.
async fn resolve_price(
    state: &AppState,
    plan: &TradePlan,
    explicit: Option<Decimal>,
) -> (Decimal, PriceOrigin) {
    if let Some(price) = explicit {
        return (price, PriceOrigin::Manual);
    }

    if let Some(prices) = &state.prices {
        match prices.fetch_price(plan.symbol.as_str()).await {
            Ok(Some(price)) => return (price, PriceOrigin::Live),
            Ok(None) => {
                warn!(symbol = %plan.symbol, "Quote source has no price for symbol");
            }
            Err(e) => {
                warn!(symbol = %plan.symbol, error = %e, "Quote fetch failed");
            }
        }
    }

    let fallback = plan.avg_entry_price.unwrap_or(plan.planned_entry_price);
    (fallback, PriceOrigin::Fallback)
}

fn project_entry(
    plan: &TradePlan,
    price: Decimal,
    origin: PriceOrigin,
) -> Result<DashboardEntryDto, AppError> {
    let view = project(plan, price)?;
    let avg_entry = plan
        .avg_entry_price
        .ok_or_else(|| AppError::InvalidState(format!("plan {} has no entry recorded", plan.id)))?;

    Ok(DashboardEntryDto {
        plan_id: plan.id.as_i64(),
        symbol: plan.symbol.as_str().to_string(),
        display_name: plan.display_name.clone(),
        current_price: view.current_price.to_canonical_string(),
        price_origin: origin,
        avg_entry_price: avg_entry.to_canonical_string(),
        remaining_quantity: plan.remaining_quantity,
        stop_loss: plan.stop_loss.to_canonical_string(),
        take_profit: plan.take_profit.to_canonical_string(),
        realized_pnl: plan.realized_pnl.to_canonical_string(),
        pnl_amount: view.pnl_amount.to_canonical_string(),
        pnl_percentage: view.pnl_percentage.to_canonical_string(),
        distance_to_stop_loss: view.distance_to_stop_loss.to_canonical_string(),
        risk_level: view.risk_level,
        r_multiple: view.r_multiple.map(|r| r.to_canonical_string()),
    })
}
