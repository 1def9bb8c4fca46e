use crate::api::AppState;
use crate::domain::{Decimal, PlanId, TradeExecution, TradePlan, TransactionEvent};
use crate::error::AppError;
use crate::service::{AddFill, CloseFill, CreatePlan, ExecuteFill, TrimFill};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanRequest {
    pub symbol: String,
    pub display_name: Option<String>,
    pub planned_entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Omitted: sized from the capital-at-risk settings.
    pub quantity: Option<i64>,
    pub entry_logic: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanResponse {
    pub plan: PlanDto,
    /// True when the risk/reward ratio sits in the warning band.
    pub risk_warning: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub price: Decimal,
    /// Omitted: fills the planned quantity.
    pub quantity: Option<i64>,
    pub logic: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub price: Decimal,
    pub quantity: i64,
    pub logic: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimRequest {
    pub price: Decimal,
    pub quantity: i64,
    pub logic: Option<String>,
    pub new_stop_loss: Option<Decimal>,
    pub new_take_profit: Option<Decimal>,
    pub emotional_state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseRequest {
    pub price: Decimal,
    pub exit_logic: String,
    pub emotional_state: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrimResponse {
    pub plan: PlanDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResponse {
    pub plan: PlanDto,
    pub execution: ExecutionDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDto {
    pub id: i64,
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub planned_entry_price: String,
    pub stop_loss: String,
    pub take_profit: String,
    pub planned_quantity: i64,
    pub risk_reward_ratio: String,
    pub entry_logic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_entry_price: Option<String>,
    pub total_quantity: i64,
    pub remaining_quantity: i64,
    pub realized_pnl: String,
    pub status: String,
    pub created_at: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<i64>,
}

impl From<&TradePlan> for PlanDto {
    fn from(plan: &TradePlan) -> Self {
        PlanDto {
            id: plan.id.as_i64(),
            symbol: plan.symbol.as_str().to_string(),
            display_name: plan.display_name.clone(),
            planned_entry_price: plan.planned_entry_price.to_canonical_string(),
            stop_loss: plan.stop_loss.to_canonical_string(),
            take_profit: plan.take_profit.to_canonical_string(),
            planned_quantity: plan.planned_quantity,
            risk_reward_ratio: plan.risk_reward_ratio.to_canonical_string(),
            entry_logic: plan.entry_logic.clone(),
            avg_entry_price: plan.avg_entry_price.map(|p| p.to_canonical_string()),
            total_quantity: plan.total_quantity,
            remaining_quantity: plan.remaining_quantity,
            realized_pnl: plan.realized_pnl.to_canonical_string(),
            status: plan.status.to_string(),
            created_at: plan.created_at.as_i64(),
            closed_at: plan.closed_at.map(|t| t.as_i64()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDto {
    pub id: i64,
    pub plan_id: i64,
    pub exit_price: String,
    pub realized_pnl: String,
    pub exit_logic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotional_state: Option<String>,
    pub created_at: i64,
}

impl From<&TradeExecution> for ExecutionDto {
    fn from(execution: &TradeExecution) -> Self {
        ExecutionDto {
            id: execution.id,
            plan_id: execution.plan_id.as_i64(),
            exit_price: execution.exit_price.to_canonical_string(),
            realized_pnl: execution.realized_pnl.to_canonical_string(),
            exit_logic: execution.exit_logic.clone(),
            emotional_state: execution.emotional_state.clone(),
            created_at: execution.created_at.as_i64(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDto {
    pub execution: ExecutionDto,
    pub plan: PlanDto,
    /// Realized PnL over the total capital deployed, in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realized_pnl_percentage: Option<String>,
}

/// `realized_pnl / (avg_entry * total_quantity) * 100`, undefined for a plan
/// that never bought shares.
fn realized_pnl_percentage(plan: &TradePlan) -> Option<String> {
    let avg_entry = plan.avg_entry_price?;
    if plan.total_quantity == 0 || !avg_entry.is_positive() {
        return None;
    }
    let cost = avg_entry * Decimal::from_i64(plan.total_quantity);
    Some(
        (plan.realized_pnl / cost * Decimal::hundred())
            .round_dp(2)
            .to_canonical_string(),
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionDto {
    pub id: i64,
    pub event_key: String,
    pub plan_id: i64,
    pub kind: String,
    pub price: String,
    pub quantity: i64,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logic_snapshot: Option<String>,
}

impl From<&TransactionEvent> for TransactionDto {
    fn from(event: &TransactionEvent) -> Self {
        TransactionDto {
            id: event.id,
            event_key: event.event_key.clone(),
            plan_id: event.plan_id.as_i64(),
            kind: event.kind.to_string(),
            price: event.price.to_canonical_string(),
            quantity: event.quantity,
            timestamp: event.timestamp.as_i64(),
            logic_snapshot: event.logic_snapshot.clone(),
        }
    }
}

pub async fn create_plan(
    State(state): State<AppState>,
    Json(request): Json<CreatePlanRequest>,
) -> Result<(StatusCode, Json<CreatePlanResponse>), AppError> {
    let (plan, assessment) = state
        .service
        .create_plan(CreatePlan {
            symbol: request.symbol,
            display_name: request.display_name,
            planned_entry_price: request.planned_entry_price,
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
            quantity: request.quantity,
            entry_logic: request.entry_logic,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePlanResponse {
            plan: PlanDto::from(&plan),
            risk_warning: assessment.warns(),
        }),
    ))
}

pub async fn get_plan(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<PlanDto>, AppError> {
    let plan = state.service.get_plan(PlanId::new(id)).await?;
    Ok(Json(PlanDto::from(&plan)))
}

pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanDto>>, AppError> {
    let plans = state.service.list_pending().await?;
    Ok(Json(plans.iter().map(PlanDto::from).collect()))
}

pub async fn list_active(
    State(state): State<AppState>,
) -> Result<Json<Vec<PlanDto>>, AppError> {
    let plans = state.service.list_active().await?;
    Ok(Json(plans.iter().map(PlanDto::from).collect()))
}

pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryEntryDto>>, AppError> {
    let history = state.service.list_history().await?;
    Ok(Json(
        history
            .iter()
            .map(|(execution, plan)| HistoryEntryDto {
                execution: ExecutionDto::from(execution),
                plan: PlanDto::from(plan),
                realized_pnl_percentage: realized_pnl_percentage(plan),
            })
            .collect(),
    ))
}

pub async fn execute_plan(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<PlanDto>, AppError> {
    let plan = state
        .service
        .execute(
            PlanId::new(id),
            ExecuteFill {
                price: request.price,
                quantity: request.quantity,
                logic: request.logic,
            },
        )
        .await?;
    Ok(Json(PlanDto::from(&plan)))
}

pub async fn add_position(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<AddRequest>,
) -> Result<Json<PlanDto>, AppError> {
    let plan = state
        .service
        .add_position(
            PlanId::new(id),
            AddFill {
                price: request.price,
                quantity: request.quantity,
                logic: request.logic,
            },
        )
        .await?;
    Ok(Json(PlanDto::from(&plan)))
}

pub async fn trim_position(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<TrimRequest>,
) -> Result<Json<TrimResponse>, AppError> {
    let (plan, execution) = state
        .service
        .trim(
            PlanId::new(id),
            TrimFill {
                price: request.price,
                quantity: request.quantity,
                logic: request.logic,
                new_stop_loss: request.new_stop_loss,
                new_take_profit: request.new_take_profit,
                emotional_state: request.emotional_state,
            },
        )
        .await?;
    Ok(Json(TrimResponse {
        plan: PlanDto::from(&plan),
        execution: execution.as_ref().map(ExecutionDto::from),
    }))
}

pub async fn close_plan(
    Path(id): Path<i64>,
    State(state): State<AppState>,
    Json(request): Json<CloseRequest>,
) -> Result<Json<CloseResponse>, AppError> {
    let (plan, execution) = state
        .service
        .close(
            PlanId::new(id),
            CloseFill {
                price: request.price,
                exit_logic: request.exit_logic,
                emotional_state: request.emotional_state,
            },
        )
        .await?;
    Ok(Json(CloseResponse {
        plan: PlanDto::from(&plan),
        execution: ExecutionDto::from(&execution),
    }))
}

pub async fn cancel_plan(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<PlanDto>, AppError> {
    let plan = state.service.cancel(PlanId::new(id)).await?;
    Ok(Json(PlanDto::from(&plan)))
}

pub async fn delete_plan(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    state.service.delete(PlanId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_transactions(
    Path(id): Path<i64>,
    State(state): State<AppState>,
) -> Result<Json<Vec<TransactionDto>>, AppError> {
    let events = state.service.transactions(PlanId::new(id)).await?;
    Ok(Json(events.iter().map(TransactionDto::from).collect()))
}
