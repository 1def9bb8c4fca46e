pub mod dashboard;
pub mod health;
pub mod plans;
pub mod settings;

use crate::config::Config;
use crate::marketdata::PriceSource;
use crate::service::PlanService;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PlanService>,
    pub config: Config,
    /// Live quote source; None means dashboard callers must supply a price
    /// or accept the entry-price fallback.
    pub prices: Option<Arc<dyn PriceSource>>,
}

impl AppState {
    pub fn new(
        service: Arc<PlanService>,
        config: Config,
        prices: Option<Arc<dyn PriceSource>>,
    ) -> Self {
        Self {
            service,
            config,
            prices,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/plans", post(plans::create_plan))
        .route("/v1/plans/pending", get(plans::list_pending))
        .route("/v1/plans/active", get(plans::list_active))
        .route("/v1/plans/history", get(plans::list_history))
        .route("/v1/plans/:id", get(plans::get_plan))
        .route("/v1/plans/:id", delete(plans::delete_plan))
        .route("/v1/plans/:id/execute", post(plans::execute_plan))
        .route("/v1/plans/:id/add", post(plans::add_position))
        .route("/v1/plans/:id/trim", post(plans::trim_position))
        .route("/v1/plans/:id/close", post(plans::close_plan))
        .route("/v1/plans/:id/cancel", post(plans::cancel_plan))
        .route("/v1/plans/:id/transactions", get(plans::list_transactions))
        .route("/v1/plans/:id/dashboard", get(dashboard::get_plan_dashboard))
        .route("/v1/dashboard", get(dashboard::get_dashboard))
        .route("/v1/settings", get(settings::get_settings))
        .route("/v1/settings", put(settings::update_settings))
        .layer(cors)
        .with_state(state)
}
