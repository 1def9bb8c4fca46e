//! End-to-end lifecycle through the HTTP surface: plan creation, entry,
//! add, trim, close, and the read models derived from the ledger.

use axum::http::{Request, StatusCode};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use tradeledger::engine::RiskGuard;
use tradeledger::marketdata::MockPriceSource;
use tradeledger::{
    api, config::Config, db::init_db, Decimal, PlanService, PriceSource, Repository, Settings,
};

struct TestApp {
    app: axum::Router,
    _temp: TempDir,
}

async fn setup_test_app(prices: Option<Arc<dyn PriceSource>>) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");

    let repo = Arc::new(Repository::new(pool));
    let defaults = Settings {
        total_capital: Decimal::from_str("1000000").unwrap(),
        risk_percent: Decimal::from_str("0.01").unwrap(),
    };
    repo.ensure_default_settings(defaults).await.unwrap();

    let config = Config {
        port: 0,
        database_path: db_path,
        quote_api_url: None,
        lot_size: 100,
        default_total_capital: defaults.total_capital,
        default_risk_percent: defaults.risk_percent,
    };
    let service = Arc::new(PlanService::new(repo, RiskGuard::new(100), defaults));
    let app = api::create_router(api::AppState::new(service, config, prices));

    TestApp {
        app,
        _temp: temp_dir,
    }
}

async fn request(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn sample_plan_body() -> serde_json::Value {
    serde_json::json!({
        "symbol": "600519",
        "displayName": "Kweichow Moutai",
        "plannedEntryPrice": 10.0,
        "stopLoss": 9.0,
        "takeProfit": 12.0,
        "quantity": 200,
        "entryLogic": "pullback to support"
    })
}

#[tokio::test]
async fn test_health_and_ready() {
    let TestApp { app, _temp } = setup_test_app(None).await;

    let (status, body) = request(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_full_lifecycle_over_http() {
    let TestApp { app, _temp } = setup_test_app(None).await;

    // Create: clean ratio (2.0), no warning.
    let (status, body) = request(&app, "POST", "/v1/plans", Some(sample_plan_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["riskWarning"], false);
    let plan = &body["plan"];
    assert_eq!(plan["status"], "PENDING");
    assert_eq!(plan["riskRewardRatio"], "2");
    assert_eq!(plan["plannedQuantity"], 200);
    assert!(plan.get("avgEntryPrice").is_none());
    let id = plan["id"].as_i64().unwrap();

    let (status, body) = request(&app, "GET", "/v1/plans/pending", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Execute at a slightly worse fill.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/execute"),
        Some(serde_json::json!({"price": 10.1, "logic": "filled at open"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OPEN");
    assert_eq!(body["avgEntryPrice"], "10.1");
    assert_eq!(body["remainingQuantity"], 200);

    let (status, body) = request(&app, "GET", "/v1/plans/active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    let (_, body) = request(&app, "GET", "/v1/plans/pending", None).await;
    assert!(body.as_array().unwrap().is_empty());

    // Add: 200 @ 10.1 + 200 @ 10.5 -> avg 10.3 on 400.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/add"),
        Some(serde_json::json!({"price": 10.5, "quantity": 200})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["avgEntryPrice"], "10.3");
    assert_eq!(body["totalQuantity"], 400);

    // Trim half at 11: realized (11 - 10.3) * 200 = 140; move the stop up.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/trim"),
        Some(serde_json::json!({
            "price": 11.0,
            "quantity": 200,
            "newStopLoss": 10.3,
            "logic": "scaling out"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("execution").is_none());
    assert_eq!(body["plan"]["remainingQuantity"], 200);
    assert_eq!(body["plan"]["realizedPnl"], "140");
    assert_eq!(body["plan"]["stopLoss"], "10.3");
    // The average never moves on an exit.
    assert_eq!(body["plan"]["avgEntryPrice"], "10.3");

    // Close the rest at 11.5: 140 + (11.5 - 10.3) * 200 = 380.
    let (status, body) = request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/close"),
        Some(serde_json::json!({
            "price": 11.5,
            "exitLogic": "target area reached",
            "emotionalState": "calm"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"]["status"], "CLOSED");
    assert_eq!(body["plan"]["remainingQuantity"], 0);
    assert_eq!(body["plan"]["realizedPnl"], "380");
    assert!(body["plan"]["closedAt"].as_i64().is_some());
    assert_eq!(body["execution"]["realizedPnl"], "380");
    assert_eq!(body["execution"]["emotionalState"], "calm");

    // History carries the close record joined with its plan.
    let (status, body) = request(&app, "GET", "/v1/plans/history", None).await;
    assert_eq!(status, StatusCode::OK);
    let history = body.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["plan"]["id"].as_i64(), Some(id));
    assert_eq!(history[0]["execution"]["exitPrice"], "11.5");
    // 380 / (10.3 * 400) * 100 = 9.2233.. -> 9.22
    assert_eq!(history[0]["realizedPnlPercentage"], "9.22");

    // The ledger holds the full story in replay order.
    let (status, body) =
        request(&app, "GET", &format!("/v1/plans/{id}/transactions"), None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0]["kind"], "INITIAL_ENTRY");
    assert_eq!(events[1]["kind"], "ADD_POSITION");
    assert_eq!(events[2]["kind"], "PARTIAL_EXIT");
    assert_eq!(events[3]["kind"], "FULL_EXIT");
    assert!(events[0]["eventKey"].as_str().is_some());
    assert_eq!(events[0]["logicSnapshot"], "filled at open");
}

#[tokio::test]
async fn test_create_warns_in_warning_band() {
    let TestApp { app, _temp } = setup_test_app(None).await;

    // entry 100, stop 98, target 102.4 -> ratio 1.2: allowed, flagged.
    let (status, body) = request(
        &app,
        "POST",
        "/v1/plans",
        Some(serde_json::json!({
            "symbol": "000001",
            "plannedEntryPrice": 100.0,
            "stopLoss": 98.0,
            "takeProfit": 102.4,
            "quantity": 100,
            "entryLogic": "thin edge"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["riskWarning"], true);
    assert_eq!(body["plan"]["riskRewardRatio"], "1.2");
}

#[tokio::test]
async fn test_create_sizes_position_when_quantity_omitted() {
    let TestApp { app, _temp } = setup_test_app(None).await;

    // 1,000,000 * 0.01 / 1.00 = 10,000 shares.
    let mut body = sample_plan_body();
    body.as_object_mut().unwrap().remove("quantity");
    let (status, body) = request(&app, "POST", "/v1/plans", Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["plan"]["plannedQuantity"], 10_000);
}

#[tokio::test]
async fn test_plan_dashboard_with_explicit_price() {
    let TestApp { app, _temp } = setup_test_app(None).await;

    let (_, body) = request(&app, "POST", "/v1/plans", Some(sample_plan_body())).await;
    let id = body["plan"]["id"].as_i64().unwrap();
    request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/execute"),
        Some(serde_json::json!({"price": 10.0})),
    )
    .await;

    let (status, body) = request(
        &app,
        "GET",
        &format!("/v1/plans/{id}/dashboard?currentPrice=11.5"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["priceOrigin"], "MANUAL");
    assert_eq!(body["currentPrice"], "11.5");
    // (11.5 - 10) * 200 = 300
    assert_eq!(body["pnlAmount"], "300");
    assert_eq!(body["pnlPercentage"], "15");
    assert_eq!(body["riskLevel"], "SAFE");
    // risk/share = 1.0, so R = 300 / 200 = 1.5
    assert_eq!(body["rMultiple"], "1.5");
}

#[tokio::test]
async fn test_dashboard_uses_live_quotes() {
    let prices: Arc<dyn PriceSource> = Arc::new(
        MockPriceSource::new().with_price("600519", Decimal::from_str("9.2").unwrap()),
    );
    let TestApp { app, _temp } = setup_test_app(Some(prices)).await;

    let (_, body) = request(&app, "POST", "/v1/plans", Some(sample_plan_body())).await;
    let id = body["plan"]["id"].as_i64().unwrap();
    request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/execute"),
        Some(serde_json::json!({"price": 10.0})),
    )
    .await;

    let (status, body) = request(&app, "GET", "/v1/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["generatedAt"].as_i64().is_some());
    let positions = body["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["priceOrigin"], "LIVE");
    assert_eq!(positions[0]["currentPrice"], "9.2");
    // 9.2 sits within 15% of the 9..12 span above the stop (band ends 9.45).
    assert_eq!(positions[0]["riskLevel"], "DANGER");
    assert_eq!(positions[0]["pnlAmount"], "-160");
}

#[tokio::test]
async fn test_dashboard_falls_back_when_quote_unavailable() {
    let prices: Arc<dyn PriceSource> = Arc::new(MockPriceSource::new().failing());
    let TestApp { app, _temp } = setup_test_app(Some(prices)).await;

    let (_, body) = request(&app, "POST", "/v1/plans", Some(sample_plan_body())).await;
    let id = body["plan"]["id"].as_i64().unwrap();
    request(
        &app,
        "POST",
        &format!("/v1/plans/{id}/execute"),
        Some(serde_json::json!({"price": 10.0})),
    )
    .await;

    let (status, body) = request(&app, "GET", "/v1/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let positions = body["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    // Marked at the average entry: zero unrealized PnL, clearly flagged.
    assert_eq!(positions[0]["priceOrigin"], "FALLBACK");
    assert_eq!(positions[0]["currentPrice"], "10");
    assert_eq!(positions[0]["pnlAmount"], "0");
}

#[tokio::test]
async fn test_settings_roundtrip() {
    let TestApp { app, _temp } = setup_test_app(None).await;

    let (status, body) = request(&app, "GET", "/v1/settings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCapital"], "1000000");
    assert_eq!(body["riskPercent"], "0.01");

    let (status, body) = request(
        &app,
        "PUT",
        "/v1/settings",
        Some(serde_json::json!({"totalCapital": 500000.0, "riskPercent": 0.02})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCapital"], "500000");
    assert_eq!(body["riskPercent"], "0.02");

    // New sizing uses the updated settings: 500,000 * 0.02 / 1.00 = 10,000.
    let mut plan_body = sample_plan_body();
    plan_body.as_object_mut().unwrap().remove("quantity");
    let (_, body) = request(&app, "POST", "/v1/plans", Some(plan_body)).await;
    assert_eq!(body["plan"]["plannedQuantity"], 10_000);
}
