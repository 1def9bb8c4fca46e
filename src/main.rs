use std::net::SocketAddr;
use std::sync::Arc;

use tradeledger::engine::RiskGuard;
use tradeledger::marketdata::HttpPriceSource;
use tradeledger::{api, config::Config, db::init_db, PlanService, PriceSource, Repository, Settings};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let port = config.port;

    // Initialize database and dependencies
    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };

    let repo = Arc::new(Repository::new(pool));
    let defaults = Settings {
        total_capital: config.default_total_capital,
        risk_percent: config.default_risk_percent,
    };
    if let Err(e) = repo.ensure_default_settings(defaults).await {
        eprintln!("Failed to seed default settings: {}", e);
        std::process::exit(1);
    }

    let service = Arc::new(PlanService::new(
        repo,
        RiskGuard::new(config.lot_size),
        defaults,
    ));
    let prices: Option<Arc<dyn PriceSource>> = config
        .quote_api_url
        .clone()
        .map(|url| Arc::new(HttpPriceSource::new(url)) as Arc<dyn PriceSource>);

    // Create router
    let app = api::create_router(api::AppState::new(service, config, prices));

    // Bind to address
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Server listening on {}", addr);

    // Run server
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
