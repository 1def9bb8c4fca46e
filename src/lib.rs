pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod marketdata;
pub mod service;

pub use config::Config;
pub use db::{init_db, Repository, Settings};
pub use domain::{
    Decimal, EventKind, PlanId, PlanStatus, Symbol, TimeMs, TradeExecution, TradePlan,
    TransactionEvent,
};
pub use error::AppError;
pub use marketdata::{HttpPriceSource, MockPriceSource, PriceSource, PriceSourceError};
pub use service::PlanService;
