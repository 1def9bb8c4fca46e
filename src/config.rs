use crate::domain::Decimal;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Base URL of the quote service; None disables live price lookups and
    /// dashboard callers must supply a price themselves.
    pub quote_api_url: Option<String>,
    /// Shares per lot; all quantities must be positive multiples of this.
    pub lot_size: i64,
    /// Seed values for the settings row on first startup.
    pub default_total_capital: Decimal,
    pub default_risk_percent: Decimal,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let quote_api_url = env_map.get("QUOTE_API_URL").cloned().filter(|s| !s.is_empty());

        let lot_size = env_map
            .get("LOT_SIZE")
            .map(|s| s.as_str())
            .unwrap_or("100")
            .parse::<i64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "LOT_SIZE".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let default_total_capital = parse_decimal(&env_map, "DEFAULT_TOTAL_CAPITAL", "1000000")?;
        let default_risk_percent = parse_decimal(&env_map, "DEFAULT_RISK_PERCENT", "0.01")?;

        Ok(Config {
            port,
            database_path,
            quote_api_url,
            lot_size,
            default_total_capital,
            default_risk_percent,
        })
    }
}

fn parse_decimal(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
) -> Result<Decimal, ConfigError> {
    let raw = env_map.get(key).map(|s| s.as_str()).unwrap_or(default);
    Decimal::from_str_canonical(raw).map_err(|_| {
        ConfigError::InvalidValue(key.to_string(), "must be a valid decimal".to_string())
    })
}
