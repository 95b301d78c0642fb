//! Application configuration loaded from environment variables.

use wasteloop_engine::EnginePolicy;

use crate::errors::{ApiError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) the sweeper demotes expired requests
    pub sweep_interval_secs: u64,
    /// Hours until a declared organic lot expires
    pub expiry_hours: i64,
    /// Points credited per declared lot
    pub declaration_bonus: i64,
    /// Points credited per completed delivery
    pub collection_bonus: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = EnginePolicy::default();
        Ok(Config {
            api_port: env_var("API_PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid API_PORT".to_string()))?,
            sweep_interval_secs: env_var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid SWEEP_INTERVAL_SECS".to_string()))?,
            expiry_hours: env_var("EXPIRY_HOURS")
                .unwrap_or_else(|_| defaults.expiry_hours.to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid EXPIRY_HOURS".to_string()))?,
            declaration_bonus: env_var("DECLARATION_BONUS")
                .unwrap_or_else(|_| defaults.declaration_bonus.to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid DECLARATION_BONUS".to_string()))?,
            collection_bonus: env_var("COLLECTION_BONUS")
                .unwrap_or_else(|_| defaults.collection_bonus.to_string())
                .parse()
                .map_err(|_| ApiError::Config("Invalid COLLECTION_BONUS".to_string()))?,
        })
    }

    /// Engine policy with the configured overrides applied.
    pub fn policy(&self) -> EnginePolicy {
        EnginePolicy {
            expiry_hours: self.expiry_hours,
            declaration_bonus: self.declaration_bonus,
            collection_bonus: self.collection_bonus,
            ..EnginePolicy::default()
        }
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| ApiError::Config(format!("Missing env var: {key}")))
}
