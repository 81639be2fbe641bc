use crate::error::{Error, Result};
use chrono::FixedOffset;
use dotenvy::dotenv;
use std::env;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub evolution_api_url: String,
    pub evolution_api_key: String,
    pub evolution_instance: String,
    pub webhook_token: Option<String>,
    pub api_rps: u32,
    pub webhook_rps: u32,
    /// Offset of the wall clock campaign windows are evaluated in.
    pub campaign_utc_offset: FixedOffset,
    pub campaign_tick_secs: u64,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        let offset_hours: i32 = get_env_parse_or("CAMPAIGN_TZ_OFFSET_HOURS", -3)?;
        let campaign_utc_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            Error::Config(format!(
                "Invalid value for CAMPAIGN_TZ_OFFSET_HOURS: {}",
                offset_hours
            ))
        })?;

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            evolution_api_url: get_env("EVOLUTION_API_URL")?,
            evolution_api_key: get_env("EVOLUTION_API_KEY")?,
            evolution_instance: get_env("EVOLUTION_INSTANCE")?,
            webhook_token: env::var("WEBHOOK_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            api_rps: get_env_parse_or("API_RPS", 50)?,
            webhook_rps: get_env_parse_or("WEBHOOK_RPS", 200)?,
            campaign_utc_offset,
            campaign_tick_secs: get_env_parse_or("CAMPAIGN_TICK_SECS", 60)?,
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        _ => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

/// Like [`init_config`], but a second call is a no-op. Integration tests share one process.
pub fn init_config_once() -> Result<&'static Config> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = Config::from_env()?;
    Ok(CONFIG.get_or_init(|| config))
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}
