use dotenvy::dotenv;
use std::{env, time::Duration};
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    // Identity provider
    pub supabase_url:      String,
    pub supabase_anon_key: String,
    pub provider_timeout:  Duration,

    // Backend
    pub backend_host:      String,
    pub backend_port:      u16,

    // Session
    pub cookie_prefix:     String,
    pub role_claim:        String,

    // Static pages
    pub site_dir:          String,

    // App
    pub app_env:           String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        fn require(key: &str) -> Result<String, ConfigError> {
            env::var(key).map_err(|_| ConfigError::MissingVar(key.to_string()))
        }

        fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
            match env::var(key) {
                Ok(raw) => raw
                    .parse::<T>()
                    .map_err(|_| ConfigError::InvalidValue(key.to_string(), raw)),
                Err(_) => Ok(default),
            }
        }

        let supabase_url = require("SUPABASE_URL")?.trim_end_matches('/').to_owned();
        if !supabase_url.starts_with("http://") && !supabase_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue("SUPABASE_URL".into(), supabase_url));
        }

        Ok(Self {
            supabase_url,
            supabase_anon_key: require("SUPABASE_ANON_KEY")?,
            provider_timeout:  Duration::from_secs(parse_or("PROVIDER_TIMEOUT_SECS", 5u64)?),

            backend_host:      env::var("BACKEND_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            backend_port:      parse_or("BACKEND_PORT", 8080u16)?,

            cookie_prefix:     env::var("AUTH_COOKIE_PREFIX").unwrap_or_else(|_| "sb".into()),
            role_claim:        env::var("ROLE_CLAIM").unwrap_or_else(|_| "user_role".into()),

            site_dir:          env::var("SITE_DIR").unwrap_or_else(|_| "public".into()),

            app_env:           env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
        })
    }

    pub fn is_development(&self) -> bool {
        self.app_env == "development"
    }
}
