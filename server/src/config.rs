//! Runtime configuration, read once from the environment at startup.
//!
//! A `.env` file in the working directory is honoured for local development.

use std::net::SocketAddr;

use time::Duration;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_DATABASE: &str = "doctorsPortal";
pub const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Upper bound keeping `now + ttl` far inside the representable date range.
pub const MAX_TOKEN_TTL_SECS: i64 = 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub mongodb_uri: String,
    pub database_name: String,
    pub access_token_secret: String,
    pub access_token_ttl: Duration,
    pub stripe_secret_key: String,
    pub stripe_api_base: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required =
            |key: &str| lookup(key).ok_or_else(|| ConfigError::MissingVar(key.to_string()));

        let port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let bind_address = SocketAddr::from(([0, 0, 0, 0], port));

        // An explicit URI wins; otherwise assemble the Atlas SRV string from its parts.
        let mongodb_uri = match lookup("MONGODB_URI") {
            Some(uri) => uri,
            None => format!(
                "mongodb+srv://{}:{}@{}/?retryWrites=true&w=majority",
                required("DB_USER")?,
                required("DB_PASS")?,
                required("MONGODB_HOST")?,
            ),
        };

        let database_name =
            lookup("MONGODB_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let access_token_secret = required("ACCESS_TOKEN_SECRET")?;
        let access_token_ttl = match lookup("ACCESS_TOKEN_TTL_SECS") {
            Some(secs) => {
                let secs = secs.parse::<i64>().map_err(|e| {
                    ConfigError::InvalidValue("ACCESS_TOKEN_TTL_SECS".to_string(), e.to_string())
                })?;
                if secs <= 0 || secs > MAX_TOKEN_TTL_SECS {
                    return Err(ConfigError::InvalidValue(
                        "ACCESS_TOKEN_TTL_SECS".to_string(),
                        format!("must be between 1 and {}", MAX_TOKEN_TTL_SECS),
                    ));
                }
                Duration::seconds(secs)
            }
            None => Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        };

        let stripe_secret_key = required("STRIPE_SECRET_KEY")?;
        let stripe_api_base = lookup("STRIPE_API_BASE")
            .unwrap_or_else(|| DEFAULT_STRIPE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bind_address,
            mongodb_uri,
            database_name,
            access_token_secret,
            access_token_ttl,
            stripe_secret_key,
            stripe_api_base,
        })
    }
}
