//! Runtime configuration loaded from the environment
//!
//! A `.env` file is honoured for local development. Tests build [`Config`]
//! directly instead of going through the environment.

use std::env;

use thiserror::Error;
use tracing::info;

/// Lifetime of a session token and of the cookie carrying it
pub const SESSION_TTL_HOURS: i64 = 6;

/// Name of the cookie holding the session token
pub const SESSION_COOKIE: &str = "token";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for environment variable {0}: {1}")]
    InvalidValue(&'static str, String),
}

/// Settings read once at startup and shared by every request
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port the server binds to
    pub port: u16,

    /// Path of the embedded database file
    pub database_path: String,

    /// HMAC secret used to sign session tokens
    pub token_secret: String,

    /// Origins allowed to make credentialed cross-origin requests
    pub cors_origins: Vec<String>,

    /// Production mode switches the session cookie to `Secure; SameSite=None`
    pub production: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PORT` - Server port number (default: 5000)
    /// - `DATABASE_URL` - Path to the database file (default: "data.db")
    /// - `ACCESS_TOKEN_SECRET` - Token signing secret (required)
    /// - `CORS_ORIGINS` - Comma-separated allowed origins (default: "http://localhost:5173")
    /// - `APP_ENV` - "production" enables production cookie attributes
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue("PORT", e.to_string()))?,
            Err(_) => {
                info!("PORT not set, using default: 5000");
                5000
            }
        };

        let database_path = env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string());

        let token_secret = env::var("ACCESS_TOKEN_SECRET")
            .map_err(|_| ConfigError::MissingVar("ACCESS_TOKEN_SECRET"))?;
        if token_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "ACCESS_TOKEN_SECRET",
                "secret must not be empty".to_string(),
            ));
        }

        let cors_origins = match env::var("CORS_ORIGINS") {
            Ok(raw) => parse_origins(&raw)?,
            Err(_) => vec!["http://localhost:5173".to_string()],
        };

        let production = matches!(
            env::var("APP_ENV").as_deref(),
            Ok("production") | Ok("prod")
        );

        Ok(Self {
            port,
            database_path,
            token_secret,
            cors_origins,
            production,
        })
    }

    /// `Set-Cookie` value carrying a freshly issued session token
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; {}; Max-Age={}",
            SESSION_COOKIE,
            token,
            self.cookie_attributes(),
            SESSION_TTL_HOURS * 60 * 60
        )
    }

    /// `Set-Cookie` value that makes the browser drop the session token
    pub fn cleared_session_cookie(&self) -> String {
        format!("{}=; {}; Max-Age=0", SESSION_COOKIE, self.cookie_attributes())
    }

    fn cookie_attributes(&self) -> &'static str {
        if self.production {
            "HttpOnly; Path=/; Secure; SameSite=None"
        } else {
            "HttpOnly; Path=/; SameSite=Strict"
        }
    }
}

/// Splits a comma-separated origin list.
///
/// A `*` entry is refused: the session cookie needs credentialed CORS, which
/// only works with explicit origins.
fn parse_origins(raw: &str) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if origins.iter().any(|o| o == "*") {
        return Err(ConfigError::InvalidValue(
            "CORS_ORIGINS",
            "wildcard origin cannot be combined with credentials; list origins explicitly"
                .to_string(),
        ));
    }
    Ok(origins)
}
