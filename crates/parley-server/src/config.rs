use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonwebtoken::Algorithm;

use parley_api::auth::AuthConfig;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me",
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "secret",
];

pub struct ModelConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub auth: AuthConfig,
    pub model: ModelConfig,
}

impl ServerConfig {
    /// Read configuration from the process environment (after `.env`).
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let host = var("PARLEY_HOST", "0.0.0.0");
        let port: u16 = var("PARLEY_PORT", "3000")
            .parse()
            .context("PARLEY_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let secret = lookup("PARLEY_JWT_SECRET").unwrap_or_default();
        if secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&secret.as_str()) {
            bail!("PARLEY_JWT_SECRET is unset or still a placeholder");
        }

        let algorithm: Algorithm = var("PARLEY_JWT_ALGORITHM", "HS256")
            .parse()
            .map_err(|e| anyhow!("PARLEY_JWT_ALGORITHM: {}", e))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            bail!("PARLEY_JWT_ALGORITHM must be one of HS256, HS384, HS512");
        }

        let ttl_minutes: i64 = var("PARLEY_TOKEN_TTL_MINUTES", "60")
            .parse()
            .context("PARLEY_TOKEN_TTL_MINUTES must be a whole number")?;
        if ttl_minutes <= 0 {
            bail!("PARLEY_TOKEN_TTL_MINUTES must be positive");
        }

        let timeout_secs: u64 = var("PARLEY_MODEL_TIMEOUT_SECS", "30")
            .parse()
            .context("PARLEY_MODEL_TIMEOUT_SECS must be a whole number")?;
        if timeout_secs == 0 {
            bail!("PARLEY_MODEL_TIMEOUT_SECS must be positive");
        }

        Ok(Self {
            addr,
            db_path: var("PARLEY_DB_PATH", "parley.db").into(),
            auth: AuthConfig {
                secret,
                algorithm,
                token_ttl: chrono::Duration::minutes(ttl_minutes),
            },
            model: ModelConfig {
                base_url: var("PARLEY_MODEL_BASE_URL", "https://api.openai.com/v1"),
                api_key: lookup("PARLEY_MODEL_API_KEY").filter(|k| !k.trim().is_empty()),
                model: var("PARLEY_MODEL", "gpt-4o-mini"),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}
