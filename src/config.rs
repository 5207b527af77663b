use std::{fmt, time::Duration};

use anyhow::{bail, Context};

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub ttl_hours: i64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("ttl_hours", &self.ttl_hours)
            .finish()
    }
}

/// Which backing store the credential and todo stores use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Postgres {
        database_url: String,
        max_connections: u32,
    },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt: JwtConfig,
    pub store: StoreBackend,
    pub store_timeout: Duration,
    pub host: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let secret = get("JWT_SECRET").context("JWT_SECRET must be set")?;
        if secret.trim().is_empty() {
            bail!("JWT_SECRET must not be empty");
        }
        let ttl_hours = parse_or(&get, "JWT_TTL_HOURS", 24i64)?;
        if ttl_hours <= 0 {
            bail!("JWT_TTL_HOURS must be positive");
        }

        let store = match get("STORE_BACKEND")
            .unwrap_or_else(|| "memory".into())
            .to_lowercase()
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres {
                database_url: get("DATABASE_URL")
                    .context("DATABASE_URL must be set when STORE_BACKEND=postgres")?,
                max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10u32)?,
            },
            other => bail!("unknown STORE_BACKEND {other:?}, expected memory or postgres"),
        };

        let timeout_ms = parse_or(&get, "STORE_TIMEOUT_MS", 5_000u64)?;

        Ok(Self {
            jwt: JwtConfig { secret, ttl_hours },
            store,
            store_timeout: Duration::from_millis(timeout_ms),
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080u16)?,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
pub fn test_config() -> AppConfig {
    AppConfig {
        jwt: JwtConfig {
            secret: "test-secret".into(),
            ttl_hours: 24,
        },
        store: StoreBackend::Memory,
        store_timeout: Duration::from_secs(5),
        host: "127.0.0.1".into(),
        port: 0,
    }
}
