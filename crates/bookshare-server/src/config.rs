use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::TimeDelta;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub jwt_secret: String,
    /// Listings older than this are deactivated by the sweeper.
    pub listing_retention: TimeDelta,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let jwt_secret = var("BOOKSHARE_JWT_SECRET", "");
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("BOOKSHARE_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("BOOKSHARE_HOST", "0.0.0.0");
        let port: u16 = var("BOOKSHARE_PORT", "3000")
            .parse()
            .context("BOOKSHARE_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("BOOKSHARE_HOST must be an IP address")?;

        let retention_days: i64 = var("BOOKSHARE_LISTING_RETENTION_DAYS", "30")
            .parse()
            .context("BOOKSHARE_LISTING_RETENTION_DAYS must be a whole number of days")?;
        let listing_retention = TimeDelta::try_days(retention_days)
            .filter(|d| *d > TimeDelta::zero())
            .context("BOOKSHARE_LISTING_RETENTION_DAYS must be positive")?;

        let sweep_secs: u64 = var("BOOKSHARE_SWEEP_INTERVAL_SECS", "86400")
            .parse()
            .context("BOOKSHARE_SWEEP_INTERVAL_SECS must be a number of seconds")?;
        if sweep_secs == 0 {
            bail!("BOOKSHARE_SWEEP_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            db_path: var("BOOKSHARE_DB_PATH", "bookshare.db").into(),
            addr,
            jwt_secret,
            listing_retention,
            sweep_interval: Duration::from_secs(sweep_secs),
        })
    }
}
