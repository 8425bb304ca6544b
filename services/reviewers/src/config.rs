use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::db::DbConfig;

/// Which store implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            other => bail!("unknown store kind {other:?}; expected postgres or memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub dev_mode: bool,
    pub store: StoreKind,
    /// Required on mutating routes when set.
    pub admin_token: Option<String>,
    pub request_timeout: Duration,
    pub database: DbConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("REVIEWERS_LISTEN_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()?;

        let log_level =
            std::env::var("REVIEWERS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let dev_mode = std::env::var("REVIEWERS_DEV")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let store = std::env::var("REVIEWERS_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let admin_token = std::env::var("REVIEWERS_ADMIN_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let request_timeout = match std::env::var("REVIEWERS_REQUEST_TIMEOUT_SECS") {
            Ok(v) => Duration::from_secs(v.parse()?),
            Err(_) => Duration::from_secs(30),
        };

        let database = DbConfig::from_env();

        Ok(Self {
            listen_addr,
            log_level,
            dev_mode,
            store,
            admin_token,
            request_timeout,
            database,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_kind_parsing() {
        assert_eq!("postgres".parse::<StoreKind>().unwrap(), StoreKind::Postgres);
        assert_eq!("Memory".parse::<StoreKind>().unwrap(), StoreKind::Memory);
        assert!("sqlite".parse::<StoreKind>().is_err());
    }
}
