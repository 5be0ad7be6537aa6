//! Server configuration, read once at startup.
//!
//! Reads config from env vars:
//!   LEARNING_DATABASE_URL        Postgres connection string (required)
//!   LEARNING_BIND_ADDR           listen address (default: 0.0.0.0:4200)
//!   LEARNING_AGENT_ID            agent tag stamped on events (default: review-learning-agent)
//!   LEARNING_AGENT_VERSION       agent version tag (default: crate version)
//!   LEARNING_DB_MAX_CONNECTIONS  pool size (default: 10)
//!   LEARNING_RUN_MIGRATIONS      apply migrations on boot (default: true)

use anyhow::{anyhow, bail, Context, Result};
use learning_core::AgentIdentity;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:4200";
pub const DEFAULT_AGENT_ID: &str = "review-learning-agent";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: String,
    pub agent: AgentIdentity,
    pub db_max_connections: u32,
    pub run_migrations: bool,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests never touch process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url =
            get("LEARNING_DATABASE_URL").ok_or_else(|| anyhow!("LEARNING_DATABASE_URL must be set"))?;

        let db_max_connections = match get("LEARNING_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .with_context(|| format!("LEARNING_DB_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        if db_max_connections == 0 {
            bail!("LEARNING_DB_MAX_CONNECTIONS must be at least 1");
        }

        let run_migrations = match get("LEARNING_RUN_MIGRATIONS") {
            Some(raw) => parse_bool(&raw)
                .ok_or_else(|| anyhow!("LEARNING_RUN_MIGRATIONS must be true or false, got {raw}"))?,
            None => true,
        };

        Ok(Self {
            database_url,
            bind_addr: get("LEARNING_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            agent: AgentIdentity {
                agent_id: get("LEARNING_AGENT_ID").unwrap_or_else(|| DEFAULT_AGENT_ID.into()),
                agent_version: get("LEARNING_AGENT_VERSION")
                    .unwrap_or_else(|| env!("CARGO_PKG_VERSION").into()),
            },
            db_max_connections,
            run_migrations,
        })
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
