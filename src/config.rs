// config.rs
use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::poll::CounterPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("DATABASE_URL must be set when POLL_STORE=postgres")]
    MissingDatabaseUrl,

    #[error("Unknown POLL_STORE value: {0}")]
    UnknownBackend(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String, max_connections: u32 },
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub backend: StoreBackend,
    pub counter_policy: CounterPolicy,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let backend = match var("POLL_STORE").as_deref() {
            Err(_) | Ok("postgres") => StoreBackend::Postgres {
                database_url: var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)?,
                max_connections: try_load("DATABASE_MAX_CONNECTIONS", 5),
            },
            Ok("memory") => StoreBackend::Memory,
            Ok(other) => return Err(ConfigError::UnknownBackend(other.to_string())),
        };

        let counter_policy = match var("POLL_COUNTER_POLICY").as_deref() {
            Ok("retry") => CounterPolicy::Retry {
                attempts: try_load("POLL_COUNTER_RETRIES", 3),
                backoff: Duration::from_millis(try_load("POLL_COUNTER_BACKOFF_MS", 50)),
            },
            Ok("fallback") | Err(_) => CounterPolicy::ReadModifyWrite,
            Ok(other) => {
                warn!("Unknown POLL_COUNTER_POLICY {other}, using fallback");
                CounterPolicy::ReadModifyWrite
            }
        };

        Ok(Self {
            port: try_load("PORT", 3030),
            backend,
            counter_policy,
        })
    }
}

fn var(key: &str) -> Result<String, env::VarError> {
    env::var(key)
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value {raw}: {e}, using default: {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_load_falls_back_on_garbage() {
        env::set_var("POLL_TEST_GARBAGE_PORT", "not-a-number");
        assert_eq!(try_load::<u16>("POLL_TEST_GARBAGE_PORT", 3030), 3030);

        env::set_var("POLL_TEST_GOOD_PORT", "8080");
        assert_eq!(try_load::<u16>("POLL_TEST_GOOD_PORT", 3030), 8080);

        assert_eq!(try_load::<u32>("POLL_TEST_UNSET_VALUE", 7), 7);
    }
}
