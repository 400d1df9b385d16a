use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::{allocator::IdStrategy, namespace::KeyMode};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid {key} value: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub struct FirebaseConfig {
    pub database_url: String,
    pub service_account: Option<String>,
    pub secret: Option<String>,
}

pub enum Backend {
    Firebase(FirebaseConfig),
    Memory,
}

pub struct Config {
    pub port: u16,
    pub backend: Backend,
    pub webhook_url: Option<String>,
    pub id_strategy: IdStrategy,
    pub key_mode: KeyMode,
    pub tasks_namespace: String,
    pub store_timeout: Duration,
    pub notify_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            backend: Backend::Memory,
            webhook_url: None,
            id_strategy: IdStrategy::default(),
            key_mode: KeyMode::default(),
            tasks_namespace: "/".to_string(),
            store_timeout: Duration::from_secs(5),
            notify_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_source(|key| var(key).or_else(|| read_secret(key)))
    }

    pub fn from_source(source: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let backend = match try_load::<String>(&source, "STORE_BACKEND", "firebase")?.as_str() {
            "memory" => Backend::Memory,
            "firebase" => Backend::Firebase(FirebaseConfig {
                database_url: source("FIREBASE_DATABASE_URL")
                    .ok_or(ConfigError::Missing("FIREBASE_DATABASE_URL"))?,
                service_account: source("FIREBASE_SERVICE_ACCOUNT"),
                secret: source("FIREBASE_DATABASE_SECRET"),
            }),
            other => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    reason: format!("unknown backend {other}"),
                });
            }
        };

        Ok(Self {
            port: try_load(&source, "PORT", "8080")?,
            backend,
            webhook_url: source("SLACK_WEBHOOK_URL"),
            id_strategy: try_load(&source, "ID_STRATEGY", "counter")?,
            key_mode: try_load(&source, "KEY_MODE", "keyed")?,
            tasks_namespace: try_load(&source, "TASKS_NAMESPACE", "/")?,
            store_timeout: Duration::from_millis(try_load(&source, "STORE_TIMEOUT_MS", "5000")?),
            notify_timeout: Duration::from_millis(try_load(&source, "NOTIFY_TIMEOUT_MS", "5000")?),
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(
    source: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    source(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .ok()
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, time::Duration};

    use super::{Backend, Config, ConfigError};
    use crate::{allocator::IdStrategy, namespace::KeyMode};

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();

        Config::from_source(|key| map.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = from_pairs(&[("FIREBASE_DATABASE_URL", "https://todo.firebaseio.com")])
            .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.id_strategy, IdStrategy::Counter);
        assert_eq!(config.key_mode, KeyMode::Keyed);
        assert_eq!(config.tasks_namespace, "/");
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert!(config.webhook_url.is_none());
        assert!(matches!(
            config.backend,
            Backend::Firebase(ref firebase) if firebase.database_url == "https://todo.firebaseio.com"
        ));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("STORE_BACKEND", "memory"),
            ("PORT", "3000"),
            ("ID_STRATEGY", "transactional"),
            ("KEY_MODE", "pushed"),
            ("SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/T/B/X"),
            ("NOTIFY_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.port, 3000);
        assert!(matches!(config.backend, Backend::Memory));
        assert_eq!(config.id_strategy, IdStrategy::Transactional);
        assert_eq!(config.key_mode, KeyMode::Pushed);
        assert_eq!(config.notify_timeout, Duration::from_millis(250));
        assert!(config.webhook_url.is_some());
    }

    #[test]
    fn test_firebase_needs_url() {
        assert!(matches!(
            from_pairs(&[]),
            Err(ConfigError::Missing("FIREBASE_DATABASE_URL"))
        ));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            from_pairs(&[("STORE_BACKEND", "memory"), ("PORT", "eighty")]),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            from_pairs(&[("STORE_BACKEND", "redis")]),
            Err(ConfigError::Invalid { key: "STORE_BACKEND", .. })
        ));
        assert!(matches!(
            from_pairs(&[("STORE_BACKEND", "memory"), ("ID_STRATEGY", "random")]),
            Err(ConfigError::Invalid { key: "ID_STRATEGY", .. })
        ));
    }
}
