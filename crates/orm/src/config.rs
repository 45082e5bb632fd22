//! Configuration for opening a [`Db`](crate::session::Db).
//!
//! ```json
//! {
//!   "connection": "sqlite://orders.db",
//!   "dialect": "sqlite",
//!   "default_timeout": "500ms",
//!   "sharding": {
//!     "sharding_key": "user_id",
//!     "database": { "default_name": "order_db", "base": 3, "is_sharding": true },
//!     "table": { "default_name": "order_tab", "base": 2, "is_sharding": true }
//!   },
//!   "replicas": { "dsn": "root:root@tcp(replicas.internal:3306)/orders", "interval": "5s" },
//!   "interceptors": ["access_log", "cost_time"]
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dialect::DialectKind;
use crate::error::ConfigError;
use crate::interceptor::InterceptorKind;
use crate::materializer::MaterializerKind;
use crate::replica::ReplicaSelectorConfig;
use crate::sharding::{HashSharding, Pattern};

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrmConfig {
    /// DSN of the primary.
    pub connection: String,

    /// SQL dialect.
    #[serde(default)]
    pub dialect: DialectKind,

    /// Row materializer strategy.
    #[serde(default)]
    pub materializer: MaterializerKind,

    /// Deadline applied to calls that set none.
    #[serde(
        with = "humantime_serde_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub default_timeout: Option<Duration>,

    /// Hash sharding scheme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharding: Option<ShardingConfig>,

    /// Replica discovery.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<ReplicaConfig>,

    /// Interceptors, outermost first.
    #[serde(default)]
    pub interceptors: Vec<InterceptorKind>,
}

/// Sharding scheme configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingConfig {
    /// Field the scheme partitions on.
    pub sharding_key: String,
    /// Database dimension.
    pub database: Pattern,
    /// Table dimension.
    pub table: Pattern,
}

impl ShardingConfig {
    /// Instantiates the hash sharding algorithm.
    pub fn build(&self) -> Result<HashSharding, ConfigError> {
        HashSharding::new(
            self.sharding_key.clone(),
            self.database.clone(),
            self.table.clone(),
        )
    }
}

/// Replica discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// DSN whose host is a domain resolving to every replica.
    pub dsn: String,

    /// Time between refreshes.
    #[serde(with = "humantime_serde", default = "default_interval")]
    pub interval: Duration,

    /// Deadline for one resolution.
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

impl ReplicaConfig {
    /// Selector timing.
    pub fn selector_config(&self) -> ReplicaSelectorConfig {
        ReplicaSelectorConfig {
            interval: self.interval,
            timeout: self.timeout,
        }
    }
}

impl OrmConfig {
    /// A configuration with only a primary connection.
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            dialect: DialectKind::default(),
            materializer: MaterializerKind::default(),
            default_timeout: None,
            sharding: None,
            replicas: None,
            interceptors: Vec::new(),
        }
    }

    /// Parses JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Load {
            message: format!("{}: {e}", path.display()),
        })?;
        Self::from_json_str(&json)
    }

    /// Checks the whole configuration and reports every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.connection.trim().is_empty() {
            errors.push(invalid("connection", "connection string is empty"));
        }
        if self.default_timeout == Some(Duration::ZERO) {
            errors.push(invalid("default_timeout", "must be positive"));
        }

        if let Some(sharding) = &self.sharding {
            if sharding.sharding_key.is_empty() {
                errors.push(invalid("sharding.sharding_key", "sharding key is empty"));
            }
            for (key, pattern) in [
                ("sharding.database", &sharding.database),
                ("sharding.table", &sharding.table),
            ] {
                if pattern.default_name.is_empty() {
                    errors.push(invalid(&format!("{key}.default_name"), "name is empty"));
                }
                if pattern.is_sharding && pattern.base == 0 {
                    errors.push(invalid(
                        &format!("{key}.base"),
                        "partition count must be positive",
                    ));
                }
            }
        }

        if let Some(replicas) = &self.replicas {
            if replicas.dsn.trim().is_empty() {
                errors.push(invalid("replicas.dsn", "connection string is empty"));
            }
            if replicas.interval.is_zero() {
                errors.push(invalid("replicas.interval", "must be positive"));
            }
            if replicas.timeout.is_zero() {
                errors.push(invalid("replicas.timeout", "must be positive"));
            }
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// Serde module for Duration with humantime format.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

mod humantime_serde_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => super::humantime_serde::serialize(d, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let config = OrmConfig::from_json_str(r#"{"connection": ":memory:"}"#).unwrap();
        assert_eq!(config, OrmConfig::new(":memory:"));
        assert_eq!(config.dialect, DialectKind::Mysql);
        assert_eq!(config.materializer, MaterializerKind::Positional);
        config.validate().unwrap();
    }

    #[test]
    fn test_durations_are_humantime() {
        let config = OrmConfig::from_json_str(
            r#"{
                "connection": ":memory:",
                "default_timeout": "250ms",
                "replicas": {"dsn": "mysql://app@replicas.local:3306/orders", "interval": "5s"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.default_timeout, Some(Duration::from_millis(250)));
        let replicas = config.replicas.as_ref().unwrap();
        assert_eq!(replicas.interval, Duration::from_secs(5));
        assert_eq!(replicas.timeout, Duration::from_secs(1));

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains(r#""default_timeout":"250ms""#));
        assert_eq!(OrmConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_bad_duration_is_a_load_error() {
        let err = OrmConfig::from_json_str(r#"{"connection": "x", "default_timeout": "soon"}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Load { .. }));
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = OrmConfig::new("");
        config.sharding = Some(ShardingConfig {
            sharding_key: "user_id".to_string(),
            database: Pattern::sharded("order_db", 0),
            table: Pattern::single("order_tab"),
        });

        match config.validate().unwrap_err() {
            ConfigError::Multiple(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains(&invalid("connection", "connection string is empty")));
                assert!(errors.contains(&invalid(
                    "sharding.database.base",
                    "partition count must be positive"
                )));
            }
            other => panic!("expected several problems, got {other}"),
        }
    }

    #[test]
    fn test_single_problem_is_reported_directly() {
        let mut config = OrmConfig::new(":memory:");
        config.replicas = Some(ReplicaConfig {
            dsn: "mysql://app@replicas.local:3306/orders".to_string(),
            interval: Duration::ZERO,
            timeout: default_timeout(),
        });
        assert_eq!(
            config.validate().unwrap_err(),
            invalid("replicas.interval", "must be positive")
        );
    }

    #[test]
    fn test_sharding_config_builds_algorithm() {
        let sharding: ShardingConfig = serde_json::from_str(
            r#"{
                "sharding_key": "user_id",
                "database": {"default_name": "order_db", "base": 3, "is_sharding": true},
                "table": {"default_name": "order_tab"}
            }"#,
        )
        .unwrap();
        let algorithm = sharding.build().unwrap();
        assert_eq!(algorithm.database().names().len(), 3);
        assert_eq!(algorithm.table().names(), vec!["order_tab"]);
    }

    #[test]
    fn test_missing_file() {
        let err = OrmConfig::from_file("/nonexistent/quarry.json").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/quarry.json"));
    }
}
