use std::{fmt::Display, path::Path, str::FromStr};

use database::DatabaseConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use types::{validation, ScoringRules};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;
const DEV_JWT_SECRET: &str = "tap-tap-trivia-dev-secret-change-me";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    File(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parsing(#[from] serde_yaml::Error),

    #[error("Invalid {key} value: {message}")]
    Invalid { key: &'static str, message: String },
}

/// Settings readable from the YAML file given with `--config`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub cookie_secure: Option<bool>,
    pub time_limit_ms: Option<u64>,
    pub token_ttl_secs: Option<i64>,
    pub base_points: Option<i64>,
    pub max_bonus: Option<i64>,
    pub seed_file: Option<String>,
}

impl FileConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&yaml)?)
    }
}

/// Values given on the command line. They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub database_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub jwt_secret: String,
    pub cookie_secure: bool,
    pub time_limit_ms: u64,
    pub token_ttl_secs: i64,
    pub scoring: ScoringRules,
    pub seed_file: Option<String>,
}

impl ServerConfig {
    pub fn load(cli: CliOverrides, file: Option<FileConfig>) -> Result<Self, ConfigError> {
        Self::from_sources(cli, |key| std::env::var(key).ok(), file.unwrap_or_default())
    }

    /// Resolves every setting as CLI, then environment, then YAML, then the
    /// built-in default.
    pub fn from_sources(
        cli: CliOverrides,
        env: impl Fn(&str) -> Option<String>,
        file: FileConfig,
    ) -> Result<Self, ConfigError> {
        let bind_addr = cli
            .bind_addr
            .or_else(|| env("TRIVIA_BIND_ADDR"))
            .or(file.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let port = match cli.port {
            Some(port) => port,
            None => layered(&env, "TRIVIA_PORT", file.port, DEFAULT_PORT)?,
        };

        let jwt_secret = match env("JWT_SECRET").or(file.jwt_secret) {
            Some(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET not set, using the development secret");
                DEV_JWT_SECRET.to_string()
            }
        };

        let cookie_secure = layered(&env, "TRIVIA_COOKIE_SECURE", file.cookie_secure, false)?;

        let requested_limit = layered(
            &env,
            "TRIVIA_TIME_LIMIT_MS",
            file.time_limit_ms,
            validation::DEFAULT_TIME_LIMIT_MS,
        )?;
        let time_limit_ms =
            validation::time_limit_ms(Some(requested_limit)).map_err(|e| ConfigError::Invalid {
                key: "TRIVIA_TIME_LIMIT_MS",
                message: e.to_string(),
            })?;

        let defaults = ScoringRules::default();
        let scoring = ScoringRules::new(
            file.base_points.unwrap_or(defaults.base_points),
            file.max_bonus.unwrap_or(defaults.max_bonus),
        );

        let database = DatabaseConfig::from_cli_or_env_or_yaml(cli.database_url, file.database_url);

        Ok(Self {
            bind_addr,
            port,
            database,
            jwt_secret,
            cookie_secure,
            time_limit_ms,
            token_ttl_secs: file.token_ttl_secs.unwrap_or(DEFAULT_TOKEN_TTL_SECS),
            scoring,
            seed_file: file.seed_file,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn layered<T>(
    env: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    from_file: Option<T>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    if let Some(raw) = env(key) {
        return raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            message: e.to_string(),
        });
    }
    Ok(from_file.unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn memory_cli() -> CliOverrides {
        CliOverrides {
            database_url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config =
            ServerConfig::from_sources(memory_cli(), env_of(&[]), FileConfig::default()).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.jwt_secret, DEV_JWT_SECRET);
        assert!(!config.cookie_secure);
        assert_eq!(config.time_limit_ms, validation::DEFAULT_TIME_LIMIT_MS);
        assert_eq!(config.token_ttl_secs, DEFAULT_TOKEN_TTL_SECS);
        assert_eq!(config.scoring, ScoringRules::default());
    }

    #[test]
    fn cli_beats_env_beats_file() {
        let file = FileConfig {
            port: Some(4000),
            bind_addr: Some("10.0.0.1".to_string()),
            time_limit_ms: Some(20_000),
            ..Default::default()
        };
        let env = env_of(&[("TRIVIA_PORT", "5000"), ("TRIVIA_BIND_ADDR", "127.0.0.1")]);
        let cli = CliOverrides {
            port: Some(6000),
            ..memory_cli()
        };

        let config = ServerConfig::from_sources(cli, env, file).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.bind_addr, "127.0.0.1");
        assert_eq!(config.time_limit_ms, 20_000);
        assert_eq!(config.address(), "127.0.0.1:6000");
    }

    #[test]
    fn env_secret_and_cookie_flag() {
        let env = env_of(&[("JWT_SECRET", "s3cret"), ("TRIVIA_COOKIE_SECURE", "true")]);
        let config = ServerConfig::from_sources(memory_cli(), env, FileConfig::default()).unwrap();
        assert_eq!(config.jwt_secret, "s3cret");
        assert!(config.cookie_secure);
    }

    #[test]
    fn malformed_env_values_are_rejected() {
        let env = env_of(&[("TRIVIA_PORT", "not-a-port")]);
        let result = ServerConfig::from_sources(memory_cli(), env, FileConfig::default());
        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                key: "TRIVIA_PORT",
                ..
            })
        ));

        let env = env_of(&[("TRIVIA_TIME_LIMIT_MS", "0")]);
        let result = ServerConfig::from_sources(memory_cli(), env, FileConfig::default());
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn yaml_file_parses() {
        let file: FileConfig = serde_yaml::from_str(
            "port: 8080\njwt_secret: from-file\nbase_points: 10\nmax_bonus: 5\n",
        )
        .unwrap();
        let config = ServerConfig::from_sources(memory_cli(), env_of(&[]), file).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.jwt_secret, "from-file");
        assert_eq!(config.scoring, ScoringRules::new(10, 5));
    }
}
