use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::dtos::temporary_permissions::MAX_EXPIRING_WINDOW_HOURS;

#[derive(Debug, Clone, Deserialize)]
pub struct PermissionConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
    pub rate_limit: RateLimitConfig,
    pub grants: GrantConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// Access tokens are minted by the auth service; only the public key is
/// needed to verify them. The private key is optional and used by tooling.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub public_key_path: String,
    pub private_key_path: Option<String>,
    pub access_token_expiry_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub global_ip_limit: u32,
    pub global_ip_window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GrantConfig {
    /// Lifetime of a grant issued from an approved request that named no expiry.
    pub default_request_grant_hours: i64,
    /// Window used by the dashboard's "expiring soon" list.
    pub expiring_soon_hours: i64,
}

impl PermissionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = PermissionConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("permission-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            jwt: JwtConfig {
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                private_key_path: env::var("JWT_PRIVATE_KEY_PATH").ok().filter(|v| !v.is_empty()),
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?,
            },
            rate_limit: RateLimitConfig {
                global_ip_limit: get_env("RATE_LIMIT_GLOBAL_IP_LIMIT", Some("100"), is_prod)?
                    .parse()
                    .unwrap_or(100),
                global_ip_window_seconds: get_env(
                    "RATE_LIMIT_GLOBAL_IP_WINDOW_SECONDS",
                    Some("60"),
                    is_prod,
                )?
                .parse()
                .unwrap_or(60),
            },
            grants: GrantConfig {
                default_request_grant_hours: parse_env("DEFAULT_REQUEST_GRANT_HOURS", "24", is_prod)?,
                expiring_soon_hours: parse_env("EXPIRING_SOON_HOURS", "24", is_prod)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.database.max_connections == 0
            || self.database.min_connections > self.database.max_connections
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS must not exceed a non-zero DATABASE_MAX_CONNECTIONS"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.grants.default_request_grant_hours <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_REQUEST_GRANT_HOURS must be positive"
            )));
        }

        if self.grants.expiring_soon_hours <= 0
            || self.grants.expiring_soon_hours > MAX_EXPIRING_WINDOW_HOURS
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "EXPIRING_SOON_HOURS must be between 1 and {}",
                MAX_EXPIRING_WINDOW_HOURS
            )));
        }

        if self.grants.default_request_grant_hours > MAX_EXPIRING_WINDOW_HOURS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DEFAULT_REQUEST_GRANT_HOURS must not exceed {}",
                MAX_EXPIRING_WINDOW_HOURS
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            if self.swagger.enabled == SwaggerMode::Public {
                tracing::warn!("Swagger UI is publicly accessible in production");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod && default.is_none() {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PermissionConfig {
        PermissionConfig {
            common: core_config::Config::default(),
            environment: Environment::Dev,
            service_name: "permission-service".into(),
            service_version: "0.1.0".into(),
            log_level: "info".into(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "postgres://localhost/permissions".into(),
                max_connections: 10,
                min_connections: 1,
            },
            jwt: JwtConfig {
                public_key_path: "public.pem".into(),
                private_key_path: None,
                access_token_expiry_minutes: 15,
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".into()],
            },
            swagger: SwaggerConfig {
                enabled: SwaggerMode::Public,
            },
            rate_limit: RateLimitConfig {
                global_ip_limit: 100,
                global_ip_window_seconds: 60,
            },
            grants: GrantConfig {
                default_request_grant_hours: 24,
                expiring_soon_hours: 24,
            },
        }
    }

    #[test]
    fn accepts_sane_defaults() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn rejects_zero_port() {
        let mut config = sample();
        config.common.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_non_positive_grant_window() {
        let mut config = sample();
        config.grants.default_request_grant_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_windows_beyond_a_year() {
        let mut config = sample();
        config.grants.expiring_soon_hours = 3_000_000_000;
        assert!(config.validate().is_err());

        let mut config = sample();
        config.grants.default_request_grant_hours = 9_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_pool_bounds() {
        let mut config = sample();
        config.database.min_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn wildcard_cors_is_dev_only() {
        let mut config = sample();
        config.security.allowed_origins = vec!["*".into()];
        assert!(config.validate().is_ok());

        config.environment = Environment::Prod;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_modes_case_insensitively() {
        assert_eq!("PROD".parse::<Environment>(), Ok(Environment::Prod));
        assert_eq!("Disabled".parse::<SwaggerMode>(), Ok(SwaggerMode::Disabled));
        assert!("staging".parse::<Environment>().is_err());
    }
}
