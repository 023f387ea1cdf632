//! Auth configuration loaded from environment variables.

use chrono::Duration;
use thiserror::Error;

use crate::issuer::TokenTtls;

const DEV_JWT_SECRET: &str = "thisisasamplesecret";

/// Upper bounds on configured lifetimes: one year in minutes, ten years in days.
const MAX_TTL_MINUTES: i64 = 366 * 24 * 60;
const MAX_TTL_DAYS: i64 = 3650;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),

    #[error("{key} is not a valid {expected}: '{value}'")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Credentials for the admin account created at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct DefaultAdmin {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for DefaultAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DefaultAdmin")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub production: bool,
    pub jwt_secret: String,
    pub access_expiration_minutes: i64,
    pub refresh_expiration_days: i64,
    pub reset_password_expiration_minutes: i64,
    pub verify_email_expiration_minutes: i64,
    pub port: u16,
    pub cookie_secure: bool,
    pub database_url: Option<String>,
    pub default_admin: Option<DefaultAdmin>,
}

impl core::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("production", &self.production)
            .field("access_expiration_minutes", &self.access_expiration_minutes)
            .field("refresh_expiration_days", &self.refresh_expiration_days)
            .field("port", &self.port)
            .field("cookie_secure", &self.cookie_secure)
            .field("database", &self.database_url.is_some())
            .field("default_admin", &self.default_admin)
            .finish_non_exhaustive()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            production: false,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_expiration_minutes: 30,
            refresh_expiration_days: 30,
            reset_password_expiration_minutes: 10,
            verify_email_expiration_minutes: 10,
            port: 3000,
            cookie_secure: true,
            database_url: None,
            default_admin: None,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset and empty values fall back to
    /// defaults; `JWT_SECRET` is mandatory when `APP_ENV=production`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let production = get("APP_ENV").is_some_and(|v| v.eq_ignore_ascii_case("production"));

        let jwt_secret = match get("JWT_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                defaults.jwt_secret
            }
        };

        let default_admin = match (
            get("DEFAULT_ADMIN_EMAIL"),
            get("DEFAULT_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(DefaultAdmin {
                name: get("DEFAULT_ADMIN_NAME").unwrap_or_else(|| "Admin".to_string()),
                email,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            production,
            jwt_secret,
            access_expiration_minutes: bounded(
                "JWT_ACCESS_EXPIRATION_MINUTES",
                get("JWT_ACCESS_EXPIRATION_MINUTES"),
                defaults.access_expiration_minutes,
                MAX_TTL_MINUTES,
            )?,
            refresh_expiration_days: bounded(
                "JWT_REFRESH_EXPIRATION_DAYS",
                get("JWT_REFRESH_EXPIRATION_DAYS"),
                defaults.refresh_expiration_days,
                MAX_TTL_DAYS,
            )?,
            reset_password_expiration_minutes: bounded(
                "JWT_RESET_PASSWORD_EXPIRATION_MINUTES",
                get("JWT_RESET_PASSWORD_EXPIRATION_MINUTES"),
                defaults.reset_password_expiration_minutes,
                MAX_TTL_MINUTES,
            )?,
            verify_email_expiration_minutes: bounded(
                "JWT_VERIFY_EMAIL_EXPIRATION_MINUTES",
                get("JWT_VERIFY_EMAIL_EXPIRATION_MINUTES"),
                defaults.verify_email_expiration_minutes,
                MAX_TTL_MINUTES,
            )?,
            port: match get("PORT") {
                Some(v) => v.parse().map_err(|_| ConfigError::Invalid {
                    key: "PORT",
                    expected: "port number",
                    value: v,
                })?,
                None => defaults.port,
            },
            cookie_secure: match get("COOKIE_SECURE") {
                Some(v) => parse_bool("COOKIE_SECURE", v)?,
                None => defaults.cookie_secure,
            },
            database_url: get("DATABASE_URL"),
            default_admin,
        })
    }

    /// Lifetimes as durations. Fields set outside `from_lookup` are clamped
    /// to the same bounds.
    pub fn ttls(&self) -> TokenTtls {
        let minutes = |n: i64| Duration::minutes(n.clamp(1, MAX_TTL_MINUTES));
        TokenTtls {
            access: minutes(self.access_expiration_minutes),
            refresh: Duration::days(self.refresh_expiration_days.clamp(1, MAX_TTL_DAYS)),
            reset_password: minutes(self.reset_password_expiration_minutes),
            verify_email: minutes(self.verify_email_expiration_minutes),
        }
    }
}

fn bounded(
    key: &'static str,
    raw: Option<String>,
    default: i64,
    max: i64,
) -> Result<i64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.parse::<i64>() {
        Ok(n) if (1..=max).contains(&n) => Ok(n),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "positive integer within the allowed lifetime",
            value: raw,
        }),
    }
}

fn parse_bool(key: &'static str, raw: String) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            expected: "boolean",
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<AuthConfig, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AuthConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, AuthConfig::default());
        assert_eq!(config.ttls(), TokenTtls::default());
    }

    #[test]
    fn values_are_read_and_trimmed() {
        let config = load(&[
            ("JWT_SECRET", " s3cret "),
            ("JWT_ACCESS_EXPIRATION_MINUTES", "5"),
            ("JWT_REFRESH_EXPIRATION_DAYS", "7"),
            ("PORT", "8080"),
            ("COOKIE_SECURE", "false"),
            ("DATABASE_URL", "postgres://localhost/clinic"),
        ])
        .unwrap();

        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.ttls().access, Duration::minutes(5));
        assert_eq!(config.ttls().refresh, Duration::days(7));
        assert_eq!(config.port, 8080);
        assert!(!config.cookie_secure);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/clinic"));
    }

    #[test]
    fn production_requires_a_secret() {
        assert_eq!(
            load(&[("APP_ENV", "production")]).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
        assert!(load(&[("APP_ENV", "production"), ("JWT_SECRET", "x")]).unwrap().production);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        let err = load(&[("JWT_ACCESS_EXPIRATION_MINUTES", "0")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "JWT_ACCESS_EXPIRATION_MINUTES",
                ..
            }
        ));
        assert!(load(&[("PORT", "http")]).is_err());

        let err = load(&[("JWT_REFRESH_EXPIRATION_DAYS", "99999999999999")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "JWT_REFRESH_EXPIRATION_DAYS",
                ..
            }
        ));
        assert!(load(&[("JWT_VERIFY_EMAIL_EXPIRATION_MINUTES", "9223372036854775807")]).is_err());
        assert!(load(&[("JWT_REFRESH_EXPIRATION_DAYS", "3650")]).is_ok());
        assert!(load(&[("COOKIE_SECURE", "maybe")]).is_err());
    }

    #[test]
    fn out_of_range_fields_are_clamped() {
        let config = AuthConfig {
            access_expiration_minutes: i64::MAX,
            refresh_expiration_days: i64::MAX,
            reset_password_expiration_minutes: -5,
            ..AuthConfig::default()
        };
        let ttls = config.ttls();
        assert_eq!(ttls.access, Duration::minutes(MAX_TTL_MINUTES));
        assert_eq!(ttls.refresh, Duration::days(MAX_TTL_DAYS));
        assert_eq!(ttls.reset_password, Duration::minutes(1));
    }

    #[test]
    fn default_admin_needs_email_and_password() {
        assert!(load(&[("DEFAULT_ADMIN_EMAIL", "a@b.c")]).unwrap().default_admin.is_none());

        let admin = load(&[
            ("DEFAULT_ADMIN_EMAIL", "a@b.c"),
            ("DEFAULT_ADMIN_PASSWORD", "password1"),
        ])
        .unwrap()
        .default_admin
        .unwrap();
        assert_eq!(admin.name, "Admin");
        assert!(!format!("{admin:?}").contains("password1"));
    }
}
