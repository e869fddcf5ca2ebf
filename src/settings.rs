//! Runtime settings from environment variables.

use crate::error::ConfigError;
use std::net::SocketAddr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Postgres,
    /// In-process tables; data is lost on exit.
    Memory,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: Option<String>,
    pub schema: String,
    pub backend: BackendKind,
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub jwt_audience: Option<String>,
    pub db_max_connections: u32,
    pub run_migrations: bool,
    pub body_limit_bytes: usize,
    pub login_providers: Vec<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let backend = match get("BAKERY_BACKEND").as_deref() {
            None | Some("postgres") => BackendKind::Postgres,
            Some("memory") => BackendKind::Memory,
            Some(other) => {
                return Err(ConfigError::Load(format!(
                    "BAKERY_BACKEND must be postgres or memory, got {}",
                    other
                )))
            }
        };
        let database_url = get("DATABASE_URL");
        if backend == BackendKind::Postgres && database_url.is_none() {
            return Err(ConfigError::Load("DATABASE_URL is required for the postgres backend".into()));
        }
        let jwt_secret = get("JWT_SECRET").ok_or_else(|| ConfigError::Load("JWT_SECRET is required".into()))?;
        let bind_addr = parse(&get, "BIND_ADDR", "0.0.0.0:3000")?;
        let jwt_audience = match get("JWT_AUDIENCE").as_deref() {
            None => Some("authenticated".to_string()),
            Some("none") => None,
            Some(aud) => Some(aud.to_string()),
        };
        let login_providers = get("LOGIN_PROVIDERS")
            .unwrap_or_else(|| "google,github".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Ok(Settings {
            database_url,
            schema: get("BAKERY_SCHEMA").unwrap_or_else(|| "public".into()),
            backend,
            bind_addr,
            jwt_secret,
            jwt_audience,
            db_max_connections: parse(&get, "DB_MAX_CONNECTIONS", "5")?,
            run_migrations: parse(&get, "RUN_MIGRATIONS", "true")?,
            body_limit_bytes: parse(&get, "BODY_LIMIT_BYTES", "1048576")?,
            login_providers,
        })
    }
}

fn parse<T, G>(get: &G, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    raw.parse()
        .map_err(|_| ConfigError::Load(format!("{} has an invalid value: {}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let s = settings(&[("DATABASE_URL", "postgres://localhost/bakery"), ("JWT_SECRET", "s")]).unwrap();
        assert_eq!(s.backend, BackendKind::Postgres);
        assert_eq!(s.schema, "public");
        assert_eq!(s.bind_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(s.jwt_audience.as_deref(), Some("authenticated"));
        assert_eq!(s.db_max_connections, 5);
        assert!(s.run_migrations);
        assert_eq!(s.body_limit_bytes, 1_048_576);
        assert_eq!(s.login_providers, vec!["google", "github"]);
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let s = settings(&[("BAKERY_BACKEND", "memory"), ("JWT_SECRET", "s"), ("JWT_AUDIENCE", "none")]).unwrap();
        assert_eq!(s.backend, BackendKind::Memory);
        assert!(s.database_url.is_none());
        assert!(s.jwt_audience.is_none());
    }

    #[test]
    fn missing_or_bad_values_fail() {
        assert!(settings(&[("DATABASE_URL", "postgres://localhost/bakery")]).is_err());
        assert!(settings(&[("JWT_SECRET", "s")]).is_err());
        assert!(settings(&[("BAKERY_BACKEND", "sqlite"), ("JWT_SECRET", "s")]).is_err());
        assert!(settings(&[
            ("BAKERY_BACKEND", "memory"),
            ("JWT_SECRET", "s"),
            ("RUN_MIGRATIONS", "maybe")
        ])
        .is_err());
    }
}
