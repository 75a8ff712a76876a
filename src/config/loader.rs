//! Load settings from the process environment (and `.env`).

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

impl Settings {
    /// Read settings from the environment after loading a `.env` file if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let mut settings = Settings::new(database_url);
        if let Some(addr) = get("BIND_ADDR") {
            settings.bind_addr = addr;
        }
        if let Some(prefix) = get("API_PREFIX") {
            settings.api_prefix = prefix;
        }
        if let Some(v) = get("PAGE_SIZE") {
            settings.page_size = parse("PAGE_SIZE", &v)?;
        }
        if let Some(v) = get("MAX_BODY_BYTES") {
            settings.max_body_bytes = parse("MAX_BODY_BYTES", &v)?;
        }
        if let Some(v) = get("MAX_CONNECTIONS") {
            settings.max_connections = parse("MAX_CONNECTIONS", &v)?;
        }
        settings.async_path = get("ASYNC_PATH").map(PathBuf::from);

        validate(&mut settings)?;
        Ok(settings)
    }
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_defaults() {
        let s = Settings::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(s.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(s.api_prefix, "/q2/v1");
        assert_eq!(s.page_size, 0);
        assert_eq!(s.async_path, None);
        assert_eq!(s.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn test_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("API_PREFIX", "api/v2/"),
            ("PAGE_SIZE", "25"),
            ("ASYNC_PATH", "/tmp/jobs"),
        ]))
        .unwrap();
        assert_eq!(s.api_prefix, "/api/v2");
        assert_eq!(s.page_size, 25);
        assert_eq!(s.async_path, Some(PathBuf::from("/tmp/jobs")));
    }

    #[test]
    fn test_missing_and_invalid() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:"), ("PAGE_SIZE", "ten")])),
            Err(ConfigError::Invalid { key: "PAGE_SIZE", .. })
        ));
    }
}
