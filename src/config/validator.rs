//! Settings validation and normalisation.

use crate::config::Settings;
use crate::dialect::Dialect;
use crate::error::ConfigError;
use crate::resolve::uri::PREFIX_SEGMENTS;

/// Normalise the prefix to `/a/b` and reject settings the server cannot run with.
pub fn validate(settings: &mut Settings) -> Result<(), ConfigError> {
    let segments: Vec<&str> = settings
        .api_prefix
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if segments.len() != PREFIX_SEGMENTS {
        return Err(ConfigError::Invalid {
            key: "API_PREFIX",
            message: format!(
                "expected {} path segments, got {:?}",
                PREFIX_SEGMENTS, settings.api_prefix
            ),
        });
    }
    settings.api_prefix = format!("/{}", segments.join("/"));

    if Dialect::from_url(&settings.database_url).is_none() {
        return Err(ConfigError::UnsupportedDatabase(settings.database_url.clone()));
    }
    if settings.max_connections == 0 {
        return Err(ConfigError::Invalid {
            key: "MAX_CONNECTIONS",
            message: "must be at least 1".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_needs_two_segments() {
        let mut s = Settings::new("sqlite::memory:");
        s.api_prefix = "/api".into();
        assert!(matches!(validate(&mut s), Err(ConfigError::Invalid { key: "API_PREFIX", .. })));

        s.api_prefix = "//q2//v1/".into();
        validate(&mut s).unwrap();
        assert_eq!(s.api_prefix, "/q2/v1");
    }

    #[test]
    fn test_unknown_database() {
        let mut s = Settings::new("oracle://db");
        assert!(matches!(validate(&mut s), Err(ConfigError::UnsupportedDatabase(_))));
    }
}
