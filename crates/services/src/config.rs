use std::env;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Connection settings for the grading service.
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub base_url: Url,
    pub token: String,
    pub timeout: Duration,
}

impl BackendConfig {
    /// Build a config, validating the base URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidBaseUrl` if `base_url` does not parse.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, ConfigError> {
        let base_url = Url::parse(base_url).map_err(|source| ConfigError::InvalidBaseUrl {
            raw: base_url.to_owned(),
            source,
        })?;
        Ok(Self {
            base_url,
            token: token.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read `QUIZ_API_BASE_URL`, `QUIZ_API_TOKEN` and `QUIZ_HTTP_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when the token is missing or a value does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let token = lookup("QUIZ_API_TOKEN")
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;
        let base_url = lookup("QUIZ_API_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let timeout = match lookup("QUIZ_HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::InvalidTimeout(raw))?,
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };
        Ok(Self::new(&base_url, token.trim())?.with_timeout(timeout))
    }

    /// Join `path` onto the base URL, keeping any base path prefix such as `/api`.
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_token_is_set() {
        let config = BackendConfig::from_lookup(lookup(&[("QUIZ_API_TOKEN", "abc")])).unwrap();
        assert_eq!(config.token, "abc");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.endpoint("quizzes/3/"), "http://localhost:8000/api/quizzes/3/");
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = BackendConfig::from_lookup(lookup(&[("QUIZ_API_TOKEN", "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingToken));
    }

    #[test]
    fn rejects_bad_url_and_timeout() {
        let err = BackendConfig::from_lookup(lookup(&[
            ("QUIZ_API_TOKEN", "t"),
            ("QUIZ_API_BASE_URL", "not a url"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidBaseUrl { .. }));

        let err = BackendConfig::from_lookup(lookup(&[
            ("QUIZ_API_TOKEN", "t"),
            ("QUIZ_HTTP_TIMEOUT_SECS", "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout(_)));
    }

    #[test]
    fn endpoint_handles_trailing_slashes() {
        let config = BackendConfig::new("https://lms.example.com/api/", "t").unwrap();
        assert_eq!(
            config.endpoint("/enrollments/me/"),
            "https://lms.example.com/api/enrollments/me/"
        );
    }
}
