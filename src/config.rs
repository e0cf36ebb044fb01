//! Runtime configuration, loaded from environment variables (and `.env`).

use std::{env, path::PathBuf, time::Duration};

use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.vercel.com";
const DEFAULT_CLIENT_ID: &str = "ZG Client";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL every API route is appended to
    pub api_base_url: String,
    /// Period between poll cycles
    pub poll_interval: Duration,
    /// First half of the User-Agent header; the crate version follows it
    pub client_id: String,
    /// Token that takes precedence over the stored one
    pub token: Option<String>,
    /// Team selection that takes precedence over the stored one
    pub team_id: Option<String>,
    /// Settings file; `~/.zeitgeist/settings.json` when unset
    pub settings_path: Option<PathBuf>,
    /// Fallback log filter when RUST_LOG is unset
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let poll_interval = match lookup("ZEITGEIST_POLL_INTERVAL_SECS") {
            Some(raw) => parse_interval(&raw)?,
            None => Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        };

        Ok(Self {
            api_base_url: lookup("ZEITGEIST_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            poll_interval,
            client_id: lookup("ZEITGEIST_CLIENT_ID")
                .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_owned()),
            token: lookup("ZEITGEIST_TOKEN"),
            team_id: lookup("ZEITGEIST_TEAM_ID"),
            settings_path: lookup("ZEITGEIST_SETTINGS_PATH").map(PathBuf::from),
            log_level: lookup("ZEITGEIST_LOG_LEVEL")
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_owned()),
        })
    }
}

fn parse_interval(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidPollInterval(raw.to_owned())),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("ZEITGEIST_POLL_INTERVAL_SECS must be a positive number of seconds, got {0:?}")]
    InvalidPollInterval(String),
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(lookup_from(&[])).expect("config");

        assert_eq!(config.api_base_url, "https://api.vercel.com");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.client_id, "ZG Client");
        assert!(config.token.is_none());
        assert!(config.team_id.is_none());
        assert!(config.settings_path.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("ZEITGEIST_API_URL", "http://localhost:9000"),
            ("ZEITGEIST_POLL_INTERVAL_SECS", "30"),
            ("ZEITGEIST_TOKEN", "abc"),
            ("ZEITGEIST_TEAM_ID", "team_1"),
            ("ZEITGEIST_SETTINGS_PATH", "/tmp/zg.json"),
        ]))
        .expect("config");

        assert_eq!(config.api_base_url, "http://localhost:9000");
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.team_id.as_deref(), Some("team_1"));
        assert_eq!(config.settings_path, Some(PathBuf::from("/tmp/zg.json")));
    }

    #[test]
    fn test_invalid_interval() {
        for raw in ["0", "soon", "-3"] {
            let result = Config::from_lookup(lookup_from(&[("ZEITGEIST_POLL_INTERVAL_SECS", raw)]));
            assert!(matches!(result, Err(ConfigError::InvalidPollInterval(_))));
        }
    }
}
