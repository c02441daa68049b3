use std::{env, time::Duration};

use anyhow::Context;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://journal.db";
pub const DEFAULT_DISCOVER_API_URL: &str = "http://localhost:5001";
pub const DEFAULT_BIND: &str = "127.0.0.1:5001";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub discover_api_url: String,
    pub bind: String,
    pub foursquare_client_id: Option<String>,
    pub foursquare_client_secret: Option<String>,
    pub cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cache_ttl = match var("DISCOVER_CACHE_TTL_SECS") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("DISCOVER_CACHE_TTL_SECS is not a number: {raw}"))?,
            None => DEFAULT_CACHE_TTL_SECS,
        };

        Ok(Self {
            database_url: var("JOURNAL_DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            discover_api_url: var("DISCOVER_API_URL")
                .unwrap_or_else(|| DEFAULT_DISCOVER_API_URL.into()),
            bind: var("DISCOVER_BIND").unwrap_or_else(|| DEFAULT_BIND.into()),
            foursquare_client_id: var("FOURSQUARE_CLIENT_ID"),
            foursquare_client_secret: var("FOURSQUARE_CLIENT_SECRET"),
            cache_ttl: Duration::from_secs(cache_ttl),
        })
    }

    pub fn foursquare_configured(&self) -> bool {
        self.foursquare_client_id.is_some() && self.foursquare_client_secret.is_some()
    }
}

// secrets stay out of logs
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url)
            .field("discover_api_url", &self.discover_api_url)
            .field("bind", &self.bind)
            .field("foursquare_configured", &self.foursquare_configured())
            .field("cache_ttl", &self.cache_ttl)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.discover_api_url, DEFAULT_DISCOVER_API_URL);
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.cache_ttl, Duration::from_secs(86400));
        assert!(!config.foursquare_configured());
    }

    #[test]
    fn overrides_and_blank_values() {
        let config = config(&[
            ("JOURNAL_DATABASE_URL", "sqlite::memory:"),
            ("FOURSQUARE_CLIENT_ID", "id"),
            ("FOURSQUARE_CLIENT_SECRET", "  "),
            ("DISCOVER_CACHE_TTL_SECS", "60"),
        ])
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert!(!config.foursquare_configured());
        assert!(!format!("{config:?}").contains("\"id\""));
    }

    #[test]
    fn bad_ttl_is_an_error() {
        assert!(config(&[("DISCOVER_CACHE_TTL_SECS", "soon")]).is_err());
    }
}
