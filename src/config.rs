use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::labels::Locale;

/// Process configuration, read once from `FLEETBOOK_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Shared bearer token every `/api` request must present.
    pub api_token: String,
    pub compact_threshold: u64,
    pub request_timeout: Duration,
    pub locale: Locale,
    pub admin_username: String,
    pub admin_email: String,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let admin_username = lookup("FLEETBOOK_ADMIN_USERNAME").unwrap_or_else(|| "admin".into());
        let admin_email = lookup("FLEETBOOK_ADMIN_EMAIL")
            .unwrap_or_else(|| format!("{admin_username}@localhost"));
        let locale = match lookup("FLEETBOOK_LOCALE").map(|s| s.parse::<Locale>()) {
            Some(Ok(locale)) => locale,
            Some(Err(e)) => {
                tracing::warn!("{e}, falling back to cs");
                Locale::default()
            }
            None => Locale::default(),
        };

        Self {
            bind: lookup("FLEETBOOK_BIND").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed(&lookup, "FLEETBOOK_PORT").unwrap_or(8080),
            data_dir: lookup("FLEETBOOK_DATA_DIR")
                .unwrap_or_else(|| "./data".into())
                .into(),
            api_token: lookup("FLEETBOOK_API_TOKEN").unwrap_or_else(|| "fleetbook".into()),
            compact_threshold: parsed(&lookup, "FLEETBOOK_COMPACT_THRESHOLD").unwrap_or(1000),
            request_timeout: Duration::from_secs(parsed(&lookup, "FLEETBOOK_REQUEST_TIMEOUT_SECS").unwrap_or(30)),
            locale,
            admin_username,
            admin_email,
            metrics_port: parsed(&lookup, "FLEETBOOK_METRICS_PORT"),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("fleetbook.wal")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.addr(), "0.0.0.0:8080");
        assert_eq!(config.api_token, "fleetbook");
        assert_eq!(config.compact_threshold, 1000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.locale, Locale::Cs);
        assert_eq!(config.admin_email, "admin@localhost");
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.wal_path(), PathBuf::from("./data/fleetbook.wal"));
    }

    #[test]
    fn overrides_and_bad_values() {
        let env: HashMap<&str, &str> = [
            ("FLEETBOOK_PORT", "9090"),
            ("FLEETBOOK_LOCALE", "en"),
            ("FLEETBOOK_COMPACT_THRESHOLD", "lots"),
            ("FLEETBOOK_METRICS_PORT", "9100"),
            ("FLEETBOOK_ADMIN_USERNAME", "fleet"),
        ]
        .into();
        let config = Config::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.port, 9090);
        assert_eq!(config.locale, Locale::En);
        assert_eq!(config.compact_threshold, 1000);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.admin_email, "fleet@localhost");
    }
}
