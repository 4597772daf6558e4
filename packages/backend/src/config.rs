use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_API_PREFIX: &str = "/api/v1";
const DEFAULT_ACCESS_TOKEN_MINUTES: i64 = 30;
const DEFAULT_REFRESH_TOKEN_DAYS: i64 = 7;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub api_prefix: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub jwt_secret: Option<String>,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            jwt_secret: None,
            access_token_minutes: DEFAULT_ACCESS_TOKEN_MINUTES,
            refresh_token_days: DEFAULT_REFRESH_TOKEN_DAYS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let defaults = Self::default();

        let port = get("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(defaults.port);

        let host = get("HOST")
            .and_then(|value| value.trim().parse::<IpAddr>().ok())
            .unwrap_or(defaults.host);

        let log_level = get("RUST_LOG").unwrap_or(defaults.log_level);

        let api_prefix = get("API_V1_PREFIX")
            .map(|value| normalize_prefix(&value))
            .unwrap_or(defaults.api_prefix);

        let db_max_connections = get("DB_MAX_CONNECTIONS")
            .and_then(|value| value.trim().parse::<u32>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.db_max_connections);

        let access_token_minutes = get("ACCESS_TOKEN_EXPIRE_MINUTES")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.access_token_minutes);

        let refresh_token_days = get("REFRESH_TOKEN_EXPIRE_DAYS")
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(defaults.refresh_token_days);

        Self {
            host,
            port,
            log_level,
            api_prefix,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            jwt_secret: get("JWT_SECRET"),
            access_token_minutes,
            refresh_token_days,
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return DEFAULT_API_PREFIX.to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:8000");
        assert_eq!(config.api_prefix, "/api/v1");
        assert_eq!(config.access_token_minutes, 30);
        assert_eq!(config.refresh_token_days, 7);
        assert_eq!(config.db_max_connections, 10);
        assert!(config.database_url.is_none());
        assert!(config.jwt_secret.is_none());
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("HOST", "nowhere"),
            ("ACCESS_TOKEN_EXPIRE_MINUTES", "-5"),
            ("DB_MAX_CONNECTIONS", "0"),
        ]);
        assert_eq!(config.port, 8000);
        assert_eq!(config.host, IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(config.access_token_minutes, 30);
        assert_eq!(config.db_max_connections, 10);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9100"),
            ("HOST", "127.0.0.1"),
            ("API_V1_PREFIX", "api/v2/"),
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_URL", "postgres://localhost/adaptive"),
            ("REFRESH_TOKEN_EXPIRE_DAYS", "14"),
        ]);
        assert_eq!(config.bind_addr().to_string(), "127.0.0.1:9100");
        assert_eq!(config.api_prefix, "/api/v2");
        assert_eq!(config.jwt_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.refresh_token_days, 14);
        assert!(config.database_url.is_some());
    }

    #[test]
    fn test_blank_secret_is_unset() {
        let config = config_from(&[("JWT_SECRET", "   ")]);
        assert!(config.jwt_secret.is_none());
    }
}
