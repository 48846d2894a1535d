//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

use housing_shared::constants::{APP_NAME, DEFAULT_CLEANUP_AGE_DAYS, DEFAULT_HTTP_PORT};

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// SQLite file holding the vault.
    /// Env: `DATABASE_PATH`
    /// Default: platform data directory (see `Database::new`).
    pub database_path: Option<PathBuf>,

    /// Admin API bearer token. Required to access /admin/* endpoints.
    /// Env: `ADMIN_TOKEN`
    /// Default: empty (admin API disabled).
    pub admin_token: Option<String>,

    /// Passphrase sealing the stored vault with XChaCha20-Poly1305.
    /// Env: `VAULT_PASSPHRASE`
    /// Default: empty (vault stored as plaintext JSON).
    pub vault_passphrase: Option<String>,

    /// Human-readable name for this instance.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Whether new applications are accepted.
    /// Env: `REGISTRATION_OPEN` (true/false)
    /// Default: `true`
    pub registration_open: bool,

    /// Registration submissions allowed per minute per client IP.
    /// Env: `REGISTRATION_RATE_PER_MIN`
    /// Default: `6`
    pub registration_rate_per_min: f64,

    /// Back-to-back registration submissions allowed per client IP.
    /// Env: `REGISTRATION_BURST`
    /// Default: `3`
    pub registration_burst: f64,

    /// Sustained requests per second allowed per client IP on every other
    /// route.
    /// Env: `RATE_LIMIT_PER_SEC`
    /// Default: `10`
    pub rate_limit_per_sec: f64,

    /// Burst size per client IP.
    /// Env: `RATE_LIMIT_BURST`
    /// Default: `30`
    pub rate_limit_burst: f64,

    /// Take the client IP from `X-Forwarded-For` / `X-Real-IP` instead of the
    /// socket peer. Only enable behind a reverse proxy that sets them.
    /// Env: `TRUST_PROXY_HEADERS` (true/false)
    /// Default: `false`
    pub trust_proxy_headers: bool,

    /// Age used by `/admin/cleanup` when the request names none.
    /// Env: `CLEANUP_MAX_AGE_DAYS`
    /// Default: `7`
    pub cleanup_max_age_days: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: None,
            admin_token: None,
            vault_passphrase: None,
            instance_name: APP_NAME.to_string(),
            registration_open: true,
            registration_rate_per_min: 6.0,
            registration_burst: 3.0,
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
            trust_proxy_headers: false,
            cleanup_max_age_days: DEFAULT_CLEANUP_AGE_DAYS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Some(path) = non_empty(lookup("DATABASE_PATH")) {
            config.database_path = Some(PathBuf::from(path));
        }

        config.admin_token = non_empty(lookup("ADMIN_TOKEN"));
        config.vault_passphrase = non_empty(lookup("VAULT_PASSPHRASE"));

        if let Some(name) = non_empty(lookup("INSTANCE_NAME")) {
            config.instance_name = name;
        }

        if let Some(val) = lookup("REGISTRATION_OPEN") {
            config.registration_open = val != "false" && val != "0";
        }

        if let Some(val) = lookup("REGISTRATION_RATE_PER_MIN") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 => config.registration_rate_per_min = n,
                _ => tracing::warn!(value = %val, "Invalid REGISTRATION_RATE_PER_MIN, using default"),
            }
        }

        if let Some(val) = lookup("REGISTRATION_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 => config.registration_burst = n,
                _ => tracing::warn!(value = %val, "Invalid REGISTRATION_BURST, using default"),
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_PER_SEC") {
            match val.parse::<f64>() {
                Ok(n) if n > 0.0 => config.rate_limit_per_sec = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_PER_SEC, using default"),
            }
        }

        if let Some(val) = lookup("RATE_LIMIT_BURST") {
            match val.parse::<f64>() {
                Ok(n) if n >= 1.0 => config.rate_limit_burst = n,
                _ => tracing::warn!(value = %val, "Invalid RATE_LIMIT_BURST, using default"),
            }
        }

        if let Some(val) = lookup("TRUST_PROXY_HEADERS") {
            config.trust_proxy_headers = val == "true" || val == "1";
        }

        if let Some(val) = lookup("CLEANUP_MAX_AGE_DAYS") {
            match val.parse::<i64>() {
                Ok(n) if n >= 0 => config.cleanup_max_age_days = n,
                _ => tracing::warn!(value = %val, "Invalid CLEANUP_MAX_AGE_DAYS, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// Secrets stay out of logs.
impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("admin_token", &self.admin_token.as_ref().map(|_| "<redacted>"))
            .field(
                "vault_passphrase",
                &self.vault_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("instance_name", &self.instance_name)
            .field("registration_open", &self.registration_open)
            .field("rate_limit_per_sec", &self.rate_limit_per_sec)
            .field("registration_rate_per_min", &self.registration_rate_per_min)
            .field("registration_burst", &self.registration_burst)
            .field("rate_limit_burst", &self.rate_limit_burst)
            .field("trust_proxy_headers", &self.trust_proxy_headers)
            .field("cleanup_max_age_days", &self.cleanup_max_age_days)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.admin_token.is_none());
        assert!(config.registration_open);
        assert_eq!(config.cleanup_max_age_days, 7);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("DATABASE_PATH", "/tmp/vault.db"),
            ("ADMIN_TOKEN", "tok"),
            ("REGISTRATION_OPEN", "false"),
            ("RATE_LIMIT_BURST", "5"),
            ("REGISTRATION_RATE_PER_MIN", "2"),
            ("TRUST_PROXY_HEADERS", "true"),
            ("CLEANUP_MAX_AGE_DAYS", "30"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.database_path, Some(PathBuf::from("/tmp/vault.db")));
        assert_eq!(config.admin_token.as_deref(), Some("tok"));
        assert!(!config.registration_open);
        assert_eq!(config.rate_limit_burst, 5.0);
        assert_eq!(config.registration_rate_per_min, 2.0);
        assert!(config.trust_proxy_headers);
        assert_eq!(config.cleanup_max_age_days, 30);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("ADMIN_TOKEN", "   "),
            ("RATE_LIMIT_PER_SEC", "-1"),
            ("REGISTRATION_BURST", "0.5"),
            ("CLEANUP_MAX_AGE_DAYS", "soon"),
        ]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8080).into());
        assert!(config.admin_token.is_none());
        assert_eq!(config.rate_limit_per_sec, 10.0);
        assert_eq!(config.registration_burst, 3.0);
        assert_eq!(config.cleanup_max_age_days, 7);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = from_pairs(&[("ADMIN_TOKEN", "hunter2"), ("VAULT_PASSPHRASE", "pw")]);
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("\"pw\""));
        assert!(debug.contains("<redacted>"));
    }
}
