//! TOML configuration for the execwatch daemon.
//!
//! Layered: an explicit path, then `EXECWATCH_CONFIG`, then
//! `/etc/execwatch/execwatch.toml`, then compiled-in defaults. A handful of
//! environment variables override individual fields afterwards.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const SYSTEM_CONFIG_PATH: &str = "/etc/execwatch/execwatch.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for the daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub seed: SeedConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve the configuration for this process.
    ///
    /// An explicit path must load; the fallbacks only warn.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None => Self::load_or_default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Try `EXECWATCH_CONFIG`, then the system path, then defaults.
    pub fn load_or_default() -> Self {
        if let Ok(env_path) = std::env::var("EXECWATCH_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "EXECWATCH_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return cfg,
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Self::default()
    }

    /// Apply per-field environment overrides. Unparseable values are ignored
    /// with a warning.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("EXECWATCH_BIND").filter(|v| !v.is_empty()) {
            self.server.bind = bind;
        }
        if let Some(db) = lookup("EXECWATCH_DB").filter(|v| !v.is_empty()) {
            self.server.db_path = db;
        }
        if let Some(raw) = lookup("RATE_LIMIT_WINDOW_MS") {
            match raw.parse::<u64>() {
                Ok(ms) => self.rate_limit.window_ms = ms,
                Err(_) => warn!(value = %raw, "ignoring invalid RATE_LIMIT_WINDOW_MS"),
            }
        }
        if let Some(raw) = lookup("RATE_LIMIT_MAX") {
            match raw.parse::<u64>() {
                Ok(max) => self.rate_limit.max_requests = max,
                Err(_) => warn!(value = %raw, "ignoring invalid RATE_LIMIT_MAX"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address and port for the HTTP listener.
    pub bind: String,
    /// Path of the SQLite database file.
    pub db_path: String,
    /// Maximum request body size in bytes.
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:4000".to_string(),
            db_path: "data/execwatch.db".to_string(),
            body_limit_bytes: 2 * 1024 * 1024,
        }
    }
}

// ---------------------------------------------------------------------------
// Rate limit
// ---------------------------------------------------------------------------

/// Per-IP fixed-window rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub window_ms: u64,
    pub max_requests: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// CORS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed browser origins. Credentials are allowed for these origins.
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub summary_ttl_secs: u64,
    pub rollup_ttl_secs: u64,
    /// How often the background task refreshes the 24h rollup. 0 disables it.
    pub rollup_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            summary_ttl_secs: 30,
            rollup_ttl_secs: 60,
            rollup_interval_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Seed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Expose `POST /api/v1/executions/generate-test-data`.
    pub allow_endpoint: bool,
    /// Upper bound on records generated per request.
    pub max_count: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            allow_endpoint: false,
            max_count: 2_000_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_sane() {
        let cfg = Config::default();

        assert_eq!(cfg.server.bind, "0.0.0.0:4000");
        assert_eq!(cfg.server.db_path, "data/execwatch.db");
        assert_eq!(cfg.server.body_limit_bytes, 2 * 1024 * 1024);

        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(cfg.rate_limit.max_requests, 120);

        assert_eq!(cfg.cors.origins, vec!["http://localhost:5173".to_string()]);

        assert_eq!(cfg.cache.summary_ttl_secs, 30);
        assert_eq!(cfg.cache.rollup_ttl_secs, 60);

        assert!(!cfg.seed.allow_endpoint);
        assert_eq!(cfg.seed.max_count, 2_000_000);

        assert_eq!(cfg.logging.level, "info");
        assert!(!cfg.logging.json);
    }

    #[test]
    fn test_parse_example_toml() {
        let toml_str = r#"
[server]
bind = "127.0.0.1:9000"
db_path = "/var/lib/execwatch/exec.db"

[rate_limit]
window_ms = 1000
max_requests = 5

[cors]
origins = ["https://dash.example.com"]

[cache]
summary_ttl_secs = 10
rollup_interval_secs = 0

[seed]
allow_endpoint = true
max_count = 5000

[logging]
level = "debug"
json = true
"#;

        let cfg: Config = toml::from_str(toml_str).unwrap();

        assert_eq!(cfg.server.bind, "127.0.0.1:9000");
        assert_eq!(cfg.server.db_path, "/var/lib/execwatch/exec.db");
        assert_eq!(cfg.rate_limit.window_ms, 1000);
        assert_eq!(cfg.rate_limit.max_requests, 5);
        assert!(cfg.rate_limit.enabled);
        assert_eq!(cfg.cors.origins, vec!["https://dash.example.com".to_string()]);
        assert_eq!(cfg.cache.summary_ttl_secs, 10);
        assert_eq!(cfg.cache.rollup_ttl_secs, 60);
        assert_eq!(cfg.cache.rollup_interval_secs, 0);
        assert!(cfg.seed.allow_endpoint);
        assert_eq!(cfg.seed.max_count, 5000);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        let defaults = Config::default();

        assert_eq!(cfg.server.bind, defaults.server.bind);
        assert_eq!(cfg.rate_limit.max_requests, defaults.rate_limit.max_requests);
        assert_eq!(cfg.cache.summary_ttl_secs, defaults.cache.summary_ttl_secs);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("EXECWATCH_BIND", "127.0.0.1:1234"),
            ("RATE_LIMIT_WINDOW_MS", "5000"),
            ("RATE_LIMIT_MAX", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut cfg = Config::default();
        cfg.apply_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.server.bind, "127.0.0.1:1234");
        assert_eq!(cfg.server.db_path, "data/execwatch.db");
        assert_eq!(cfg.rate_limit.window_ms, 5000);
        assert_eq!(cfg.rate_limit.max_requests, 120);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("execwatch.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9999"
"#,
        )
        .unwrap();

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:9999");
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = Config::load(Path::new("/nonexistent/path/execwatch.toml"));
        assert!(result.is_err());
        assert!(Config::resolve(Some(Path::new("/nonexistent/path/execwatch.toml"))).is_err());
    }
}
