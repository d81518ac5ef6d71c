//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `gateway.toml`.
//!     loads configuration from file or falls back to defaults, then applies
//!     environment overrides (the datastore credentials normally live in env).
//!
//! structure:
//!     - ServerConfig: Where the http/websocket server binds.
//!     - StoreConfig: Datastore url, service key, table names.
//!     - RelayConfig: Poll intervals for the live relay.
//!     - SummaryConfig: How many samples a summary looks at.
//!     - AuthConfig: The single accepted credential pair.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    /// base url of the datastore, without the `/rest/v1` suffix
    pub url: String,
    pub service_key: String,
    pub timeout_seconds: u64,
    pub readings_table: String,
    pub sessions_table: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RelayConfig {
    /// sleep between ticks while clients are connected (10 Hz by default)
    pub active_interval_ms: u64,
    /// sleep between checks while nobody is listening
    pub idle_interval_ms: u64,
    /// start relaying at boot instead of waiting for an experiment start
    pub autostart: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SummaryConfig {
    /// most recent samples included in a summary
    pub window: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_string(), port: 8000 }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            service_key: String::new(),
            timeout_seconds: 10,
            readings_table: "sensor_readings".to_string(),
            sessions_table: "sessions".to_string(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { active_interval_ms: 100, idle_interval_ms: 1000, autostart: false }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self { window: 1000 }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { email: "test@lablink.com".to_string(), password: "password".to_string() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl RelayConfig {
    pub fn active_interval(&self) -> Duration {
        Duration::from_millis(self.active_interval_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl GatewayConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: GatewayConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            std::path::PathBuf::from("config").join("gateway.toml"),
            std::path::PathBuf::from("..").join("config").join("gateway.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return config;
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Self::default()
    }

    /// Apply environment overrides on top of whatever was loaded
    ///
    /// runs before tracing is initialised (the log level lives in this
    /// config), so problems go straight to stdout.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("SUPABASE_URL") {
            self.store.url = url;
        }
        if let Some(key) = lookup("SUPABASE_SERVICE_ROLE_KEY") {
            self.store.service_key = key;
        }
        if let Some(host) = lookup("GATEWAY_HOST") {
            self.server.host = host;
        }
        match lookup("GATEWAY_PORT").map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => self.server.port = port,
            Some(Err(e)) => println!("[CONFIG] Warning: ignoring invalid GATEWAY_PORT: {}", e),
            None => {}
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("server.port must be non-zero");
        }
        if self.relay.active_interval_ms == 0 || self.relay.idle_interval_ms == 0 {
            anyhow::bail!("relay intervals must be non-zero");
        }
        if self.summary.window == 0 {
            anyhow::bail!("summary.window must be non-zero");
        }
        if self.store.timeout_seconds == 0 {
            anyhow::bail!("store.timeout_seconds must be non-zero");
        }
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            bind = %format!("{}:{}", self.server.host, self.server.port),
            store_url = %self.store.url,
            service_key_set = !self.store.service_key.is_empty(),
            readings_table = %self.store.readings_table,
            sessions_table = %self.store.sessions_table,
            relay_active_ms = self.relay.active_interval_ms,
            relay_idle_ms = self.relay.idle_interval_ms,
            summary_window = self.summary.window,
            "gateway configuration"
        );
    }
}
