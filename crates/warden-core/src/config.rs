//! warden.toml configuration parser.
//!
//! Every section and field is optional; missing values fall back to the
//! defaults below. Durations are strings such as `"500ms"`, `"5s"`, `"2m"`
//! or a plain number of seconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_MAIN_PORT: u16 = 30120;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(120);
const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);
const DEFAULT_MAX_RESTARTS_PER_HOUR: u32 = 10;
const DEFAULT_LISTEN: &str = "127.0.0.1:8088";
const DEFAULT_LOG_FILTER: &str = "info,warden=debug";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub monitoring: MonitoringConfig,
    pub docker: DockerConfig,
    pub security: SecurityConfig,
    pub notifications: NotificationsConfig,
    pub api: ApiConfig,
    pub api_endpoints: ApiEndpointsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub host: String,
    pub tcp_ports: Vec<u16>,
    /// Port whose availability alone is enough for `degraded` over `unhealthy`.
    pub main_port: u16,
    pub health_check_url: Option<String>,
    pub request_timeout: String,
    pub port_timeout: String,
    pub poll_interval: String,
    /// How long after a restart unhealthy readings are reported as `starting`.
    pub grace_period: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    pub container_name: String,
    pub restart_timeout: String,
    pub docker_bin: String,
    /// Pause between a confirmed restart and the follow-up health check.
    pub settle_delay: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub max_restarts_per_hour: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub allowed_groups: Vec<String>,
    pub admin_users: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub listen: String,
}

/// Optional game-server endpoints queried on demand (not by the poll loop).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpointsConfig {
    pub players: Option<String>,
    pub info: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`.
    pub filter: String,
    pub json: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            tcp_ports: vec![DEFAULT_MAIN_PORT],
            main_port: DEFAULT_MAIN_PORT,
            health_check_url: None,
            request_timeout: "10s".to_string(),
            port_timeout: "5s".to_string(),
            poll_interval: "60s".to_string(),
            grace_period: "120s".to_string(),
        }
    }
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            container_name: "rage-server".to_string(),
            restart_timeout: "30s".to_string(),
            docker_bin: "docker".to_string(),
            settle_delay: "5s".to_string(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_restarts_per_hour: DEFAULT_MAX_RESTARTS_PER_HOUR,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
            json: false,
        }
    }
}

impl MonitoringConfig {
    pub fn request_timeout(&self) -> Duration {
        parse_duration(&self.request_timeout).unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn port_timeout(&self) -> Duration {
        parse_duration(&self.port_timeout).unwrap_or(DEFAULT_PORT_TIMEOUT)
    }

    pub fn poll_interval(&self) -> Duration {
        parse_duration(&self.poll_interval).unwrap_or(DEFAULT_POLL_INTERVAL)
    }

    pub fn grace_period(&self) -> Duration {
        parse_duration(&self.grace_period).unwrap_or(DEFAULT_GRACE_PERIOD)
    }
}

impl DockerConfig {
    pub fn restart_timeout(&self) -> Duration {
        parse_duration(&self.restart_timeout).unwrap_or(DEFAULT_RESTART_TIMEOUT)
    }

    pub fn settle_delay(&self) -> Duration {
        parse_duration(&self.settle_delay).unwrap_or(DEFAULT_SETTLE_DELAY)
    }
}

impl NotificationsConfig {
    /// Every notification recipient: groups first, then admins.
    pub fn recipients(&self) -> Vec<String> {
        self.allowed_groups
            .iter()
            .chain(self.admin_users.iter())
            .cloned()
            .collect()
    }
}

impl WardenConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: WardenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitoring = &self.monitoring;
        if monitoring.tcp_ports.is_empty() {
            return Err(ConfigError::NoPorts);
        }
        if !monitoring.tcp_ports.contains(&monitoring.main_port) {
            return Err(ConfigError::Invalid(format!(
                "main_port {} is not one of tcp_ports {:?}",
                monitoring.main_port, monitoring.tcp_ports
            )));
        }
        if self.security.max_restarts_per_hour == 0 {
            return Err(ConfigError::Invalid(
                "max_restarts_per_hour must be at least 1".to_string(),
            ));
        }

        let durations = [
            ("monitoring.request_timeout", &monitoring.request_timeout),
            ("monitoring.port_timeout", &monitoring.port_timeout),
            ("monitoring.poll_interval", &monitoring.poll_interval),
            ("monitoring.grace_period", &monitoring.grace_period),
            ("docker.restart_timeout", &self.docker.restart_timeout),
            ("docker.settle_delay", &self.docker.settle_delay),
        ];
        for (field, value) in durations {
            if parse_duration(value).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{field}: cannot parse duration {value:?}"
                )));
            }
        }
        let urls = [
            ("monitoring.health_check_url", &monitoring.health_check_url),
            ("api_endpoints.players", &self.api_endpoints.players),
            ("api_endpoints.info", &self.api_endpoints.info),
        ];
        for (field, url) in urls {
            if let Some(url) = url {
                if !is_plain_http(url) {
                    return Err(ConfigError::Invalid(format!(
                        "{field}: only http:// urls are supported, got {url:?}"
                    )));
                }
            }
        }

        if monitoring.poll_interval().is_zero() {
            return Err(ConfigError::Invalid(
                "monitoring.poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "1m" or "10".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn is_plain_http(url: &str) -> bool {
    url.get(..7)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http://"))
        && url.len() > 7
}
