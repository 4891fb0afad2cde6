//! Domain types for health monitoring and container control.
//!
//! Probe results and snapshots are built once per poll cycle and never
//! mutated afterwards. All types serialize to JSON for the command API.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// ── Health ────────────────────────────────────────────────────────

/// Aggregate health of the managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
    Starting,
    Unknown,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Starting => "starting",
            HealthState::Unknown => "unknown",
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one TCP reachability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortProbeResult {
    pub port: u16,
    pub available: bool,
    /// Connect time in milliseconds, rounded to two decimals.
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
}

impl PortProbeResult {
    pub fn available(port: u16, response_time_ms: f64) -> Self {
        Self {
            port,
            available: true,
            response_time_ms: Some(response_time_ms),
            error: None,
        }
    }

    pub fn unavailable(port: u16, error: impl Into<String>) -> Self {
        Self {
            port,
            available: false,
            response_time_ms: None,
            error: Some(error.into()),
        }
    }
}

/// Outcome of the HTTP health endpoint check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpProbeResult {
    /// True iff the endpoint answered with a 2xx status.
    pub healthy: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: Option<f64>,
    pub error: Option<String>,
    /// Parsed JSON body, when the endpoint was healthy and the body parsed.
    pub payload: Option<serde_json::Value>,
}

impl HttpProbeResult {
    /// Result used when no health check URL is configured.
    pub fn unconfigured() -> Self {
        Self::failed("health check url not configured")
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            status_code: None,
            response_time_ms: None,
            error: Some(error.into()),
            payload: None,
        }
    }
}

/// Counts shown alongside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSummary {
    pub available_ports: usize,
    pub total_ports: usize,
    pub http_accessible: bool,
}

/// One evaluated health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    /// Unix timestamp (seconds) when the check completed.
    pub timestamp: u64,
    /// Reported state, after restart grace-period mapping.
    pub overall_status: HealthState,
    /// State as classified from probe results alone.
    pub raw_status: HealthState,
    /// State recorded by the previous check.
    pub previous_status: HealthState,
    /// Whether `overall_status` differs from `previous_status`.
    pub status_changed: bool,
    /// Whether a restart grace period was active for this check.
    pub grace_active: bool,
    pub ports: BTreeMap<u16, PortProbeResult>,
    pub http: HttpProbeResult,
    pub summary: HealthSummary,
}

// ── Container ─────────────────────────────────────────────────────

/// Lifecycle status reported by a container driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Running,
    Stopped,
    Starting,
    Stopping,
    Restarting,
    NotFound,
    Error,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerStatus::Running => "running",
            ContainerStatus::Stopped => "stopped",
            ContainerStatus::Starting => "starting",
            ContainerStatus::Stopping => "stopping",
            ContainerStatus::Restarting => "restarting",
            ContainerStatus::NotFound => "not_found",
            ContainerStatus::Error => "error",
        }
    }
}

impl fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured details about the managed container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    pub restart_count: u32,
    /// RFC 3339 start time as reported by the runtime.
    pub started_at: Option<String>,
    /// Point-in-time resource usage; `None` when the container is not
    /// running or the runtime could not report it.
    pub resources: Option<ResourceUsage>,
}

/// CPU and memory usage sampled once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// Percent of one CPU; may exceed 100 on multi-core hosts.
    pub cpu_percent: f64,
    pub memory_usage_bytes: u64,
    pub memory_limit_bytes: u64,
    pub memory_percent: f64,
}

/// One entry of the runtime's container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    /// Human-readable status line, e.g. "Up 2 hours (healthy)".
    pub status_text: String,
}

// ── Server queries ────────────────────────────────────────────────

/// Result of an on-demand query against a game-server JSON endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerQueryResult {
    pub success: bool,
    pub status_code: Option<u16>,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl ServerQueryResult {
    pub fn ok(status_code: u16, data: serde_json::Value) -> Self {
        Self {
            success: true,
            status_code: Some(status_code),
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(status_code: Option<u16>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            status_code,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Server uptime as reported in the health endpoint payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UptimeInfo {
    pub uptime_secs: Option<u64>,
    pub uptime_formatted: Option<String>,
    pub error: Option<String>,
}

impl UptimeInfo {
    /// Read `server.uptime` (milliseconds) and `server.uptime_formatted`
    /// from a healthy HTTP result.
    pub fn from_http(http: &HttpProbeResult) -> Self {
        let server = match (&http.payload, http.healthy) {
            (Some(payload), true) => payload.get("server"),
            _ => {
                return Self {
                    uptime_secs: None,
                    uptime_formatted: None,
                    error: Some("health endpoint not answering".to_string()),
                };
            }
        };

        Self {
            uptime_secs: Some(
                server
                    .and_then(|s| s.get("uptime"))
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0)
                    / 1000,
            ),
            uptime_formatted: server
                .and_then(|s| s.get("uptime_formatted"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string),
            error: None,
        }
    }
}
