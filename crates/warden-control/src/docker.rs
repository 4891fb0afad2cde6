//! `ContainerDriver` backed by the docker CLI.
//!
//! Each operation shells out to `docker` and waits for the container to
//! reach the expected state, polling `status()` every two seconds.
//! `inspect` adds a one-shot `docker stats` sample for running containers
//! and `list` reads `docker ps -a`.

use std::time::Duration;

use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

use warden_core::config::DockerConfig;
use warden_core::{
    BoxFuture, ContainerDriver, ContainerInfo, ContainerStatus, ContainerSummary, DriverError,
    ResourceUsage,
};

const STATUS_FORMAT: &str = "{{.State.Status}} {{if .State.Health}}{{.State.Health.Status}}{{end}}";
const JSON_LINES_FORMAT: &str = "{{json .}}";

#[derive(Debug, Clone)]
pub struct DockerCliDriver {
    docker_bin: String,
    container: String,
    restart_timeout: Duration,
    poll_every: Duration,
}

impl DockerCliDriver {
    pub fn new(container: impl Into<String>) -> Self {
        Self {
            docker_bin: "docker".to_string(),
            container: container.into(),
            restart_timeout: Duration::from_secs(30),
            poll_every: Duration::from_secs(2),
        }
    }

    pub fn from_config(config: &DockerConfig) -> Self {
        Self {
            docker_bin: config.docker_bin.clone(),
            container: config.container_name.clone(),
            restart_timeout: config.restart_timeout(),
            poll_every: Duration::from_secs(2),
        }
    }

    pub fn with_docker_bin(mut self, bin: impl Into<String>) -> Self {
        self.docker_bin = bin.into();
        self
    }

    pub fn with_timeouts(mut self, restart_timeout: Duration, poll_every: Duration) -> Self {
        self.restart_timeout = restart_timeout;
        self.poll_every = poll_every;
        self
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    /// Run `docker <args>` and return stdout.
    async fn docker(&self, args: &[&str]) -> Result<DockerOutput, DriverError> {
        debug!(bin = %self.docker_bin, ?args, "running docker command");
        let output = Command::new(&self.docker_bin)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| DriverError::Spawn {
                program: self.docker_bin.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            if is_missing_container(&stderr) {
                return Err(DriverError::NotFound(self.container.clone()));
            }
            return Err(DriverError::CommandFailed {
                command: format!("{} {}", self.docker_bin, args.join(" ")),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(DockerOutput { stdout, stderr })
    }

    async fn current_status(&self) -> Result<ContainerStatus, DriverError> {
        let out = self
            .docker(&["inspect", "--format", STATUS_FORMAT, self.container.as_str()])
            .await?;
        Ok(parse_status(&out.stdout))
    }

    /// Poll until the container reports `target`, up to `timeout`.
    async fn wait_for(
        &self,
        target: ContainerStatus,
        timeout: Duration,
    ) -> Result<(), DriverError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.status_or_error().await {
                status if status == target => {
                    info!(container = %self.container, %status, "container reached status");
                    return Ok(());
                }
                ContainerStatus::Error => {
                    error!(container = %self.container, "container in error state");
                    return Err(DriverError::ErrorState(target.to_string()));
                }
                status => {
                    debug!(container = %self.container, %status, %target, "waiting for container")
                }
            }

            if tokio::time::Instant::now() + self.poll_every > deadline {
                warn!(container = %self.container, %target, "timed out waiting for container");
                return Err(DriverError::Timeout {
                    target: target.to_string(),
                    waited_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_every).await;
        }
    }

    async fn status_or_error(&self) -> ContainerStatus {
        match self.current_status().await {
            Ok(status) => status,
            Err(DriverError::NotFound(_)) => ContainerStatus::NotFound,
            Err(e) => {
                error!(container = %self.container, error = %e, "failed to read container status");
                ContainerStatus::Error
            }
        }
    }

    async fn start_inner(&self) -> Result<(), DriverError> {
        if self.current_status().await? == ContainerStatus::Running {
            info!(container = %self.container, "container already running");
            return Ok(());
        }
        info!(container = %self.container, "starting container");
        self.docker(&["start", self.container.as_str()]).await?;
        self.wait_for(ContainerStatus::Running, self.restart_timeout).await
    }

    async fn stop_inner(&self) -> Result<(), DriverError> {
        if self.current_status().await? != ContainerStatus::Running {
            info!(container = %self.container, "container already stopped");
            return Ok(());
        }
        info!(container = %self.container, "stopping container");
        let grace = self.restart_timeout.as_secs().to_string();
        self.docker(&["stop", "--time", grace.as_str(), self.container.as_str()]).await?;
        self.wait_for(ContainerStatus::Stopped, self.restart_timeout).await
    }

    async fn restart_inner(&self) -> Result<(), DriverError> {
        info!(container = %self.container, "restarting container");
        let grace = self.restart_timeout.as_secs().to_string();
        self.docker(&["restart", "--time", grace.as_str(), self.container.as_str()]).await?;
        self.wait_for(ContainerStatus::Running, self.restart_timeout * 2).await
    }

    async fn logs_inner(&self, lines: usize) -> Result<String, DriverError> {
        let tail = lines.to_string();
        let out = self
            .docker(&["logs", "--tail", tail.as_str(), "--timestamps", self.container.as_str()])
            .await?;
        // Container stderr is forwarded on ours.
        let mut logs = out.stdout;
        logs.push_str(&out.stderr);
        Ok(logs)
    }

    async fn inspect_inner(&self) -> Result<ContainerInfo, DriverError> {
        let out = self.docker(&["inspect", self.container.as_str()]).await?;
        let mut info = parse_inspect(&out.stdout)?;

        if matches!(info.status, ContainerStatus::Running | ContainerStatus::Starting) {
            match self.resource_usage().await {
                Ok(usage) => info.resources = Some(usage),
                Err(e) => {
                    warn!(
                        container = %self.container,
                        error = %e,
                        "failed to read container stats"
                    );
                }
            }
        }
        Ok(info)
    }

    async fn resource_usage(&self) -> Result<ResourceUsage, DriverError> {
        let out = self
            .docker(&[
                "stats",
                "--no-stream",
                "--format",
                JSON_LINES_FORMAT,
                self.container.as_str(),
            ])
            .await?;
        parse_stats(&out.stdout)
    }

    async fn list_inner(&self) -> Result<Vec<ContainerSummary>, DriverError> {
        let out = self.docker(&["ps", "-a", "--format", JSON_LINES_FORMAT]).await?;
        let containers = parse_ps(&out.stdout)?;
        debug!(count = containers.len(), "listed containers");
        Ok(containers)
    }
}

struct DockerOutput {
    stdout: String,
    stderr: String,
}

impl ContainerDriver for DockerCliDriver {
    fn container_name(&self) -> &str {
        &self.container
    }

    fn status(&self) -> BoxFuture<'_, ContainerStatus> {
        Box::pin(self.status_or_error())
    }

    fn start(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(self.start_inner())
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(self.stop_inner())
    }

    fn restart(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(self.restart_inner())
    }

    fn logs(&self, lines: usize) -> BoxFuture<'_, Result<String, DriverError>> {
        Box::pin(self.logs_inner(lines))
    }

    fn inspect(&self) -> BoxFuture<'_, Result<ContainerInfo, DriverError>> {
        Box::pin(self.inspect_inner())
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, DriverError>> {
        Box::pin(self.list_inner())
    }
}

fn is_missing_container(stderr: &str) -> bool {
    stderr.contains("No such container") || stderr.contains("No such object")
}

/// Map `"<State.Status> <State.Health.Status>"` to a `ContainerStatus`.
fn parse_status(raw: &str) -> ContainerStatus {
    let mut parts = raw.split_whitespace();
    let state = parts.next().unwrap_or_default();
    let health = parts.next().unwrap_or_default();
    map_state(state, health)
}

fn map_state(state: &str, health: &str) -> ContainerStatus {
    match state {
        "running" if health == "starting" => ContainerStatus::Starting,
        "running" => ContainerStatus::Running,
        "restarting" => ContainerStatus::Restarting,
        "removing" => ContainerStatus::Stopping,
        "created" | "exited" | "dead" | "paused" => ContainerStatus::Stopped,
        _ => ContainerStatus::Error,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectEntry {
    id: String,
    name: String,
    #[serde(default)]
    restart_count: u32,
    state: InspectState,
    config: InspectConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
    started_at: Option<String>,
    health: Option<InspectHealth>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHealth {
    status: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
}

fn parse_inspect(raw: &str) -> Result<ContainerInfo, DriverError> {
    let entries: Vec<InspectEntry> =
        serde_json::from_str(raw).map_err(|e| DriverError::Decode(e.to_string()))?;
    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| DriverError::Decode("docker inspect returned no entries".to_string()))?;

    let health = entry.state.health.as_ref().map(|h| h.status.as_str()).unwrap_or("");
    Ok(ContainerInfo {
        id: entry.id.chars().take(12).collect(),
        name: entry.name.trim_start_matches('/').to_string(),
        image: entry.config.image,
        status: map_state(&entry.state.status, health),
        restart_count: entry.restart_count,
        started_at: entry.state.started_at,
        resources: None,
    })
}

#[derive(Deserialize)]
struct StatsLine {
    #[serde(rename = "CPUPerc")]
    cpu_perc: String,
    #[serde(rename = "MemUsage")]
    mem_usage: String,
    #[serde(rename = "MemPerc")]
    mem_perc: String,
}

/// Decode one `docker stats --no-stream --format '{{json .}}'` line.
fn parse_stats(raw: &str) -> Result<ResourceUsage, DriverError> {
    let line = raw
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| DriverError::Decode("docker stats returned no output".to_string()))?;
    let stats: StatsLine =
        serde_json::from_str(line).map_err(|e| DriverError::Decode(e.to_string()))?;

    let (usage, limit) = stats.mem_usage.split_once('/').ok_or_else(|| {
        DriverError::Decode(format!("unexpected MemUsage {:?}", stats.mem_usage))
    })?;

    Ok(ResourceUsage {
        cpu_percent: parse_percent(&stats.cpu_perc)?,
        memory_usage_bytes: parse_size(usage)?,
        memory_limit_bytes: parse_size(limit)?,
        memory_percent: parse_percent(&stats.mem_perc)?,
    })
}

fn parse_percent(raw: &str) -> Result<f64, DriverError> {
    let trimmed = raw.trim().trim_end_matches('%');
    if trimmed == "--" {
        return Ok(0.0);
    }
    trimmed
        .parse()
        .map_err(|_| DriverError::Decode(format!("unexpected percentage {raw:?}")))
}

/// Parse a docker size such as "21.5MiB", "1.2GB" or "512B" into bytes.
fn parse_size(raw: &str) -> Result<u64, DriverError> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| DriverError::Decode(format!("unexpected size {raw:?}")))?;

    let multiplier: f64 = match unit {
        "" | "B" => 1.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        other => return Err(DriverError::Decode(format!("unknown size unit {other:?}"))),
    };
    Ok((value * multiplier).round() as u64)
}

#[derive(Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    /// Missing on older docker releases.
    #[serde(rename = "State", default)]
    state: String,
    #[serde(rename = "Status")]
    status: String,
}

/// Decode `docker ps -a --format '{{json .}}'`, one object per line.
fn parse_ps(raw: &str) -> Result<Vec<ContainerSummary>, DriverError> {
    raw.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| -> Result<ContainerSummary, DriverError> {
            let entry: PsLine =
                serde_json::from_str(line).map_err(|e| DriverError::Decode(e.to_string()))?;
            let state = if entry.state.is_empty() {
                state_from_status_text(&entry.status)
            } else {
                entry.state.as_str()
            };
            let health = if entry.status.contains("(health: starting)") {
                "starting"
            } else {
                ""
            };
            Ok(ContainerSummary {
                id: entry.id.chars().take(12).collect(),
                name: entry.names.split(',').next().unwrap_or_default().to_string(),
                image: entry.image,
                status: map_state(state, health),
                status_text: entry.status,
            })
        })
        .collect()
}

fn state_from_status_text(status: &str) -> &'static str {
    if status.starts_with("Up") {
        if status.contains("(Paused)") { "paused" } else { "running" }
    } else if status.starts_with("Restarting") {
        "restarting"
    } else if status.starts_with("Removal") {
        "removing"
    } else if status.starts_with("Exited") {
        "exited"
    } else if status.starts_with("Created") {
        "created"
    } else if status.starts_with("Dead") {
        "dead"
    } else {
        ""
    }
}
