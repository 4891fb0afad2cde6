//! Network probes against the managed service.
//!
//! One TCP connect per configured port and one HTTP GET against the
//! health endpoint. Every call is independent and bounded by a timeout;
//! there are no retries here, the poll cadence is the retry policy.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use warden_core::config::MonitoringConfig;
use warden_core::{BoxFuture, HttpProbeResult, PortProbeResult};

const USER_AGENT: &str = concat!("warden-monitor/", env!("CARGO_PKG_VERSION"));

/// Raw results of one probe round, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    pub ports: BTreeMap<u16, PortProbeResult>,
    pub http: HttpProbeResult,
}

/// Source of probe results for the monitor.
pub trait Probe: Send + Sync {
    fn probe(&self) -> BoxFuture<'_, ProbeReport>;
}

/// Probes the real service over the network.
#[derive(Debug, Clone)]
pub struct NetworkProbe {
    host: String,
    ports: Vec<u16>,
    port_timeout: Duration,
    health_url: Option<String>,
    request_timeout: Duration,
}

impl NetworkProbe {
    pub fn new(host: impl Into<String>, ports: Vec<u16>, port_timeout: Duration) -> Self {
        Self {
            host: host.into(),
            ports,
            port_timeout,
            health_url: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_health_url(mut self, url: Option<String>, timeout: Duration) -> Self {
        self.health_url = url;
        self.request_timeout = timeout;
        self
    }

    pub fn from_config(config: &MonitoringConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.tcp_ports.clone(),
            config.port_timeout(),
        )
        .with_health_url(config.health_check_url.clone(), config.request_timeout())
    }
}

impl Probe for NetworkProbe {
    fn probe(&self) -> BoxFuture<'_, ProbeReport> {
        Box::pin(async move {
            let (ports, http) = tokio::join!(
                probe_ports(&self.host, &self.ports, self.port_timeout),
                probe_http(self.health_url.as_deref(), self.request_timeout),
            );
            ProbeReport { ports, http }
        })
    }
}

/// Probe every port concurrently. The map holds an entry for each port.
pub async fn probe_ports(
    host: &str,
    ports: &[u16],
    timeout: Duration,
) -> BTreeMap<u16, PortProbeResult> {
    let mut results: BTreeMap<u16, PortProbeResult> = ports
        .iter()
        .map(|&port| (port, PortProbeResult::unavailable(port, "probe did not complete")))
        .collect();

    let mut probes = JoinSet::new();
    for &port in ports {
        let host = host.to_string();
        probes.spawn(async move { probe_port(&host, port, timeout).await });
    }

    while let Some(joined) = probes.join_next().await {
        match joined {
            Ok(result) => {
                results.insert(result.port, result);
            }
            Err(e) => error!(error = %e, "port probe task failed"),
        }
    }

    results
}

/// Attempt a single TCP connection to `host:port`.
pub async fn probe_port(host: &str, port: u16, timeout: Duration) -> PortProbeResult {
    let started = Instant::now();

    match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
        Ok(Ok(_stream)) => {
            let elapsed = elapsed_ms(started);
            debug!(port, response_time_ms = elapsed, "port available");
            PortProbeResult::available(port, elapsed)
        }
        Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => {
            warn!(port, "port connection refused");
            PortProbeResult::unavailable(port, "connection refused")
        }
        Ok(Err(e)) => {
            warn!(port, error = %e, "port probe failed");
            PortProbeResult::unavailable(port, e.to_string())
        }
        Err(_) => {
            warn!(port, timeout_ms = timeout.as_millis() as u64, "port probe timed out");
            PortProbeResult::unavailable(port, "timeout")
        }
    }
}

/// GET the health endpoint.
///
/// `None` yields the unconfigured result rather than an error. A 2xx
/// response is healthy; its body is kept if it parses as JSON.
pub async fn probe_http(url: Option<&str>, timeout: Duration) -> HttpProbeResult {
    let Some(url) = url else {
        return HttpProbeResult::unconfigured();
    };

    let uri: http::Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => return HttpProbeResult::failed(format!("invalid health check url: {e}")),
    };

    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, fetch(&uri)).await;
    let elapsed = elapsed_ms(started);

    match outcome {
        Ok(Ok((status, body))) => {
            let healthy = status.is_success();
            debug!(status = status.as_u16(), response_time_ms = elapsed, "http health check");

            let payload = body.and_then(|bytes| match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!(error = %e, "health endpoint body is not json");
                    None
                }
            });

            HttpProbeResult {
                healthy,
                status_code: Some(status.as_u16()),
                response_time_ms: Some(elapsed),
                error: (!healthy).then(|| format!("HTTP {}", status.as_u16())),
                payload,
            }
        }
        Ok(Err(reason)) => {
            warn!(%uri, error = %reason, "http health check failed");
            HttpProbeResult::failed(reason)
        }
        Err(_) => {
            warn!(%uri, "http health check timed out");
            HttpProbeResult::failed("timeout")
        }
    }
}

/// Issue the request. The body is only read for 2xx responses.
pub(crate) async fn fetch(
    uri: &http::Uri,
) -> Result<(http::StatusCode, Option<Bytes>), String> {
    match uri.scheme_str() {
        Some("http") | None => {}
        Some(other) => return Err(format!("unsupported scheme {other}")),
    }
    let host = uri
        .host()
        .ok_or_else(|| "health check url has no host".to_string())?;
    let port = uri.port_u16().unwrap_or(80);

    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| format!("connection error: {e}"))?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake::<_, Empty<Bytes>>(io)
        .await
        .map_err(|e| format!("connection error: {e}"))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "health probe connection closed");
        }
    });

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let authority = uri.authority().map(|a| a.as_str()).unwrap_or(host);
    let req = http::Request::builder()
        .method(http::Method::GET)
        .uri(path)
        .header(http::header::HOST, authority)
        .header(http::header::USER_AGENT, USER_AGENT)
        .body(Empty::<Bytes>::new())
        .map_err(|e| format!("invalid request: {e}"))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| format!("request failed: {e}"))?;

    let status = resp.status();
    if !status.is_success() {
        return Ok((status, None));
    }

    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| format!("failed to read body: {e}"))?
        .to_bytes();
    Ok((status, Some(body)))
}

fn elapsed_ms(started: Instant) -> f64 {
    let ms = started.elapsed().as_secs_f64() * 1000.0;
    (ms * 100.0).round() / 100.0
}
