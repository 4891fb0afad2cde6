//! On-demand queries against the game server's JSON endpoints.
//!
//! Unlike the probes these are never run by the poll loop; they answer
//! operator questions such as "who is online?".

use std::time::Duration;

use tracing::{debug, warn};

use warden_core::config::{ApiEndpointsConfig, MonitoringConfig};
use warden_core::{ServerQueryResult, UptimeInfo};

use crate::probe::{fetch, probe_http};

#[derive(Debug, Clone)]
pub struct ServerQueries {
    players_url: Option<String>,
    info_url: Option<String>,
    health_url: Option<String>,
    timeout: Duration,
}

impl ServerQueries {
    pub fn new(
        players_url: Option<String>,
        info_url: Option<String>,
        health_url: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            players_url,
            info_url,
            health_url,
            timeout,
        }
    }

    pub fn from_config(monitoring: &MonitoringConfig, endpoints: &ApiEndpointsConfig) -> Self {
        Self::new(
            endpoints.players.clone(),
            endpoints.info.clone(),
            monitoring.health_check_url.clone(),
            monitoring.request_timeout(),
        )
    }

    /// Player list as returned by the players endpoint.
    pub async fn players(&self) -> ServerQueryResult {
        query_json("players", self.players_url.as_deref(), self.timeout).await
    }

    /// Server details as returned by the info endpoint.
    pub async fn info(&self) -> ServerQueryResult {
        query_json("info", self.info_url.as_deref(), self.timeout).await
    }

    /// Uptime read from a fresh health endpoint payload.
    pub async fn uptime(&self) -> UptimeInfo {
        let http = probe_http(self.health_url.as_deref(), self.timeout).await;
        UptimeInfo::from_http(&http)
    }
}

/// GET `url` and decode its JSON body. Failures are folded into the result.
pub async fn query_json(what: &str, url: Option<&str>, timeout: Duration) -> ServerQueryResult {
    let Some(url) = url else {
        return ServerQueryResult::failed(None, format!("{what} endpoint not configured"));
    };
    let uri: http::Uri = match url.parse() {
        Ok(uri) => uri,
        Err(e) => return ServerQueryResult::failed(None, format!("invalid {what} url: {e}")),
    };

    match tokio::time::timeout(timeout, fetch(&uri)).await {
        Ok(Ok((status, Some(body)))) => match serde_json::from_slice(&body) {
            Ok(data) => {
                debug!(%what, status = status.as_u16(), "server query answered");
                ServerQueryResult::ok(status.as_u16(), data)
            }
            Err(e) => ServerQueryResult::failed(
                Some(status.as_u16()),
                format!("response is not json: {e}"),
            ),
        },
        Ok(Ok((status, None))) => {
            warn!(%what, status = status.as_u16(), "server query rejected");
            ServerQueryResult::failed(Some(status.as_u16()), format!("HTTP {}", status.as_u16()))
        }
        Ok(Err(reason)) => {
            warn!(%what, error = %reason, "server query failed");
            ServerQueryResult::failed(None, reason)
        }
        Err(_) => {
            warn!(%what, "server query timed out");
            ServerQueryResult::failed(None, "timeout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer one request with `status_line` and `body`; returns the base url.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn players_endpoint_json_is_returned() {
        let base = serve_once("200 OK", r#"{"online":2,"players":["ann","bo"]}"#).await;
        let queries = ServerQueries::new(
            Some(format!("{base}/players")),
            None,
            None,
            Duration::from_secs(2),
        );

        let result = queries.players().await;
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
        assert_eq!(result.data.unwrap()["online"], 2);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_reported_not_fetched() {
        let queries = ServerQueries::new(None, None, None, Duration::from_secs(1));

        let result = queries.info().await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("info endpoint not configured"));

        let uptime = queries.uptime().await;
        assert!(uptime.uptime_secs.is_none());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let url = format!("{base}/info");
        let result = query_json("info", Some(&url), Duration::from_secs(2)).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(503));
        assert_eq!(result.error.as_deref(), Some("HTTP 503"));
    }

    #[tokio::test]
    async fn non_json_body_is_an_error() {
        let base = serve_once("200 OK", "hello").await;
        let url = format!("{base}/info");
        let result = query_json("info", Some(&url), Duration::from_secs(2)).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("response is not json"));
    }

    #[tokio::test]
    async fn uptime_comes_from_health_payload() {
        let base = serve_once(
            "200 OK",
            r#"{"server":{"uptime":3600000,"uptime_formatted":"1h 0m"}}"#,
        )
        .await;
        let queries = ServerQueries::new(
            None,
            None,
            Some(format!("{base}/health")),
            Duration::from_secs(2),
        );

        let uptime = queries.uptime().await;
        assert_eq!(uptime.uptime_secs, Some(3600));
        assert_eq!(uptime.uptime_formatted.as_deref(), Some("1h 0m"));
    }
}
