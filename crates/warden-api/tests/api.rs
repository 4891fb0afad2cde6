//! API router tests against in-process fakes.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use warden_api::{ApiState, build_router};
use warden_control::{RestartCoordinator, RestartGovernor};
use warden_core::*;
use warden_health::{HealthClassifier, HealthMonitor, Probe, ProbeReport, ServerQueries};

struct UpProbe;

impl Probe for UpProbe {
    fn probe(&self) -> BoxFuture<'_, ProbeReport> {
        Box::pin(async {
            let mut ports = BTreeMap::new();
            ports.insert(30120, PortProbeResult::available(30120, 0.4));
            ports.insert(22005, PortProbeResult::unavailable(22005, "timeout"));
            ProbeReport {
                ports,
                http: HttpProbeResult::unconfigured(),
            }
        })
    }
}

#[derive(Default)]
struct FakeDriver {
    restarts: AtomicUsize,
    missing: bool,
}

impl FakeDriver {
    fn result(&self) -> Result<(), DriverError> {
        if self.missing {
            Err(DriverError::NotFound("rage-server".to_string()))
        } else {
            Ok(())
        }
    }
}

impl ContainerDriver for FakeDriver {
    fn container_name(&self) -> &str {
        "rage-server"
    }

    fn status(&self) -> BoxFuture<'_, ContainerStatus> {
        let status = if self.missing {
            ContainerStatus::NotFound
        } else {
            ContainerStatus::Running
        };
        Box::pin(async move { status })
    }

    fn start(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(async move { self.result() })
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(async move { self.result() })
    }

    fn restart(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { self.result() })
    }

    fn logs(&self, lines: usize) -> BoxFuture<'_, Result<String, DriverError>> {
        Box::pin(async move {
            self.result()?;
            Ok((0..lines).map(|i| format!("line {i}\n")).collect())
        })
    }

    fn inspect(&self) -> BoxFuture<'_, Result<ContainerInfo, DriverError>> {
        Box::pin(async move {
            self.result()?;
            Ok(ContainerInfo {
                id: "0123456789ab".to_string(),
                name: "rage-server".to_string(),
                image: "rage/server:latest".to_string(),
                status: ContainerStatus::Running,
                restart_count: 2,
                started_at: None,
                resources: Some(ResourceUsage {
                    cpu_percent: 12.5,
                    memory_usage_bytes: 512 * 1024 * 1024,
                    memory_limit_bytes: 2048 * 1024 * 1024,
                    memory_percent: 25.0,
                }),
            })
        })
    }

    fn list(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, DriverError>> {
        Box::pin(async move {
            if self.missing {
                return Err(DriverError::CommandFailed {
                    command: "docker ps -a".to_string(),
                    stderr: "Cannot connect to the Docker daemon".to_string(),
                });
            }
            Ok(vec![
                summary("rage-server", ContainerStatus::Running),
                summary("rage-server-staging", ContainerStatus::Stopped),
                summary("postgres", ContainerStatus::Running),
            ])
        })
    }
}

fn summary(name: &str, status: ContainerStatus) -> ContainerSummary {
    ContainerSummary {
        id: format!("{name}-id"),
        name: name.to_string(),
        image: "img:latest".to_string(),
        status,
        status_text: String::new(),
    }
}

struct Harness {
    router: Router,
    monitor: Arc<HealthMonitor>,
    driver: Arc<FakeDriver>,
}

fn harness(limit: u32, driver: FakeDriver) -> Harness {
    harness_with(limit, driver, ServerQueries::new(None, None, None, Duration::from_secs(1)))
}

fn harness_with(limit: u32, driver: FakeDriver, server: ServerQueries) -> Harness {
    let classifier = HealthClassifier::new(vec![30120, 22005], 30120).unwrap();
    let monitor = Arc::new(HealthMonitor::new(
        Arc::new(UpProbe),
        classifier,
        Duration::from_secs(120),
    ));
    let driver = Arc::new(driver);
    let restarts = Arc::new(
        RestartCoordinator::new(
            Arc::new(RestartGovernor::new(limit)),
            Arc::clone(&monitor),
            driver.clone(),
        )
        .with_settle_delay(Duration::ZERO),
    );
    let router = build_router(ApiState {
        monitor: Arc::clone(&monitor),
        restarts,
        driver: driver.clone(),
        server: Arc::new(server),
    });
    Harness {
        router,
        monitor,
        driver,
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_probes_without_recording() {
    let h = harness(3, FakeDriver::default());

    let (status, body) = send(&h.router, get("/api/v1/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["overall_status"], "degraded");
    assert_eq!(body["data"]["summary"]["available_ports"], 1);
    assert_eq!(h.monitor.current_state(), HealthState::Unknown);
}

#[tokio::test]
async fn last_health_is_404_until_first_poll() {
    let h = harness(3, FakeDriver::default());

    let (status, body) = send(&h.router, get("/api/v1/health/last")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    h.monitor.check_health().await;
    let (status, body) = send(&h.router, get("/api/v1/health/last")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overall_status"], "degraded");
}

#[tokio::test]
async fn restart_reports_post_restart_state() {
    let h = harness(3, FakeDriver::default());

    let (status, body) = send(
        &h.router,
        post_json("/api/v1/restart", serde_json::json!({ "actor": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "restarted");
    // Degraded during the grace period is reported as starting.
    assert_eq!(body["data"]["status"], "starting");
    assert_eq!(h.driver.restarts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn restart_over_limit_is_429() {
    let h = harness(1, FakeDriver::default());
    let req = || post_json("/api/v1/restart", serde_json::json!({ "actor": "alice" }));

    let (status, _) = send(&h.router, req()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&h.router, req()).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body["error"].as_str().unwrap().contains("1 per hour"));
    assert_eq!(h.driver.restarts.load(Ordering::SeqCst), 1);

    let (status, body) = send(&h.router, get("/api/v1/restart/quota/alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["remaining"], 0);
    assert_eq!(body["data"]["limit"], 1);

    let (_, body) = send(&h.router, get("/api/v1/restart/quota/bob")).await;
    assert_eq!(body["data"]["remaining"], 1);
}

#[tokio::test]
async fn restart_requires_actor() {
    let h = harness(1, FakeDriver::default());
    let (status, _) = send(
        &h.router,
        post_json("/api/v1/restart", serde_json::json!({ "actor": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(h.driver.restarts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_restart_is_bad_gateway() {
    let h = harness(3, FakeDriver {
        missing: true,
        ..Default::default()
    });
    let (status, body) = send(
        &h.router,
        post_json("/api/v1/restart", serde_json::json!({ "actor": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn container_endpoints() {
    let h = harness(3, FakeDriver::default());

    let (status, body) = send(&h.router, get("/api/v1/container")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "running");

    let (status, _) = send(
        &h.router,
        post_json("/api/v1/container/start", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &h.router,
        post_json("/api/v1/container/stop", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "stopped");

    let (status, body) = send(&h.router, get("/api/v1/container/logs?lines=3")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lines"], 3);
    assert_eq!(body["data"]["logs"], "line 0\nline 1\nline 2\n");

    let (status, body) = send(&h.router, get("/api/v1/container/inspect")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["restart_count"], 2);
    assert_eq!(body["data"]["resources"]["cpu_percent"], 12.5);
    assert_eq!(body["data"]["resources"]["memory_percent"], 25.0);
}

#[tokio::test]
async fn container_listing_and_diagnosis() {
    let h = harness(3, FakeDriver::default());

    let (status, body) = send(&h.router, get("/api/v1/containers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["data"][0]["name"], "rage-server");

    let (status, body) = send(&h.router, get("/api/v1/container/diagnose")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["target"], "rage-server");
    assert_eq!(body["data"]["target_found"], true);
    assert_eq!(body["data"]["target_status"], "running");
    assert_eq!(body["data"]["similar"][0]["name"], "rage-server-staging");
}

#[tokio::test]
async fn diagnosis_reports_unreachable_runtime() {
    let h = harness(3, FakeDriver {
        missing: true,
        ..Default::default()
    });

    let (status, _) = send(&h.router, get("/api/v1/containers")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = send(&h.router, get("/api/v1/container/diagnose")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["runtime_reachable"], false);
    assert!(body["data"]["error"].as_str().unwrap().contains("Docker daemon"));
}

#[tokio::test]
async fn unconfigured_server_endpoints() {
    let h = harness(3, FakeDriver::default());

    let (status, body) = send(&h.router, get("/api/v1/server/players")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("players endpoint not configured"));

    let (status, _) = send(&h.router, get("/api/v1/server/info")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&h.router, get("/api/v1/server/uptime")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn players_are_passed_through() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 2048];
        let _ = socket.read(&mut buf).await;
        let body = r#"{"online":1,"players":["ann"]}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });

    let server = ServerQueries::new(
        Some(format!("http://{addr}/players")),
        None,
        None,
        Duration::from_secs(2),
    );
    let h = harness_with(3, FakeDriver::default(), server);

    let (status, body) = send(&h.router, get("/api/v1/server/players")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["online"], 1);
    assert_eq!(body["data"]["players"][0], "ann");
}

#[tokio::test]
async fn missing_container_is_404() {
    let h = harness(3, FakeDriver {
        missing: true,
        ..Default::default()
    });

    let (status, body) = send(&h.router, get("/api/v1/container")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "not_found");

    let (status, _) = send(&h.router, get("/api/v1/container/inspect")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &h.router,
        post_json("/api/v1/container/start", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
