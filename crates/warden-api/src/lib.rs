//! warden-api: HTTP command surface for operators.
//!
//! Thin request/response glue over the monitor, the restart coordinator
//! and the container driver. Authentication is the front end's job; bind
//! the listener to loopback unless something in front of it checks who
//! is calling.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/health` | Probe now and return the snapshot |
//! | GET | `/api/v1/health/last` | Last snapshot recorded by the poll loop |
//! | POST | `/api/v1/restart` | Restart the container on behalf of an actor |
//! | GET | `/api/v1/restart/quota/{actor}` | Restarts left in the current window |
//! | GET | `/api/v1/container` | Container status |
//! | POST | `/api/v1/container/start` | Start the container |
//! | POST | `/api/v1/container/stop` | Stop the container |
//! | GET | `/api/v1/container/logs` | Recent container logs (`?lines=N`) |
//! | GET | `/api/v1/container/inspect` | Container details and resource usage |
//! | GET | `/api/v1/container/diagnose` | Why the container can or cannot be found |
//! | GET | `/api/v1/containers` | Every container the runtime knows about |
//! | GET | `/api/v1/server/players` | Players endpoint passthrough |
//! | GET | `/api/v1/server/info` | Info endpoint passthrough |
//! | GET | `/api/v1/server/uptime` | Uptime from the health endpoint payload |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use warden_control::RestartCoordinator;
use warden_core::ContainerDriver;
use warden_health::{HealthMonitor, ServerQueries};

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub monitor: Arc<HealthMonitor>,
    pub restarts: Arc<RestartCoordinator>,
    pub driver: Arc<dyn ContainerDriver>,
    pub server: Arc<ServerQueries>,
}

/// Build the API router.
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(handlers::current_health))
        .route("/health/last", get(handlers::last_health))
        .route("/restart", post(handlers::restart))
        .route("/restart/quota/{actor}", get(handlers::restart_quota))
        .route("/container", get(handlers::container_status))
        .route("/container/start", post(handlers::start_container))
        .route("/container/stop", post(handlers::stop_container))
        .route("/container/logs", get(handlers::container_logs))
        .route("/container/inspect", get(handlers::inspect_container))
        .route("/container/diagnose", get(handlers::diagnose_container))
        .route("/containers", get(handlers::list_containers))
        .route("/server/players", get(handlers::server_players))
        .route("/server/info", get(handlers::server_info))
        .route("/server/uptime", get(handlers::server_uptime))
        .with_state(state);

    Router::new().nest("/api/v1", api_routes)
}
