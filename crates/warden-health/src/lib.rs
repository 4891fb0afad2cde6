//! warden-health: health evaluation and change detection for the
//! managed game server.
//!
//! # Architecture
//!
//! ```text
//! HealthMonitor
//!   ├── Probe (NetworkProbe in production)
//!   │   ├── probe_ports() → one TCP connect per configured port
//!   │   └── probe_http()  → GET on the health endpoint
//!   ├── HealthClassifier → healthy / degraded / unhealthy
//!   ├── GracePeriod      → unhealthy readings become `starting` after a restart
//!   └── run()            → single poll loop, invokes a callback on transitions
//!
//! ServerQueries          → on-demand players / info / uptime lookups
//! ```
//!
//! Probes never fail: every transport fault is folded into the probe
//! result as `available = false` / `healthy = false` with a reason.

pub mod classifier;
pub mod monitor;
pub mod probe;
pub mod query;

pub use classifier::HealthClassifier;
pub use monitor::{GracePeriod, HealthMonitor, TransitionCallback};
pub use probe::{NetworkProbe, Probe, ProbeReport, probe_http, probe_port, probe_ports};
pub use query::{ServerQueries, query_json};
