//! warden-control: operator-initiated container control.
//!
//! - [`RestartGovernor`]: per-actor sliding-window restart admission.
//! - [`RestartCoordinator`]: admit → record → arm grace period → restart
//!   → report post-restart health.
//! - [`DockerCliDriver`]: `ContainerDriver` backed by the docker CLI.
//! - [`diagnose`]: explains a failed container lookup.

pub mod diagnose;
pub mod docker;
pub mod governor;
pub mod restart;

pub use diagnose::{Diagnosis, diagnose};
pub use docker::DockerCliDriver;
pub use governor::{RESTART_WINDOW, RestartGovernor};
pub use restart::{RestartCoordinator, RestartOutcome};
