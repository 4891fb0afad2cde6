//! Container lifecycle boundary.
//!
//! The monitor and governor never talk to a container runtime directly.
//! Command paths call a `ContainerDriver` and feed the outcome of
//! `restart()` back into the monitor.

use crate::BoxFuture;
use crate::error::DriverError;
use crate::types::{ContainerInfo, ContainerStatus, ContainerSummary};

/// Lifecycle operations against the single managed container.
///
/// `start`, `stop` and `restart` resolve once the container has reached
/// the expected state, or fail with the reason it did not.
pub trait ContainerDriver: Send + Sync {
    /// Name of the managed container.
    fn container_name(&self) -> &str;

    /// Current status. Runtime faults are reported as `ContainerStatus::Error`.
    fn status(&self) -> BoxFuture<'_, ContainerStatus>;

    fn start(&self) -> BoxFuture<'_, Result<(), DriverError>>;

    fn stop(&self) -> BoxFuture<'_, Result<(), DriverError>>;

    fn restart(&self) -> BoxFuture<'_, Result<(), DriverError>>;

    /// The last `lines` lines of container output.
    fn logs(&self, lines: usize) -> BoxFuture<'_, Result<String, DriverError>>;

    /// Details and resource usage of the managed container.
    fn inspect(&self) -> BoxFuture<'_, Result<ContainerInfo, DriverError>>;

    /// Every container the runtime knows about, running or not.
    fn list(&self) -> BoxFuture<'_, Result<Vec<ContainerSummary>, DriverError>>;
}
