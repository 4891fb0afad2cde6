//! warden-core: shared building blocks for the warden service.
//!
//! Holds the TOML configuration, the health domain types produced by the
//! probes and the monitor, and the two boundary traits the core consumes:
//! [`ContainerDriver`] for container lifecycle and [`MessageSink`] for
//! operator notifications.

pub mod config;
pub mod delivery;
pub mod driver;
pub mod error;
pub mod types;

pub use config::{WardenConfig, parse_duration};
pub use delivery::MessageSink;
pub use driver::ContainerDriver;
pub use error::{ConfigError, DeliveryError, DriverError};
pub use types::*;

/// Boxed, `Send` future returned by the collaborator traits.
pub type BoxFuture<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Current unix time in seconds.
pub fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
