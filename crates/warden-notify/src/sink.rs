//! Message sinks shipped with warden.

use tracing::info;

use warden_core::{BoxFuture, DeliveryError, MessageSink};

/// Writes every message to the log instead of a chat transport.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl MessageSink for LogSink {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), DeliveryError>> {
        Box::pin(async move {
            info!(%recipient, %text, "notification");
            Ok(())
        })
    }
}
