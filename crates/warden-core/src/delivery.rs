//! Outbound message delivery boundary.

use crate::BoxFuture;
use crate::error::DeliveryError;

/// Sends a text message to one recipient (a group chat or a user).
///
/// Failures are returned per call; callers decide whether to continue.
pub trait MessageSink: Send + Sync {
    fn send<'a>(
        &'a self,
        recipient: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, Result<(), DeliveryError>>;
}
