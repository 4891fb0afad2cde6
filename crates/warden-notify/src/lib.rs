//! warden-notify: tells operators about health transitions that matter.
//!
//! Only two transitions are announced: the server finishing its startup
//! (`starting`/`unhealthy` → `healthy`) and the server going down
//! (`healthy`/`degraded` → `unhealthy`). Each announcement is sent to
//! every configured recipient; one failed delivery never stops the rest.

pub mod notifier;
pub mod sink;

pub use notifier::{DeliveryReport, Notification, Notifier, notification_for};
pub use sink::LogSink;
