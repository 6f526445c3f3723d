//! Push-notification service clients.
//!
//! - `log`: writes each notification to the log (development default)
//! - `webhook`: POSTs each notification as JSON to a configured endpoint

pub mod log;
pub mod webhook;

pub use log::LogPushService;
pub use webhook::WebhookPushService;
