//! prometheus alertmanager receiver that forwards notifications into kafka
//!
//! Every notification alertmanager posts to the webhook is checked for the
//! supported payload version, stamped with the time it was received and
//! written as a single json message into one kafka topic.

pub mod alertmanager_webhook_receiver;
pub mod kafka;
pub mod log;
pub mod metrics;
pub mod notification;
pub mod settings;
pub mod telemetry_endpoint;
