//! everything needed to write notifications into kafka

pub mod publisher;
pub mod security;
pub mod settings;

pub use publisher::{KafkaPublisher, PublishError, Publisher};
pub use security::{negotiate, SecurityError, TransportSecurity};
pub use settings::KafkaSettings;
