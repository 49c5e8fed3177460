//! writes notifications into the configured kafka topic
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::{
	error::KafkaError,
	producer::{FutureProducer, FutureRecord},
	ClientConfig,
};
use thiserror::Error;
use tracing::{debug, info};

use super::{security::TransportSecurity, settings::KafkaSettings};

#[derive(Debug, Error)]
pub enum PublishError {
	#[error("no kafka broker configured")]
	NoBrokers,
	#[error("{0}")]
	Kafka(#[from] KafkaError),
	/// several messages failed at once, see [PublishError::into_first]
	#[error("{} messages could not be written", .0.len())]
	Batch(Vec<PublishError>),
}

impl PublishError {
	/// Reduce a batch error to the first error it contains. Remaining errors
	/// are dropped so callers only ever see a single error.
	pub fn into_first(self) -> Self {
		match self {
			Self::Batch(errors) => match errors.into_iter().next() {
				Some(first) => first.into_first(),
				None => Self::Batch(Vec::new()),
			},
			err => err,
		}
	}
}

/// sends a single message and waits for the broker to acknowledge it
#[async_trait]
pub trait Publisher: Send + Sync {
	async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// [Publisher] writing every message into one fixed topic
pub struct KafkaPublisher {
	producer: FutureProducer,
	topic: String,
	/// maximum time to wait for room in the producer queue
	queue_timeout: Duration,
}

impl KafkaPublisher {
	pub fn new(settings: &KafkaSettings, security: &TransportSecurity) -> Result<Self, PublishError> {
		let producer: FutureProducer = client_config(settings, security)?.create()?;

		info!(
			brokers = %settings.brokers().join(","),
			topic = %settings.topic,
			security_protocol = security.security_protocol(),
			"kafka producer created"
		);

		Ok(Self { producer, topic: settings.topic.clone(), queue_timeout: settings.message_timeout })
	}
}

/// librdkafka producer configuration for the given settings
pub(crate) fn client_config(
	settings: &KafkaSettings,
	security: &TransportSecurity,
) -> Result<ClientConfig, PublishError> {
	let brokers = settings.brokers();
	if brokers.is_empty() {
		return Err(PublishError::NoBrokers);
	}

	let mut config = ClientConfig::new();
	config
		.set("bootstrap.servers", brokers.join(","))
		.set("client.id", &settings.client_id)
		.set("message.timeout.ms", settings.message_timeout.as_millis().to_string())
		.set("acks", "all");

	security.apply(&mut config);

	Ok(config)
}

#[async_trait]
impl Publisher for KafkaPublisher {
	async fn publish(&self, payload: Vec<u8>) -> Result<(), PublishError> {
		let record: FutureRecord<'_, (), [u8]> = FutureRecord::to(&self.topic).payload(&payload);

		self.producer.send(record, self.queue_timeout).await.map_err(|(err, _message)| err)?;

		debug!(topic = %self.topic, size = payload.len(), "message written into kafka");

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use rdkafka::types::RDKafkaErrorCode;

	use super::*;
	use crate::kafka::{
		security::negotiate,
		settings::{SaslSettings, SslSettings},
	};

	fn settings(host: &str) -> KafkaSettings {
		KafkaSettings {
			host: host.to_owned(),
			topic: "alerts".to_owned(),
			client_id: "alertmanager2kafka-test".to_owned(),
			message_timeout: Duration::from_millis(2500),
			ssl: SslSettings::default(),
			sasl: SaslSettings::default(),
		}
	}

	fn plaintext() -> TransportSecurity {
		negotiate(&SslSettings::default(), &SaslSettings::default()).unwrap()
	}

	#[test]
	fn producer_config_from_settings() {
		let config = client_config(&settings("kafka-1:9092, kafka-2:9092"), &plaintext()).unwrap();

		assert_eq!(config.get("bootstrap.servers"), Some("kafka-1:9092,kafka-2:9092"));
		assert_eq!(config.get("client.id"), Some("alertmanager2kafka-test"));
		assert_eq!(config.get("message.timeout.ms"), Some("2500"));
		assert_eq!(config.get("security.protocol"), Some("PLAINTEXT"));
	}

	#[test]
	fn brokers_are_required() {
		assert!(matches!(client_config(&settings(" , "), &plaintext()), Err(PublishError::NoBrokers)));
	}

	#[test]
	fn batch_collapses_to_first_error() {
		let batch = PublishError::Batch(vec![
			PublishError::Kafka(KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)),
			PublishError::NoBrokers,
		]);

		let first = batch.into_first();
		assert!(matches!(
			first,
			PublishError::Kafka(KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut))
		));
	}

	#[test]
	fn nested_batches_collapse() {
		let batch = PublishError::Batch(vec![PublishError::Batch(vec![PublishError::NoBrokers])]);
		assert!(matches!(batch.into_first(), PublishError::NoBrokers));
	}

	#[test]
	fn empty_batch_stays_batch() {
		assert!(matches!(PublishError::Batch(vec![]).into_first(), PublishError::Batch(errors) if errors.is_empty()));
	}

	#[test]
	fn single_errors_are_kept() {
		assert!(matches!(PublishError::NoBrokers.into_first(), PublishError::NoBrokers));
	}
}
