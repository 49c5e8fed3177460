use std::sync::Arc;

use alertmanager2kafka::{
	alertmanager_webhook_receiver::{self, State},
	kafka::{self, KafkaPublisher},
	log,
	metrics::AlertMetrics,
	settings::Settings,
	telemetry_endpoint,
};
use anyhow::{Context, Result};

/// exit the complete program if one thread panics
fn setup_panic_handler() {
	let default_panic = std::panic::take_hook();
	std::panic::set_hook(Box::new(move |info| {
		default_panic(info);
		std::process::exit(1);
	}));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
	setup_panic_handler();

	let settings = Settings::load().context("failed to load config and command line arguments")?;

	log::setup_logging(&settings.log).context("could not setup logging")?;

	let registry = prometheus::default_registry().clone();
	let metrics = AlertMetrics::new(&registry).context("failed to register metrics")?;

	let security = kafka::negotiate(&settings.kafka.ssl, &settings.kafka.sasl)
		.context("cannot configure kafka connection security")?;
	let publisher =
		KafkaPublisher::new(&settings.kafka, &security).context("failed to construct kafka producer")?;

	let state = Arc::new(State::new(
		Arc::new(publisher),
		metrics,
		settings.alert_webhook_receiver.timestamp_zone,
	));

	tokio::try_join!(
		alertmanager_webhook_receiver::run_alertmanager_receiver(&settings.alert_webhook_receiver, state),
		telemetry_endpoint::run_telemetry_endpoint(&settings.telemetry_endpoint, registry),
	)?;

	Ok(())
}
