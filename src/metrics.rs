//! prometheus meters for the webhook receiver

use prometheus::{IntCounter, Opts, Registry};

#[derive(Debug, Clone)]
/// counters for notifications passing through the webhook receiver
pub struct AlertMetrics {
	/// every request hitting the webhook
	pub(crate) received: IntCounter,
	/// requests which could not be decoded, validated or forwarded
	pub(crate) invalid: IntCounter,
	/// notifications written into kafka
	pub(crate) successful: IntCounter,
}

impl AlertMetrics {
	/// construct the counters and register them with `registry`
	pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
		let received = register(registry, "alerts_received", "alertmanager2kafka received alerts")?;
		let invalid = register(registry, "alerts_invalid", "alertmanager2kafka invalid alerts")?;
		let successful = register(
			registry,
			"alerts_successful",
			"alertmanager2kafka successful stored alerts",
		)?;

		Ok(Self { received, invalid, successful })
	}

	pub fn received(&self) -> u64 {
		self.received.get()
	}

	pub fn invalid(&self) -> u64 {
		self.invalid.get()
	}

	pub fn successful(&self) -> u64 {
		self.successful.get()
	}
}

fn register(registry: &Registry, name: &str, help: &str) -> Result<IntCounter, prometheus::Error> {
	let counter = IntCounter::with_opts(Opts::new(name, help).namespace("alertmanager2kafka"))?;
	registry.register(Box::new(counter.clone()))?;

	Ok(counter)
}
