use anyhow::{ensure, Context, Result};
use clap::{Arg, Command};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{
	alertmanager_webhook_receiver::AlertReceiverSettings, kafka::KafkaSettings, log::LogSettings,
	telemetry_endpoint::TelemetryEndpointSettings,
};

/// environment variables overriding config file values start with this
const ENV_PREFIX: &str = "ALERTMANAGER2KAFKA";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
	#[serde(default)]
	pub log: LogSettings,
	#[serde(default)]
	pub alert_webhook_receiver: AlertReceiverSettings,
	#[serde(default)]
	pub telemetry_endpoint: TelemetryEndpointSettings,
	pub kafka: KafkaSettings,
}

impl Settings {
	/// parse command line arguments, then read the config file and environment
	pub fn load() -> Result<Self> {
		let opts = Command::new(clap::crate_name!())
			.version(clap::crate_version!())
			.about(clap::crate_description!())
			.author(clap::crate_authors!())
			.args([
				Arg::new("config")
					.help("path of config file")
					.takes_value(true)
					.short('c')
					.long("config")
					.default_value("./config.yaml"),
				Arg::new("level")
					.help("log level")
					.possible_values(["Error", "Warn", "Info", "Debug", "Trace"])
					.ignore_case(true)
					.takes_value(true)
					.long("log"),
			])
			.get_matches();

		let config_path = opts.value_of("config").context("no config path given")?;

		let mut settings = Self::read(config_path, Self::environment())?;

		if let Some(level) = opts.value_of("level") {
			settings.log.level = level.to_string();
		}

		Ok(settings)
	}

	/// `ALERTMANAGER2KAFKA_KAFKA__HOST` overrides `kafka.host`
	fn environment() -> Environment {
		Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__").try_parsing(true)
	}

	/// merge the optional config file at `config_path` with `environment`
	fn read(config_path: &str, environment: Environment) -> Result<Self> {
		let conf = Config::builder()
			.add_source(File::with_name(config_path).required(false))
			.add_source(environment)
			.build()
			.context("can't load config")?;

		let settings: Settings = conf.try_deserialize().context("can't load config")?;
		settings.validate()?;

		Ok(settings)
	}

	fn validate(&self) -> Result<()> {
		ensure!(
			self.alert_webhook_receiver.path.starts_with('/'),
			"webhook path {:?} has to start with a slash",
			self.alert_webhook_receiver.path
		);
		ensure!(!self.kafka.topic.is_empty(), "kafka topic must not be empty");
		ensure!(!self.kafka.brokers().is_empty(), "at least one kafka broker has to be configured");

		Ok(())
	}
}
