//! config file options for the kafka connection

use std::{fmt, path::{Path, PathBuf}, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

/// CA bundle used when no `ca_file` is configured
pub const DEFAULT_CA_FILE: &str = "/etc/ssl/certs/ca-certificates.crt";

#[serde_as]
#[derive(Debug, Clone, Deserialize)]
/// where and how notifications are written
pub struct KafkaSettings {
	/// comma separated list of brokers
	pub host: String,
	/// topic every notification is written into
	pub topic: String,
	#[serde(default = "default_client_id")]
	pub client_id: String,
	/// how long librdkafka tries to deliver a message before giving up
	#[serde_as(as = "DurationSeconds<f64>")]
	#[serde(default = "default_message_timeout")]
	pub message_timeout: Duration,
	#[serde(default)]
	pub ssl: SslSettings,
	#[serde(default)]
	pub sasl: SaslSettings,
}

fn default_client_id() -> String {
	"alertmanager2kafka".to_owned()
}

fn default_message_timeout() -> Duration {
	Duration::from_secs(10)
}

impl KafkaSettings {
	/// broker addresses with surrounding whitespace and empty entries removed
	pub fn brokers(&self) -> Vec<&str> {
		self.host.split(',').map(str::trim).filter(|broker| !broker.is_empty()).collect()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
/// client side TLS
pub struct SslSettings {
	pub enable: bool,
	pub cert_file: Option<PathBuf>,
	pub key_file: Option<PathBuf>,
	pub ca_file: Option<PathBuf>,
}

impl SslSettings {
	/// configured CA bundle or the system default
	pub fn ca_file(&self) -> &Path {
		self.ca_file.as_deref().unwrap_or_else(|| Path::new(DEFAULT_CA_FILE))
	}
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
/// broker authentication, only SCRAM is understood
pub struct SaslSettings {
	/// e.g. `SASL_SSL`, authentication is only configured if this mentions SASL
	pub security_protocol: String,
	/// e.g. `SCRAM-SHA-512`
	pub mechanism: String,
	pub scram_username: String,
	pub scram_password: String,
}

impl fmt::Debug for SaslSettings {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SaslSettings")
			.field("security_protocol", &self.security_protocol)
			.field("mechanism", &self.mechanism)
			.field("scram_username", &self.scram_username)
			.field("scram_password", &"<redacted>")
			.finish()
	}
}
