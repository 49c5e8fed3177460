//! derives how the kafka producer secures its broker connections
//!
//! TLS and SASL are configured independently. Selecting SCRAM without
//! enabling TLS still loads a CA bundle so the broker certificate gets
//! verified. Everything in here runs once before the producer is created, any
//! error is a startup error.
use std::{
	fmt, fs, io,
	path::{Path, PathBuf},
};

use rcgen::KeyPair;
use rdkafka::ClientConfig;
use thiserror::Error;
use tracing::{debug, info};
use x509_parser::pem::Pem;

use super::settings::{SaslSettings, SslSettings};

/// `security_protocol` has to contain this to enable authentication
const SASL_MARKER: &str = "SASL";
/// `mechanism` has to contain this to select SCRAM
const SCRAM_MARKER: &str = "SCRAM";
/// PEM label of PKCS#8 private keys
const PKCS8_LABEL: &str = "PRIVATE KEY";
/// base64 characters per PEM line
const PEM_LINE_LENGTH: usize = 64;

#[derive(Debug, Error)]
pub enum SecurityError {
	#[error("ssl is enabled but no {0} file is configured")]
	MissingFile(&'static str),
	#[error("cannot read {kind} file {}: {source}", .path.display())]
	Read {
		kind: &'static str,
		path: PathBuf,
		#[source]
		source: io::Error,
	},
	#[error("cannot load certificates from {kind} file {}", .path.display())]
	NoCertificate { kind: &'static str, path: PathBuf },
	#[error("cannot load private key from key file {}", .0.display())]
	NoPrivateKey(PathBuf),
	#[error("cannot parse private key from key file {}: {reason}", .path.display())]
	InvalidKey { path: PathBuf, reason: String },
	#[error("private key in {} does not belong to certificate {}", .key.display(), .cert.display())]
	KeyMismatch { cert: PathBuf, key: PathBuf },
	#[error("username and password have to be provided if sasl mechanism is scram")]
	MissingScramCredentials,
	#[error("cannot construct SCRAM-SHA-512 mechanism: {0}")]
	Mechanism(String),
}

/// ready to use security configuration for the producer
#[derive(Clone)]
pub struct TransportSecurity {
	tls: Option<Tls>,
	sasl: Option<ScramMechanism>,
}

#[derive(Clone)]
struct Tls {
	/// PEM encoded trust roots
	ca: String,
	identity: Option<ClientIdentity>,
}

#[derive(Clone)]
struct ClientIdentity {
	certificate: String,
	key: String,
}

/// SCRAM-SHA-512 credentials
#[derive(Clone)]
pub struct ScramMechanism {
	username: String,
	password: String,
}

impl ScramMechanism {
	/// librdkafka name of the mechanism
	pub const NAME: &'static str = "SCRAM-SHA-512";

	pub fn sha512(username: &str, password: &str) -> Result<Self, SecurityError> {
		for (field, value) in [("username", username), ("password", password)] {
			if value.chars().any(char::is_control) {
				return Err(SecurityError::Mechanism(format!(
					"{field} contains prohibited control characters"
				)));
			}
		}

		Ok(Self { username: username.to_owned(), password: password.to_owned() })
	}

	#[cfg(test)]
	fn username(&self) -> &str {
		&self.username
	}
}

impl fmt::Debug for ScramMechanism {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ScramMechanism").field("username", &self.username).finish_non_exhaustive()
	}
}

impl fmt::Debug for TransportSecurity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TransportSecurity")
			.field("security_protocol", &self.security_protocol())
			.field("client_certificate", &self.has_client_certificate())
			.field("sasl", &self.sasl)
			.finish()
	}
}

impl TransportSecurity {
	/// librdkafka `security.protocol` matching the configured features
	pub fn security_protocol(&self) -> &'static str {
		match (&self.tls, &self.sasl) {
			(None, None) => "PLAINTEXT",
			(Some(_), None) => "SSL",
			(None, Some(_)) => "SASL_PLAINTEXT",
			(Some(_), Some(_)) => "SASL_SSL",
		}
	}

	pub fn has_client_certificate(&self) -> bool {
		self.tls.as_ref().map_or(false, |tls| tls.identity.is_some())
	}

	#[cfg(test)]
	fn scram(&self) -> Option<&ScramMechanism> {
		self.sasl.as_ref()
	}

	/// write the security options into a producer configuration
	pub fn apply(&self, config: &mut ClientConfig) {
		config.set("security.protocol", self.security_protocol());

		if let Some(tls) = &self.tls {
			config.set("ssl.ca.pem", &tls.ca);

			if let Some(identity) = &tls.identity {
				config
					.set("ssl.certificate.pem", &identity.certificate)
					.set("ssl.key.pem", &identity.key);
			}
		}

		if let Some(scram) = &self.sasl {
			config
				.set("sasl.mechanism", ScramMechanism::NAME)
				.set("sasl.username", &scram.username)
				.set("sasl.password", &scram.password);
		}
	}
}

/// build the transport security from the ssl and sasl settings
pub fn negotiate(ssl: &SslSettings, sasl: &SaslSettings) -> Result<TransportSecurity, SecurityError> {
	debug!("starting kafka connection security setup");

	let mut tls = None;

	if ssl.enable {
		let cert_file = ssl.cert_file.as_deref().ok_or(SecurityError::MissingFile("cert"))?;
		let key_file = ssl.key_file.as_deref().ok_or(SecurityError::MissingFile("key"))?;

		let identity = ClientIdentity::load(cert_file, key_file)?;
		let ca = load_ca_bundle(ssl.ca_file())?;

		info!(
			key = %key_file.display(),
			cert = %cert_file.display(),
			cacert = %ssl.ca_file().display(),
			"configured client-side ssl"
		);

		tls = Some(Tls { ca, identity: Some(identity) });
	}

	let mut mechanism = None;

	if sasl.security_protocol.contains(SASL_MARKER) {
		debug!("configuring sasl");

		if sasl.mechanism.contains(SCRAM_MARKER) {
			debug!("configuring scram");

			if sasl.scram_username.is_empty() || sasl.scram_password.is_empty() {
				return Err(SecurityError::MissingScramCredentials);
			}

			if tls.is_none() {
				let ca = load_ca_bundle(ssl.ca_file())?;
				info!(cacert = %ssl.ca_file().display(), "configured client-side ssl");

				tls = Some(Tls { ca, identity: None });
			}

			mechanism = Some(ScramMechanism::sha512(&sasl.scram_username, &sasl.scram_password)?);
		}
	}

	Ok(TransportSecurity { tls, sasl: mechanism })
}

impl ClientIdentity {
	fn load(cert_file: &Path, key_file: &Path) -> Result<Self, SecurityError> {
		let certificates = certificates(&read_pem("cert", cert_file)?);
		let Some(leaf) = certificates.first() else {
			return Err(SecurityError::NoCertificate { kind: "cert", path: cert_file.to_owned() });
		};

		let key = read_pem("key", key_file)?;
		let key_block = Pem::iter_from_buffer(key.as_bytes())
			.map_while(Result::ok)
			.find(|block| block.label.ends_with(PKCS8_LABEL) && !block.contents.is_empty())
			.ok_or_else(|| SecurityError::NoPrivateKey(key_file.to_owned()))?;

		// PKCS#1 and SEC1 keys are passed on unchecked, librdkafka validates them
		if key_block.label == PKCS8_LABEL && !key_matches(leaf, &key_block, key_file)? {
			return Err(SecurityError::KeyMismatch { cert: cert_file.to_owned(), key: key_file.to_owned() });
		}

		Ok(Self { certificate: encode_certificates(&certificates), key })
	}
}

/// whether the PKCS#8 `key` is the private half of the public key in `leaf`
fn key_matches(leaf: &Pem, key: &Pem, key_file: &Path) -> Result<bool, SecurityError> {
	let key_pair = KeyPair::try_from(key.contents.as_slice())
		.map_err(|err| SecurityError::InvalidKey { path: key_file.to_owned(), reason: err.to_string() })?;

	let matches = leaf
		.parse_x509()
		.map_or(false, |cert| *cert.public_key().subject_public_key.data == *key_pair.public_key_raw());

	Ok(matches)
}

/// CA bundle reduced to its certificates
fn load_ca_bundle(path: &Path) -> Result<String, SecurityError> {
	let certificates = certificates(&read_pem("ca cert", path)?);

	if certificates.is_empty() {
		return Err(SecurityError::NoCertificate { kind: "ca cert", path: path.to_owned() });
	}

	debug!(path = %path.display(), count = certificates.len(), "loaded ca certificates");
	Ok(encode_certificates(&certificates))
}

fn read_pem(kind: &'static str, path: &Path) -> Result<String, SecurityError> {
	fs::read_to_string(path).map_err(|source| SecurityError::Read { kind, path: path.to_owned(), source })
}

/// parseable X.509 certificates, other PEM blocks are skipped
fn certificates(pem: &str) -> Vec<Pem> {
	Pem::iter_from_buffer(pem.as_bytes())
		.map_while(Result::ok)
		.filter(|block| block.label == "CERTIFICATE" && block.parse_x509().is_ok())
		.collect()
}

fn encode_certificates(certificates: &[Pem]) -> String {
	let mut encoded = String::new();

	for certificate in certificates {
		encoded.push_str("-----BEGIN CERTIFICATE-----\n");

		let body = base64::encode(&certificate.contents);
		for line in body.as_bytes().chunks(PEM_LINE_LENGTH) {
			// base64 output is ascii
			encoded.push_str(&String::from_utf8_lossy(line));
			encoded.push('\n');
		}

		encoded.push_str("-----END CERTIFICATE-----\n");
	}

	encoded
}
