use std::str::FromStr;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::{
	filter::LevelFilter, fmt, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
	EnvFilter,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
	pub level: String,
	/// emit one json object per line instead of human readable output
	pub json: bool,
}

impl Default for LogSettings {
	fn default() -> Self {
		Self { level: "info".to_owned(), json: false }
	}
}

impl LogSettings {
	pub fn level_filter(&self) -> Result<LevelFilter> {
		let level = tracing::Level::from_str(self.level.as_str())
			.with_context(|| format!("invalid log level {:?}", self.level))?;

		Ok(LevelFilter::from_level(level))
	}
}

pub fn setup_logging(settings: &LogSettings) -> Result<()> {
	let filter_layer = EnvFilter::default()
		.add_directive(settings.level_filter()?.into())
		.add_directive("rdkafka=warn".parse()?)
		.add_directive("hyper=warn".parse()?);

	let (json_layer, text_layer) = if settings.json {
		(Some(fmt::layer().json()), None)
	} else {
		(None, Some(fmt::layer()))
	};

	tracing_subscriber::registry()
		.with(filter_layer)
		.with(json_layer)
		.with(text_layer)
		.try_init()
		.context("a global tracing subscriber is already installed")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn level_is_case_insensitive() {
		let settings = LogSettings { level: "Debug".to_owned(), json: false };
		assert_eq!(settings.level_filter().unwrap(), LevelFilter::DEBUG);
	}

	#[test]
	fn unknown_level_is_rejected() {
		let settings = LogSettings { level: "loud".to_owned(), json: false };
		assert!(settings.level_filter().is_err());
	}
}
