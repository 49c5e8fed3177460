//! http endpoint alertmanager sends its webhook notifications to
use std::{
	net::{IpAddr, Ipv4Addr, SocketAddr},
	sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
	extract::{rejection::BytesRejection, DefaultBodyLimit, Extension},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::post,
	Router,
};
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::{
	kafka::{PublishError, Publisher},
	metrics::AlertMetrics,
	notification::{Notification, TimestampZone, SUPPORTED_VERSION},
};

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertReceiverSettings {
	pub bind_address: IpAddr,
	pub port: u16,
	/// route alertmanager posts to
	pub path: String,
	/// zone of the `@timestamp` added to every notification
	pub timestamp_zone: TimestampZone,
}

impl Default for AlertReceiverSettings {
	fn default() -> Self {
		Self {
			bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
			port: 9097,
			path: "/webhook".to_owned(),
			timestamp_zone: TimestampZone::default(),
		}
	}
}

impl AlertReceiverSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

/// shared by all requests
pub struct State {
	publisher: Arc<dyn Publisher>,
	metrics: AlertMetrics,
	timestamp_zone: TimestampZone,
}

impl State {
	pub fn new(publisher: Arc<dyn Publisher>, metrics: AlertMetrics, timestamp_zone: TimestampZone) -> Self {
		Self { publisher, metrics, timestamp_zone }
	}
}

/// reasons a notification was not forwarded
#[derive(Debug, Error)]
pub enum ReceiveError {
	#[error("got empty request body")]
	EmptyBody,
	#[error("{0}")]
	ReadBody(BytesRejection),
	#[error("{0}")]
	Decode(serde_json::Error),
	#[error("do not understand webhook version {:?}, only version {:?} is supported", .0, SUPPORTED_VERSION)]
	UnsupportedVersion(String),
	#[error("cannot encode notification: {0}")]
	Encode(serde_json::Error),
	#[error("unable to write into kafka: {0}")]
	Publish(PublishError),
}

impl ReceiveError {
	fn status_code(&self) -> StatusCode {
		match self {
			Self::ReadBody(_) | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
			Self::EmptyBody | Self::Decode(_) | Self::UnsupportedVersion(_) | Self::Publish(_) => {
				StatusCode::BAD_REQUEST
			}
		}
	}
}

impl IntoResponse for ReceiveError {
	fn into_response(self) -> Response {
		(self.status_code(), self.to_string()).into_response()
	}
}

async fn alertmanager_receiver(
	Extension(state): Extension<Arc<State>>,
	body: Result<Bytes, BytesRejection>,
) -> Result<StatusCode, ReceiveError> {
	state.metrics.received.inc();

	match forward(&state, body).await {
		Ok(()) => {
			state.metrics.successful.inc();
			Ok(StatusCode::OK)
		}
		Err(err) => {
			state.metrics.invalid.inc();
			tracing::error!("{err}");
			Err(err)
		}
	}
}

/// decode, validate, stamp and publish a single notification
async fn forward(state: &State, body: Result<Bytes, BytesRejection>) -> Result<(), ReceiveError> {
	let body = body.map_err(ReceiveError::ReadBody)?;
	if body.is_empty() {
		return Err(ReceiveError::EmptyBody);
	}

	let mut notification: Notification = serde_json::from_slice(&body).map_err(ReceiveError::Decode)?;

	if !notification.is_supported_version() {
		return Err(ReceiveError::UnsupportedVersion(notification.version().to_owned()));
	}

	notification.stamp(state.timestamp_zone);

	let payload = serde_json::to_vec(&notification).map_err(ReceiveError::Encode)?;

	state
		.publisher
		.publish(payload)
		.await
		.map_err(|err| ReceiveError::Publish(err.into_first()))?;

	tracing::debug!(common_labels = ?notification.common_labels(), "received and stored alert");

	Ok(())
}

/// router serving the webhook on `path`. Notifications are read without a
/// size limit, alertmanager groups can get large.
pub fn router(state: Arc<State>, path: &str) -> Router {
	Router::new()
		.route(path, post(alertmanager_receiver))
		.layer(DefaultBodyLimit::disable())
		.layer(Extension(state))
}

pub async fn run_alertmanager_receiver(settings: &AlertReceiverSettings, state: Arc<State>) -> Result<()> {
	let addr = settings.to_socket_addr();
	let listener = TcpListener::bind(addr)
		.await
		.with_context(|| format!("cannot bind alertmanager webhook receiver to {addr}"))?;

	tracing::info!(%addr, path = %settings.path, "alertmanager webhook receiver listening");

	axum::serve(listener, router(state, &settings.path))
		.await
		.context("alertmanager webhook receiver crashed")?;

	Ok(())
}
