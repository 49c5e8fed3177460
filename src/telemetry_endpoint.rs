//! Here we expose prometheus metrics about alertmanager2kafka
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use anyhow::{Context, Result};
use axum::{
	extract::Extension,
	http::{header::CONTENT_TYPE, StatusCode},
	response::{IntoResponse, Response},
	routing::get,
	Router,
};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Deserialize;
use tokio::net::TcpListener;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelemetryEndpointSettings {
	pub bind_address: IpAddr,
	pub port: u16,
}

impl Default for TelemetryEndpointSettings {
	fn default() -> Self {
		Self { bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED), port: 9098 }
	}
}

impl TelemetryEndpointSettings {
	pub fn to_socket_addr(&self) -> SocketAddr {
		SocketAddr::new(self.bind_address, self.port)
	}
}

async fn metrics_handler(Extension(registry): Extension<Registry>) -> Response {
	let mut buffer = vec![];
	let encoder = TextEncoder::new();
	let metric_families = registry.gather();

	match encoder.encode(&metric_families, &mut buffer) {
		Ok(()) => ([(CONTENT_TYPE, encoder.format_type().to_owned())], buffer).into_response(),
		Err(err) => {
			tracing::error!("failed to encode metrics: {err}");
			(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
		}
	}
}

async fn healthz() -> &'static str {
	"Ok"
}

pub fn router(registry: Registry) -> Router {
	Router::new()
		.route("/metrics", get(metrics_handler))
		.route("/healthz", get(healthz))
		.layer(Extension(registry))
}

pub async fn run_telemetry_endpoint(settings: &TelemetryEndpointSettings, registry: Registry) -> Result<()> {
	let addr = settings.to_socket_addr();
	let listener =
		TcpListener::bind(addr).await.with_context(|| format!("cannot bind telemetry endpoint to {addr}"))?;

	tracing::info!(%addr, "telemetry endpoint listening");

	axum::serve(listener, router(registry)).await.context("telemetry endpoint crashed")?;

	Ok(())
}
