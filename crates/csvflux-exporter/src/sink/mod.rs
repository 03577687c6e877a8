//! Point sinks
//!
//! The exporter talks to the store through [`Sink`]. Two HTTP protocol
//! variants are provided and picked by server version: `0.x`/`1.x` servers
//! take direct writes, anything newer goes through the batched write API.

mod influx_v1;
mod influx_v2;
pub mod line_protocol;
mod memory;

pub use influx_v1::InfluxV1Sink;
pub use influx_v2::{InfluxV2Sink, WriteApi};
pub use memory::{DryRunFormat, DryRunSink, RecordingSink};

use crate::config::ConnectionConfig;
use crate::error::{ExportError, Result};
use csvflux_core::Point;
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the server version on `/ping`
pub const VERSION_HEADER: &str = "X-Influxdb-Version";

/// Destination for exported points
pub trait Sink {
    /// Write one batch; an error aborts the run
    fn write_points(&mut self, points: &[Point]) -> Result<()>;

    /// Remove every point of a measurement
    fn drop_measurement(&mut self, measurement: &str) -> Result<()>;

    /// Drop and recreate the database (1.x) or bucket (2.x)
    fn recreate_namespace(&mut self) -> Result<()>;
}

/// Whether a version string selects the direct-write protocol
pub fn is_v1(version: &str) -> bool {
    version.starts_with('0') || version.starts_with('1')
}

/// Server version, from configuration or from `GET /ping`
pub fn negotiate(config: &ConnectionConfig) -> Result<String> {
    if let Some(version) = &config.protocol_version {
        debug!("Using configured protocol version {}", version);
        return Ok(version.trim_start_matches('v').to_string());
    }

    let client = http_client(config)?;
    let url = format!("{}/ping", config.base_url());
    let response = client.get(&url).send()?;
    let version = response
        .headers()
        .get(VERSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start_matches('v').to_string())
        .ok_or_else(|| {
            ExportError::Config(format!(
                "{} did not report {}; set connection.protocol_version",
                url, VERSION_HEADER
            ))
        })?;
    info!("Server version: {}", version);
    Ok(version)
}

pub(crate) fn http_client(config: &ConnectionConfig) -> Result<reqwest::blocking::Client> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Map a failed HTTP response to an error
///
/// Bodies reporting a field type conflict become [`ExportError::TypeConflict`].
pub(crate) fn response_error(status: u16, body: String) -> ExportError {
    if body.contains("field type conflict") {
        ExportError::TypeConflict { details: body }
    } else {
        ExportError::Server {
            status,
            message: body,
        }
    }
}

/// Wrap a failed point write so it carries the force-type hint
///
/// Type conflicts already carry it and pass through unchanged.
pub(crate) fn write_error(err: ExportError) -> ExportError {
    match err {
        e @ ExportError::TypeConflict { .. } => e,
        e @ ExportError::WriteRejected { .. } => e,
        e => ExportError::WriteRejected {
            message: e.to_string(),
        },
    }
}

pub(crate) fn check_response(response: reqwest::blocking::Response) -> Result<()> {
    if response.status().is_success() {
        return Ok(());
    }
    let status = response.status().as_u16();
    let body = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(response_error(status, body))
}

/// HTTP sink for either protocol variant
pub enum InfluxSink {
    V1(InfluxV1Sink),
    V2(InfluxV2Sink),
}

impl InfluxSink {
    /// Negotiate the server version and build the matching sink
    pub fn connect(config: &ConnectionConfig, batch_size: usize) -> Result<Self> {
        let version = negotiate(config)?;
        if is_v1(&version) {
            Ok(InfluxSink::V1(InfluxV1Sink::new(config)?))
        } else {
            Ok(InfluxSink::V2(InfluxV2Sink::new(config, batch_size)?))
        }
    }
}

impl Sink for InfluxSink {
    fn write_points(&mut self, points: &[Point]) -> Result<()> {
        match self {
            InfluxSink::V1(sink) => sink.write_points(points),
            InfluxSink::V2(sink) => sink.write_points(points),
        }
    }

    fn drop_measurement(&mut self, measurement: &str) -> Result<()> {
        match self {
            InfluxSink::V1(sink) => sink.drop_measurement(measurement),
            InfluxSink::V2(sink) => sink.drop_measurement(measurement),
        }
    }

    fn recreate_namespace(&mut self) -> Result<()> {
        match self {
            InfluxSink::V1(sink) => sink.recreate_namespace(),
            InfluxSink::V2(sink) => sink.recreate_namespace(),
        }
    }
}
