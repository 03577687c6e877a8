//! Direct-write sink for 0.x/1.x servers

use super::{
    check_response, http_client, line_protocol::points_to_line_protocol, write_error, Sink,
};
use crate::config::ConnectionConfig;
use crate::error::{ExportError, Result};
use csvflux_core::Point;
use tracing::{debug, info};

/// Writes line protocol to `/write` and runs admin statements on `/query`
pub struct InfluxV1Sink {
    client: reqwest::blocking::Client,
    base_url: String,
    database: String,
    user: String,
    password: String,
}

impl InfluxV1Sink {
    pub fn new(config: &ConnectionConfig) -> Result<Self> {
        let database = config
            .database
            .clone()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                ExportError::Config("connection.database is required for 0.x/1.x servers".into())
            })?;

        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url(),
            database,
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn query(&self, statement: &str) -> Result<()> {
        debug!("Query: {}", statement);
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("q", statement),
                ("u", self.user.as_str()),
                ("p", self.password.as_str()),
            ])
            .send()?;
        check_response(response)
    }

    fn send(&self, points: &[Point]) -> Result<()> {
        let url = format!("{}/write", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[
                ("db", self.database.as_str()),
                ("precision", "ns"),
                ("u", self.user.as_str()),
                ("p", self.password.as_str()),
            ])
            .body(points_to_line_protocol(points))
            .send()?;
        check_response(response)
    }
}

impl Sink for InfluxV1Sink {
    fn write_points(&mut self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.send(points).map_err(write_error)
    }

    fn drop_measurement(&mut self, measurement: &str) -> Result<()> {
        info!("Dropping measurement {}", measurement);
        self.query(&format!(
            "DROP MEASUREMENT {}",
            quote_identifier(measurement)
        ))
    }

    fn recreate_namespace(&mut self) -> Result<()> {
        info!("Dropping and recreating database {}", self.database);
        let db = quote_identifier(&self.database);
        self.query(&format!("DROP DATABASE {}", db))?;
        self.query(&format!("CREATE DATABASE {}", db))
    }
}

/// Double-quote an InfluxQL identifier
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}
