//! Batched-write sink for 2.x servers

use super::{
    check_response, http_client, line_protocol::points_to_line_protocol, write_error, Sink,
};
use crate::config::ConnectionConfig;
use crate::error::{ExportError, Result};
use chrono::{SecondsFormat, Utc};
use csvflux_core::Point;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Splits a write into chunks and reports chunk failures to a callback
///
/// A failing chunk does not stop the remaining ones; the callback decides what
/// a failure means for the caller.
#[derive(Debug, Clone, Copy)]
pub struct WriteApi {
    batch_size: usize,
}

impl WriteApi {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn write<F, E>(&self, points: &[Point], mut send: F, mut on_error: E)
    where
        F: FnMut(&[Point]) -> Result<()>,
        E: FnMut(ExportError),
    {
        for chunk in points.chunks(self.batch_size) {
            if let Err(e) = send(chunk) {
                on_error(e);
            }
        }
    }
}

/// Writes line protocol to `/api/v2/write`
pub struct InfluxV2Sink {
    client: reqwest::blocking::Client,
    base_url: String,
    org: String,
    bucket: String,
    token: String,
    write_api: WriteApi,
}

#[derive(Debug, Deserialize)]
struct Buckets {
    #[serde(default)]
    buckets: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Orgs {
    #[serde(default)]
    orgs: Vec<Resource>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
}

impl InfluxV2Sink {
    pub fn new(config: &ConnectionConfig, batch_size: usize) -> Result<Self> {
        let token = config
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ExportError::Config("connection.token is required for 2.x servers".into()))?;

        Ok(Self {
            client: http_client(config)?,
            base_url: config.base_url(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token,
            write_api: WriteApi::new(batch_size),
        })
    }

    fn auth(&self) -> String {
        format!("Token {}", self.token)
    }

    fn send(&self, points: &[Point]) -> Result<()> {
        let url = format!("{}/api/v2/write", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .body(points_to_line_protocol(points))
            .send()?;
        check_response(response)
    }

    fn find_bucket(&self) -> Result<Option<String>> {
        let url = format!("{}/api/v2/buckets", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .query(&[("name", self.bucket.as_str()), ("org", self.org.as_str())])
            .send()?;
        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let response = response.error_for_status()?;
        let buckets: Buckets = response.json()?;
        Ok(buckets.buckets.into_iter().next().map(|b| b.id))
    }

    fn find_org(&self) -> Result<String> {
        let url = format!("{}/api/v2/orgs", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth())
            .query(&[("org", self.org.as_str())])
            .send()?
            .error_for_status()?;
        let orgs: Orgs = response.json()?;
        orgs.orgs
            .into_iter()
            .next()
            .map(|o| o.id)
            .ok_or_else(|| ExportError::Config(format!("Organization not found: {}", self.org)))
    }
}

impl Sink for InfluxV2Sink {
    fn write_points(&mut self, points: &[Point]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut failure: Option<ExportError> = None;
        self.write_api.write(
            points,
            |chunk| self.send(chunk),
            |e| {
                warn!("Batch write failed: {}", e);
                failure.get_or_insert(e);
            },
        );

        match failure {
            None => Ok(()),
            Some(e) => Err(write_error(e)),
        }
    }

    fn drop_measurement(&mut self, measurement: &str) -> Result<()> {
        info!("Deleting measurement {} from bucket {}", measurement, self.bucket);
        let url = format!("{}/api/v2/delete", self.base_url);
        let body = json!({
            "start": "1970-01-01T00:00:00Z",
            "stop": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            "predicate": format!("_measurement=\"{}\"", measurement.replace('"', "\\\"")),
        });
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .query(&[("org", self.org.as_str()), ("bucket", self.bucket.as_str())])
            .json(&body)
            .send()?;
        check_response(response)
    }

    fn recreate_namespace(&mut self) -> Result<()> {
        info!("Dropping and recreating bucket {}", self.bucket);
        if let Some(id) = self.find_bucket()? {
            debug!("Deleting bucket {}", id);
            let url = format!("{}/api/v2/buckets/{}", self.base_url, id);
            let response = self
                .client
                .delete(&url)
                .header("Authorization", self.auth())
                .send()?;
            check_response(response)?;
        }

        let org_id = self.find_org()?;
        let url = format!("{}/api/v2/buckets", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth())
            .json(&json!({ "orgID": org_id, "name": self.bucket }))
            .send()?;
        check_response(response)
    }
}
