//! Exporter configuration
//!
//! Every option the pipeline understands is enumerated here with its default.
//! Configuration can be loaded from YAML (`csvflux.yml`) and is validated once
//! before any file is touched.
//!
//! ```yaml
//! connection:
//!   server: "localhost:8086"
//!   database: "metrics"
//!
//! export:
//!   measurement: "weather"
//!   field_columns: ["temperature", "humidity"]
//!   tag_columns: ["station"]
//!   batch_size: 500
//! ```

use crate::error::{ExportError, Result};
use chrono_tz::Tz;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete configuration file layout
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Time series store connection settings
    pub connection: ConnectionConfig,
    /// Row pipeline settings
    pub export: ExportConfig,
}

impl AppConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ExportError::Config(format!("YAML parse error: {}", e)))
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }
}

/// Connection settings for the InfluxDB-compatible sink
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Server address, `host:port`
    pub server: String,
    /// `http` or `https`
    pub http_schema: String,
    /// 0.x/1.x only: user name
    pub user: String,
    /// 0.x/1.x only: password
    pub password: String,
    /// 0.x/1.x only: database name
    pub database: Option<String>,
    /// 2.x only: organization
    pub org: String,
    /// 2.x only: bucket
    pub bucket: String,
    /// 2.x only: access token
    pub token: Option<String>,
    /// Server version override; skips the `/ping` negotiation when set
    pub protocol_version: Option<String>,
    /// HTTP request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            server: "localhost:8086".to_string(),
            http_schema: "http".to_string(),
            user: "admin".to_string(),
            password: "admin".to_string(),
            database: None,
            org: "my-org".to_string(),
            bucket: "my-bucket".to_string(),
            token: None,
            protocol_version: None,
            timeout_secs: 30,
        }
    }
}

impl ConnectionConfig {
    /// Base URL without trailing slash
    pub fn base_url(&self) -> String {
        let server = self.server.trim_end_matches('/');
        if server.starts_with("http://") || server.starts_with("https://") {
            server.to_string()
        } else {
            format!("{}://{}", self.http_schema, server)
        }
    }
}

/// Row pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Measurement name for every point of the run
    pub measurement: String,
    /// CSV delimiter, a single byte
    pub delimiter: String,
    /// CSV line terminator: `\n`, `\r\n` or a single byte
    pub line_terminator: String,
    /// Name of the time column
    pub time_column: String,
    /// strftime-style pattern for non-numeric time values
    pub time_format: String,
    /// IANA time zone the formatted time values are in
    pub time_zone: String,
    /// Columns written as fields (`*` for all)
    pub field_columns: Vec<String>,
    /// Columns written as tags (`*` for all)
    pub tag_columns: Vec<String>,
    /// Points per sink write
    pub batch_size: usize,
    /// Columns whose text is cut to `limit_length + 1` characters
    pub limit_string_length_columns: Vec<String>,
    /// Length limit for `limit_string_length_columns`
    pub limit_length: usize,
    /// Drop and recreate the database/bucket before exporting
    pub drop_database: bool,
    /// Drop the measurement (and its count measurement) before exporting
    pub drop_measurement: bool,
    /// Columns that must all match for a row to be admitted
    pub match_columns: Vec<String>,
    /// Literal values that count as a match
    pub match_by_string: Vec<String>,
    /// Case-insensitive regexes that count as a match
    pub match_by_regex: Vec<String>,
    /// Columns of which any hit excludes a row
    pub filter_columns: Vec<String>,
    /// Literal values that count as a filter hit
    pub filter_by_string: Vec<String>,
    /// Case-insensitive regexes that count as a filter hit
    pub filter_by_regex: Vec<String>,
    /// Write a `<measurement>.count` summary point per file
    pub enable_count_measurement: bool,
    /// Export files even when their checksum matches the sidecar record
    pub force_insert_even_csv_no_update: bool,
    /// Columns forced to text
    pub force_string_columns: Vec<String>,
    /// Columns forced to integer
    pub force_int_columns: Vec<String>,
    /// Columns forced to float
    pub force_float_columns: Vec<String>,
    /// Add a random `uniq` field and tag to every point
    pub unique: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            measurement: String::new(),
            delimiter: ",".to_string(),
            line_terminator: "\n".to_string(),
            time_column: "timestamp".to_string(),
            time_format: "%Y-%m-%d %H:%M:%S".to_string(),
            time_zone: "UTC".to_string(),
            field_columns: Vec::new(),
            tag_columns: Vec::new(),
            batch_size: 500,
            limit_string_length_columns: Vec::new(),
            limit_length: 20,
            drop_database: false,
            drop_measurement: false,
            match_columns: Vec::new(),
            match_by_string: Vec::new(),
            match_by_regex: Vec::new(),
            filter_columns: Vec::new(),
            filter_by_string: Vec::new(),
            filter_by_regex: Vec::new(),
            enable_count_measurement: false,
            force_insert_even_csv_no_update: false,
            force_string_columns: Vec::new(),
            force_int_columns: Vec::new(),
            force_float_columns: Vec::new(),
            unique: false,
        }
    }
}

impl ExportConfig {
    /// Create a config for the given measurement and field columns
    pub fn new(measurement: impl Into<String>, field_columns: Vec<String>) -> Self {
        Self {
            measurement: measurement.into(),
            field_columns,
            ..Default::default()
        }
    }

    /// Check every option once; the pipeline relies on these invariants
    pub fn validate(&self) -> Result<()> {
        if self.measurement.is_empty() {
            return Err(ExportError::Config("measurement must not be empty".into()));
        }
        if self.field_columns.is_empty() {
            return Err(ExportError::Config("at least one field column is required".into()));
        }
        if self.batch_size == 0 {
            return Err(ExportError::Config("batch_size must be greater than 0".into()));
        }
        self.delimiter_byte()?;
        self.terminator()?;
        self.tz()?;
        self.match_patterns()?;
        self.filter_patterns()?;
        Ok(())
    }

    /// Name of the per-file summary measurement
    pub fn count_measurement(&self) -> String {
        format!("{}.count", self.measurement)
    }

    /// Delimiter as the single byte the CSV reader expects
    pub fn delimiter_byte(&self) -> Result<u8> {
        single_byte(&self.delimiter, "delimiter")
    }

    /// Line terminator for the CSV reader and writer
    pub fn terminator(&self) -> Result<csv::Terminator> {
        match self.line_terminator.as_str() {
            "\n" | "\r\n" => Ok(csv::Terminator::CRLF),
            other => single_byte(other, "line_terminator").map(csv::Terminator::Any),
        }
    }

    /// Parsed time zone
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| ExportError::Config(format!("unknown time zone: {}", self.time_zone)))
    }

    /// Compiled `match_by_regex` patterns
    pub fn match_patterns(&self) -> Result<Vec<Regex>> {
        compile_patterns(&self.match_by_regex)
    }

    /// Compiled `filter_by_regex` patterns
    pub fn filter_patterns(&self) -> Result<Vec<Regex>> {
        compile_patterns(&self.filter_by_regex)
    }
}

fn single_byte(value: &str, name: &str) -> Result<u8> {
    match value.as_bytes() {
        [b] => Ok(*b),
        _ => Err(ExportError::Config(format!(
            "{} must be a single byte, got {:?}",
            name, value
        ))),
    }
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| ExportError::Config(format!("invalid regex {:?}: {}", p, e)))
        })
        .collect()
}
