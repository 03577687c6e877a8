//! csvflux exporter - CSV to time series export pipeline
//!
//! This crate turns CSV files into points and writes them to an
//! InfluxDB-compatible store.
//!
//! ## Pipeline
//!
//! - **Columns**: configured field/tag/match/filter lists are resolved against
//!   each file's headers (`*` selects every header)
//! - **Coercion**: truncation, forced types and empty-value sentinels
//! - **Match/filter**: per-row admission with per-file hit counters
//! - **Timestamps**: POSIX seconds or a strftime-style pattern in a time zone
//! - **Checksum gate**: unchanged files are skipped on re-runs
//! - **Batching**: fixed-size sink writes plus an optional count point
//!
//! ## Usage
//!
//! ```no_run
//! use csvflux_exporter::{discover_csv_files, ExportConfig, Exporter, InfluxSink};
//! use csvflux_exporter::config::ConnectionConfig;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut config = ExportConfig::new("weather", vec!["temperature".to_string()]);
//!     config.tag_columns = vec!["station".to_string()];
//!
//!     let connection = ConnectionConfig {
//!         database: Some("metrics".to_string()),
//!         ..Default::default()
//!     };
//!     let sink = InfluxSink::connect(&connection, config.batch_size)?;
//!
//!     let mut exporter = Exporter::new(config, sink)?;
//!     exporter.prepare()?;
//!     let reports = exporter.export_all(&discover_csv_files(Path::new("data/"))?)?;
//!
//!     println!("Exported {} files", reports.len());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod checksum;
pub mod classify;
pub mod coerce;
pub mod columns;
pub mod config;
pub mod error;
pub mod exporter;
pub mod point;
pub mod sink;
pub mod source;
pub mod timestamp;

pub use config::{AppConfig, ExportConfig};
pub use error::{ExportError, Result};
pub use exporter::{Exporter, FileReport, FileStatus};
pub use sink::{DryRunFormat, DryRunSink, InfluxSink, RecordingSink, Sink};
pub use source::discover_csv_files;
