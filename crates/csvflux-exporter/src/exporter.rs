//! File-level export pipeline
//!
//! Each file goes through the same steps:
//!
//! 1. Scan: headers, data row count, type hints. A file without a header or
//!    without any usable field column is skipped.
//! 2. Checksum gate: an unchanged file is skipped unless forced.
//! 3. Stream rows: every row is classified (so counters cover the whole file),
//!    admitted rows become points and are written in batches.
//! 4. Final flush, then the optional count point.
//! 5. The sidecar with the new checksum replaces the old one.
//!
//! Any error returned from [`Exporter::export_file`] is fatal for the run.

use crate::batch::{count_point, BatchWriter};
use crate::checksum::{file_checksum, ChecksumGate, GateDecision, CHECKSUM_COLUMN};
use crate::classify::{CheckRule, FileCounters, MatchFilterEngine};
use crate::coerce::TypeCoercer;
use crate::columns::ColumnSet;
use crate::config::ExportConfig;
use crate::error::Result;
use crate::point::RowPointBuilder;
use crate::sink::Sink;
use crate::source::{CsvOptions, CsvRows, CsvScan};
use crate::timestamp::TimestampResolver;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// How a file was handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Exported,
    /// Checksum matches the sidecar record
    Unchanged,
    NoHeader,
    NoFieldColumns,
}

/// Outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub status: FileStatus,
    /// Data rows in the file
    pub rows: usize,
    /// Rows that passed match/filter
    pub admitted: usize,
    /// Points written, the count point included
    pub points: usize,
}

impl FileReport {
    fn skipped(path: &Path, status: FileStatus, rows: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            status,
            rows,
            admitted: 0,
            points: 0,
        }
    }
}

/// Exports CSV files into a [`Sink`]
pub struct Exporter<S: Sink> {
    config: ExportConfig,
    sink: S,
    options: CsvOptions,
    resolver: TimestampResolver,
    coercer: TypeCoercer,
    match_patterns: Vec<Regex>,
    filter_patterns: Vec<Regex>,
}

impl<S: Sink> Exporter<S> {
    /// Validate the configuration and set up the per-run state
    pub fn new(config: ExportConfig, sink: S) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            options: CsvOptions::from_config(&config)?,
            resolver: TimestampResolver::new(config.time_format.clone(), config.tz()?),
            coercer: TypeCoercer::from_config(&config),
            match_patterns: config.match_patterns()?,
            filter_patterns: config.filter_patterns()?,
            config,
            sink,
        })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Run the configured admin operations; call once before any file
    pub fn prepare(&mut self) -> Result<()> {
        if self.config.drop_database {
            self.sink.recreate_namespace()?;
        }
        if self.config.drop_measurement {
            self.sink.drop_measurement(&self.config.measurement)?;
            self.sink.drop_measurement(&self.config.count_measurement())?;
        }
        Ok(())
    }

    /// Export files in order, stopping at the first fatal error
    pub fn export_all(&mut self, paths: &[PathBuf]) -> Result<Vec<FileReport>> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            reports.push(self.export_file(path)?);
        }
        Ok(reports)
    }

    /// Export one file
    pub fn export_file(&mut self, path: &Path) -> Result<FileReport> {
        let file = path.display().to_string();
        info!("Processing {}", file);

        let scan = CsvScan::scan(path, &self.options)?;
        if scan.headers.is_empty() {
            error!("The csv file {} has no header, skip...", file);
            return Ok(FileReport::skipped(path, FileStatus::NoHeader, 0));
        }
        debug!("Headers of {}: {:?}", file, scan.headers);

        let mut columns = ColumnSet::resolve(
            &scan.headers,
            &self.config.field_columns,
            &self.config.tag_columns,
            &self.config.match_columns,
            &self.config.filter_columns,
        );
        if columns.fields.is_empty() {
            error!(
                "None of the field columns {:?} exist in {}, skip...",
                self.config.field_columns, file
            );
            return Ok(FileReport::skipped(path, FileStatus::NoFieldColumns, scan.row_count));
        }
        if columns.tags.is_empty() {
            warn!("No tag columns found in {}, points will carry no tags", file);
        }

        let checksum = file_checksum(path)?;
        let gate = ChecksumGate::new(path, self.config.force_insert_even_csv_no_update, self.options);
        let checksum = match gate.decide(&checksum)? {
            GateDecision::Skip => {
                warn!(
                    "The file {} has not been updated since the last export, skip...",
                    file
                );
                return Ok(FileReport::skipped(path, FileStatus::Unchanged, scan.row_count));
            }
            GateDecision::Proceed { checksum } => checksum,
        };

        let time_column = self.config.time_column.clone();
        let mut injected = Vec::new();
        let synthetic = if scan.headers.iter().any(|h| *h == time_column) {
            None
        } else {
            let synthetic = self.resolver.synthetic_from_modified(path)?;
            warn!(
                "Time column {} not found in {}, using the file modification time {}",
                time_column, file, synthetic.value
            );
            columns.add_field_and_tag(&time_column);
            injected.push((time_column.clone(), synthetic.value.clone()));
            Some(synthetic.timestamp)
        };
        injected.push((CHECKSUM_COLUMN.to_string(), checksum));

        let engine = MatchFilterEngine::new(
            CheckRule::new(
                columns.matches.clone(),
                self.config.match_by_string.clone(),
                self.match_patterns.clone(),
            ),
            CheckRule::new(
                columns.filters.clone(),
                self.config.filter_by_string.clone(),
                self.filter_patterns.clone(),
            ),
        );
        let mut counters = FileCounters::new(scan.row_count);

        let rows = CsvRows::open(path, &self.options, &scan.headers, injected)?;
        let mut sidecar = gate.writer(rows.header())?;

        let builder = RowPointBuilder::new(
            &self.config.measurement,
            &columns,
            &scan.hints,
            &self.coercer,
        );
        let mut writer = BatchWriter::new(&mut self.sink, self.config.batch_size);
        let mut read = 0;
        let mut admitted = 0;
        let mut last_timestamp = None;

        for row in rows {
            let row = row?;
            read += 1;
            sidecar.write_row(&row)?;

            if !engine.classify(&row, &mut counters) {
                continue;
            }
            admitted += 1;

            let timestamp = match synthetic {
                Some(ts) => ts,
                None => self
                    .resolver
                    .resolve(row.get(&time_column).unwrap_or_default())?,
            };
            writer.push(builder.build(&row, timestamp)?)?;
            last_timestamp = Some(timestamp);
        }

        let mut points = writer.finish()?;
        info!("Read {} lines from {}", read, file);

        if self.config.enable_count_measurement {
            let point = count_point(
                &self.config.count_measurement(),
                &counters,
                last_timestamp.unwrap_or(0),
            )?;
            self.sink.write_points(std::slice::from_ref(&point))?;
            points += 1;
            info!("Wrote count measurement {}", point.measurement);
        }
        counters.reset();

        sidecar.commit()?;
        info!("Finished {}: {} of {} rows exported", file, admitted, read);

        Ok(FileReport {
            path: path.to_path_buf(),
            status: FileStatus::Exported,
            rows: read,
            admitted,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use csvflux_core::FieldValue;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn config(fields: &[&str]) -> ExportConfig {
        ExportConfig::new("weather", fields.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut bad = config(&["temp"]);
        bad.batch_size = 0;
        assert!(Exporter::new(bad, RecordingSink::new()).is_err());
    }

    #[test]
    fn test_prepare_drops_measurement_and_count_measurement() {
        let mut cfg = config(&["temp"]);
        cfg.drop_database = true;
        cfg.drop_measurement = true;
        let mut exporter = Exporter::new(cfg, RecordingSink::new()).unwrap();
        exporter.prepare().unwrap();

        let sink = exporter.into_sink();
        assert_eq!(sink.recreated(), 1);
        assert_eq!(
            sink.dropped_measurements(),
            ["weather".to_string(), "weather.count".to_string()]
        );
    }

    #[test]
    fn test_export_simple_file() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "data.csv",
            "timestamp,station,temp\n1577836800,north,21.5\n1577836860,south,\n",
        );
        let mut cfg = config(&["temp"]);
        cfg.tag_columns = vec!["station".into()];
        let mut exporter = Exporter::new(cfg, RecordingSink::new()).unwrap();

        let report = exporter.export_file(&path).unwrap();
        assert_eq!(report.status, FileStatus::Exported);
        assert_eq!(report.rows, 2);
        assert_eq!(report.points, 2);

        let points: Vec<_> = exporter.sink().points().cloned().collect();
        assert_eq!(points[0].timestamp, 1_577_836_800_000_000_000);
        assert_eq!(points[0].get_tag("station"), Some("north"));
        assert_eq!(points[0].get_field("temp"), Some(&FieldValue::Float(21.5)));
        assert_eq!(points[1].get_field("temp"), Some(&FieldValue::Float(-999.0)));
    }

    #[test]
    fn test_file_without_header_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "empty.csv", "");
        let mut exporter = Exporter::new(config(&["temp"]), RecordingSink::new()).unwrap();
        let report = exporter.export_file(&path).unwrap();
        assert_eq!(report.status, FileStatus::NoHeader);
        assert!(exporter.sink().batches().is_empty());
    }

    #[test]
    fn test_file_without_field_columns_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "data.csv", "timestamp,other\n1,2\n");
        let mut exporter = Exporter::new(config(&["temp"]), RecordingSink::new()).unwrap();
        let report = exporter.export_file(&path).unwrap();
        assert_eq!(report.status, FileStatus::NoFieldColumns);
        assert_eq!(report.rows, 1);
        assert!(!crate::checksum::sidecar_path(&path).exists());
    }

    #[test]
    fn test_bad_timestamp_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "data.csv", "timestamp,temp\nyesterday,1\n");
        let mut exporter = Exporter::new(config(&["temp"]), RecordingSink::new()).unwrap();
        let err = exporter.export_file(&path).unwrap_err();
        assert!(err.to_string().contains("yesterday"));
        assert!(!crate::checksum::sidecar_path(&path).exists());
    }
}
