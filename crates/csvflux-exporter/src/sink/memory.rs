//! Sinks that keep points in-process

use super::{line_protocol::point_to_line, Sink};
use crate::error::{ExportError, Result};
use csvflux_core::Point;
use tracing::info;

/// Records every call; used by tests and embedding code
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Vec<Vec<Point>>,
    dropped: Vec<String>,
    recreated: usize,
    fail_with: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following write fail with `message`
    pub fn fail_writes(&mut self, message: impl Into<String>) {
        self.fail_with = Some(message.into());
    }

    pub fn batches(&self) -> &[Vec<Point>] {
        &self.batches
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.iter().map(Vec::len).collect()
    }

    /// All written points in write order
    pub fn points(&self) -> impl Iterator<Item = &Point> {
        self.batches.iter().flatten()
    }

    pub fn dropped_measurements(&self) -> &[String] {
        &self.dropped
    }

    pub fn recreated(&self) -> usize {
        self.recreated
    }

    pub fn clear(&mut self) {
        self.batches.clear();
        self.dropped.clear();
        self.recreated = 0;
    }
}

impl Sink for RecordingSink {
    fn write_points(&mut self, points: &[Point]) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(if message.contains("field type conflict") {
                ExportError::TypeConflict {
                    details: message.clone(),
                }
            } else {
                ExportError::WriteRejected {
                    message: message.clone(),
                }
            });
        }
        self.batches.push(points.to_vec());
        Ok(())
    }

    fn drop_measurement(&mut self, measurement: &str) -> Result<()> {
        self.dropped.push(measurement.to_string());
        Ok(())
    }

    fn recreate_namespace(&mut self) -> Result<()> {
        self.recreated += 1;
        Ok(())
    }
}

/// Output format of [`DryRunSink`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DryRunFormat {
    #[default]
    LineProtocol,
    Json,
}

/// Logs points instead of sending them
#[derive(Debug, Default)]
pub struct DryRunSink {
    format: DryRunFormat,
    written: usize,
}

impl DryRunSink {
    pub fn new(format: DryRunFormat) -> Self {
        Self { format, written: 0 }
    }

    /// Points seen so far
    pub fn written(&self) -> usize {
        self.written
    }
}

impl Sink for DryRunSink {
    fn write_points(&mut self, points: &[Point]) -> Result<()> {
        for point in points {
            match self.format {
                DryRunFormat::LineProtocol => info!("{}", point_to_line(point)),
                DryRunFormat::Json => match serde_json::to_string(point) {
                    Ok(json) => info!("{}", json),
                    Err(e) => info!("{:?} ({})", point, e),
                },
            }
        }
        self.written += points.len();
        Ok(())
    }

    fn drop_measurement(&mut self, measurement: &str) -> Result<()> {
        info!("[dry run] would drop measurement {}", measurement);
        Ok(())
    }

    fn recreate_namespace(&mut self) -> Result<()> {
        info!("[dry run] would drop and recreate the database");
        Ok(())
    }
}
