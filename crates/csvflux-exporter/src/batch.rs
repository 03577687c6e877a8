//! Batched point writes and the per-file count measurement

use crate::classify::FileCounters;
use crate::error::Result;
use crate::sink::Sink;
use csvflux_core::{Point, Timestamp};
use tracing::info;

/// Accumulates points and hands them to the sink in fixed-size batches
///
/// A batch is flushed as soon as it reaches `batch_size`; [`BatchWriter::finish`]
/// flushes the remainder. Sink errors are returned as-is and abort the file.
pub struct BatchWriter<'a, S: Sink + ?Sized> {
    sink: &'a mut S,
    batch_size: usize,
    pending: Vec<Point>,
    written: usize,
}

impl<'a, S: Sink + ?Sized> BatchWriter<'a, S> {
    pub fn new(sink: &'a mut S, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            sink,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            written: 0,
        }
    }

    /// Queue a point, flushing when the batch is full
    pub fn push(&mut self, point: Point) -> Result<()> {
        self.pending.push(point);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Points queued but not yet written
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Points written so far
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        info!("Inserting {} data_points", self.pending.len());
        self.sink.write_points(&self.pending)?;
        self.written += self.pending.len();
        info!("Wrote {} points", self.pending.len());
        self.pending.clear();
        Ok(())
    }

    /// Flush the remainder and return the number of points written
    pub fn finish(mut self) -> Result<usize> {
        self.flush()?;
        Ok(self.written)
    }
}

/// Summary point of one file on `<measurement>.count`
///
/// Fields are `total` (the file's data row count) followed by `match_<col>`
/// and `filter_<col>` per counter. The point carries no tags.
pub fn count_point(
    count_measurement: &str,
    counters: &FileCounters,
    timestamp: Timestamp,
) -> Result<Point> {
    let mut builder = Point::builder(count_measurement)
        .timestamp(timestamp)
        .field("total", counters.row_count());

    for (column, count) in counters.matches() {
        builder = builder.field(format!("match_{}", column), *count);
    }
    for (column, count) in counters.filters() {
        builder = builder.field(format!("filter_{}", column), *count);
    }

    Ok(builder.build()?)
}
