//! Checksum gate for idempotent re-runs
//!
//! Every exported file gets a sidecar `<stem>_influx.csv` next to it: the
//! original columns plus an `md5` column holding the source file's content hash
//! (and the injected time column when the source had none). Before exporting,
//! the recorded hash is compared with the current one and an unchanged file is
//! skipped unless forced.

use crate::error::Result;
use crate::source::{CsvOptions, Header, Row};
use md5::{Digest, Md5};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Appended to the source file stem to name the sidecar
pub const SIDECAR_SUFFIX: &str = "_influx";

/// Column of the sidecar holding the source checksum
pub const CHECKSUM_COLUMN: &str = "md5";

/// Sidecar path for a source file
pub fn sidecar_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{}{}.csv", stem, SIDECAR_SUFFIX))
}

/// Whether a path is the sidecar of a source file next to it
///
/// A `*_influx.csv` without its source is ordinary input.
pub fn is_sidecar(path: &Path) -> bool {
    let Some(base) = path
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_suffix(SIDECAR_SUFFIX))
    else {
        return false;
    };
    let source = path.with_file_name(format!("{}.csv", base));
    source.is_file() && sidecar_path(&source) == path
}

/// Hex MD5 of the whole file content
pub fn file_checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Outcome of the gate for one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Same content as the last export and not forced
    Skip,
    /// Export and record this checksum
    Proceed { checksum: String },
}

/// Compares a source file against its sidecar record
#[derive(Debug, Clone)]
pub struct ChecksumGate {
    sidecar: PathBuf,
    force: bool,
    options: CsvOptions,
}

impl ChecksumGate {
    pub fn new(source: &Path, force: bool, options: CsvOptions) -> Self {
        Self {
            sidecar: sidecar_path(source),
            force,
            options,
        }
    }

    pub fn sidecar(&self) -> &Path {
        &self.sidecar
    }

    /// Checksum recorded by the previous export, if any
    pub fn recorded(&self) -> Result<Option<String>> {
        if !self.sidecar.exists() {
            return Ok(None);
        }
        let mut reader = self.options.reader(&self.sidecar)?;
        let Some(idx) = reader.headers()?.iter().position(|h| h == CHECKSUM_COLUMN) else {
            return Ok(None);
        };
        let mut record = csv::StringRecord::new();
        if reader.read_record(&mut record)? {
            Ok(record.get(idx).map(str::to_string))
        } else {
            Ok(None)
        }
    }

    /// Decide whether a file with `checksum` gets exported
    pub fn decide(&self, checksum: &str) -> Result<GateDecision> {
        let recorded = self.recorded()?;
        debug!(
            "Checksum of {}: current {}, recorded {:?}",
            self.sidecar.display(),
            checksum,
            recorded
        );
        if !self.force && recorded.as_deref() == Some(checksum) {
            return Ok(GateDecision::Skip);
        }
        Ok(GateDecision::Proceed {
            checksum: checksum.to_string(),
        })
    }

    /// Start a new sidecar; it replaces the old one only on [`SidecarWriter::commit`]
    pub fn writer(&self, header: &Header) -> Result<SidecarWriter> {
        let tmp = self.sidecar.with_extension("csv.tmp");
        let mut writer = self.options.writer(&tmp)?;
        writer.write_record(header.names())?;
        Ok(SidecarWriter {
            writer,
            tmp,
            target: self.sidecar.clone(),
            committed: false,
        })
    }
}

/// Streams rows into a temporary sidecar
///
/// Dropping the writer without committing removes the temporary file, so an
/// aborted export leaves the previous record in place.
pub struct SidecarWriter {
    writer: csv::Writer<File>,
    tmp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl SidecarWriter {
    pub fn write_row(&mut self, row: &Row) -> Result<()> {
        self.writer.write_record(row.values())?;
        Ok(())
    }

    /// Flush and move the sidecar into place
    pub fn commit(mut self) -> Result<()> {
        self.writer.flush()?;
        std::fs::rename(&self.tmp, &self.target)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for SidecarWriter {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.tmp);
        }
    }
}
