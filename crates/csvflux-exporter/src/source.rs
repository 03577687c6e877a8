//! CSV source reading
//!
//! A file is read twice: a scan pass counts the data rows and infers a
//! [`TypeHint`] per column, then a streaming pass yields [`Row`]s.

use crate::checksum::is_sidecar;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use csvflux_core::FieldValue;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reader/writer settings shared by the source file and its sidecar
#[derive(Debug, Clone, Copy)]
pub struct CsvOptions {
    pub delimiter: u8,
    pub terminator: csv::Terminator,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            terminator: csv::Terminator::CRLF,
        }
    }
}

impl CsvOptions {
    /// Build options from a validated config
    pub fn from_config(config: &ExportConfig) -> Result<Self> {
        Ok(Self {
            delimiter: config.delimiter_byte()?,
            terminator: config.terminator()?,
        })
    }

    /// Open a header-aware reader; ragged rows are tolerated
    pub fn reader(&self, path: &Path) -> Result<csv::Reader<File>> {
        Ok(csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .terminator(self.terminator)
            .from_path(path)?)
    }

    /// Open a writer using the same dialect
    pub fn writer(&self, path: &Path) -> Result<csv::Writer<File>> {
        let terminator = match self.terminator {
            csv::Terminator::Any(b) => csv::Terminator::Any(b),
            _ => csv::Terminator::Any(b'\n'),
        };
        Ok(csv::WriterBuilder::new()
            .delimiter(self.delimiter)
            .terminator(terminator)
            .from_path(path)?)
    }
}

/// Column names of a file, with O(1) lookup
#[derive(Debug, Clone, Default)]
pub struct Header {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Header {
    pub fn new(names: Vec<String>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, index }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

/// One CSV line: column name to raw string value, in header order
#[derive(Debug, Clone)]
pub struct Row {
    header: Arc<Header>,
    values: Vec<String>,
}

impl Row {
    pub fn new(header: Arc<Header>, values: Vec<String>) -> Self {
        debug_assert_eq!(header.len(), values.len());
        Self { header, values }
    }

    /// Raw value of a column
    pub fn get(&self, column: &str) -> Option<&str> {
        self.header
            .position(column)
            .and_then(|i| self.values.get(i))
            .map(String::as_str)
    }

    /// `(column, raw value)` pairs in header order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Inferred numeric shape of a column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TypeHint {
    /// Every non-empty value is a whole number
    pub int_like: bool,
    /// Every non-empty value is a number
    pub float_like: bool,
}

impl TypeHint {
    pub const TEXT: TypeHint = TypeHint {
        int_like: false,
        float_like: false,
    };

    /// Convert a raw cell into a typed value according to this hint
    pub fn type_value(&self, raw: &str) -> FieldValue {
        if raw.is_empty() {
            return FieldValue::String(String::new());
        }
        if self.int_like {
            if let Some(v) = parse_whole_number(raw) {
                return FieldValue::Integer(v);
            }
        } else if self.float_like {
            if let Ok(v) = raw.trim().parse::<f64>() {
                return FieldValue::Float(v);
            }
        }
        FieldValue::String(raw.to_string())
    }
}

/// Parse a whole number, accepting float notation with no fractional part (`"3.0"`, `"1e3"`)
pub fn parse_whole_number(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    let v = trimmed.parse::<f64>().ok()?;
    if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy)]
struct ColumnStats {
    seen: bool,
    all_int: bool,
    all_float: bool,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            seen: false,
            all_int: true,
            all_float: true,
        }
    }
}

impl ColumnStats {
    fn observe(&mut self, value: &str) {
        if value.is_empty() {
            return;
        }
        self.seen = true;
        if self.all_float && value.trim().parse::<f64>().is_err() {
            self.all_float = false;
        }
        if self.all_int && parse_whole_number(value).is_none() {
            self.all_int = false;
        }
    }

    fn finish(self) -> TypeHint {
        TypeHint {
            int_like: self.seen && self.all_int,
            float_like: self.seen && self.all_float,
        }
    }
}

/// Per-column type hints of one file
#[derive(Debug, Clone, Default)]
pub struct TypeHints {
    hints: HashMap<String, TypeHint>,
}

impl TypeHints {
    /// Hint for a column; unknown columns are text
    pub fn get(&self, column: &str) -> TypeHint {
        self.hints.get(column).copied().unwrap_or(TypeHint::TEXT)
    }

    pub fn insert(&mut self, column: impl Into<String>, hint: TypeHint) {
        self.hints.insert(column.into(), hint);
    }
}

/// Result of the scan pass over a file
#[derive(Debug, Clone)]
pub struct CsvScan {
    pub headers: Vec<String>,
    pub row_count: usize,
    pub hints: TypeHints,
}

impl CsvScan {
    /// Read the whole file once: headers, data row count and type hints
    pub fn scan(path: &Path, options: &CsvOptions) -> Result<Self> {
        let mut reader = options.reader(path)?;
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect();

        let mut stats = vec![ColumnStats::default(); headers.len()];
        let mut row_count = 0;
        let mut record = csv::StringRecord::new();
        while reader.read_record(&mut record)? {
            row_count += 1;
            for (stat, value) in stats.iter_mut().zip(record.iter()) {
                stat.observe(value);
            }
        }

        let mut hints = TypeHints::default();
        for (name, stat) in headers.iter().zip(stats) {
            hints.insert(name.clone(), stat.finish());
        }

        Ok(Self {
            headers,
            row_count,
            hints,
        })
    }
}

/// Streaming pass over a file, with extra constant columns appended to every row
pub struct CsvRows {
    reader: csv::Reader<File>,
    header: Arc<Header>,
    width: usize,
    injected: Vec<String>,
    record: csv::StringRecord,
}

impl CsvRows {
    /// Open `path` and append `injected` `(column, value)` pairs to each row
    pub fn open(
        path: &Path,
        options: &CsvOptions,
        headers: &[String],
        injected: Vec<(String, String)>,
    ) -> Result<Self> {
        let reader = options.reader(path)?;
        let mut names = headers.to_vec();
        let mut values = Vec::with_capacity(injected.len());
        for (name, value) in injected {
            names.push(name);
            values.push(value);
        }
        Ok(Self {
            reader,
            header: Arc::new(Header::new(names)),
            width: headers.len(),
            injected: values,
            record: csv::StringRecord::new(),
        })
    }

    /// Header including injected columns
    pub fn header(&self) -> &Header {
        &self.header
    }
}

impl Iterator for CsvRows {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                let mut values: Vec<String> = self
                    .record
                    .iter()
                    .take(self.width)
                    .map(str::to_string)
                    .collect();
                // Short rows are padded so every header column has a value
                values.resize(self.width, String::new());
                values.extend(self.injected.iter().cloned());
                Some(Ok(Row::new(Arc::clone(&self.header), values)))
            }
            Ok(false) => None,
            Err(e) => Some(Err(ExportError::Csv(e))),
        }
    }
}

/// Resolve an input path to the CSV files to export
///
/// A directory yields its `*.csv` children in name order; sidecars of files
/// in the same directory are skipped.
pub fn discover_csv_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(ExportError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("CSV path not found: {}", path.display()),
        )));
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .filter(|p| !is_sidecar(p))
        .collect();
    files.sort();
    Ok(files)
}
