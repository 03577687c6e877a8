//! csvflux CLI
//!
//! Export CSV files into an InfluxDB-compatible time series store.
//!
//! ## Usage
//!
//! ```bash
//! # Export one file into a 1.x database
//! csvflux --csv data.csv --dbname metrics -m weather --field-columns temp,humidity
//!
//! # Export a directory into a 2.x bucket, tagging by station
//! csvflux --csv ./data --org my-org --bucket weather --token $TOKEN \
//!     -m weather --field-columns '*' --tag-columns station
//!
//! # Take everything from a config file, print points instead of sending them
//! csvflux --config csvflux.yml --csv data.csv --dry-run
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use csvflux_exporter::config::ConnectionConfig;
use csvflux_exporter::{
    discover_csv_files, AppConfig, DryRunFormat, DryRunSink, ExportConfig, Exporter, FileStatus,
    InfluxSink, Sink,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csvflux")]
#[command(author, version, about = "Export CSV files into an InfluxDB-compatible time series store")]
struct Cli {
    /// Path to csvflux.yml; flags override its values
    #[arg(long, default_value = "csvflux.yml")]
    config: PathBuf,

    /// CSV file or directory of CSV files
    #[arg(short, long)]
    csv: PathBuf,

    /// Server address, host:port
    #[arg(short, long)]
    server: Option<String>,

    /// http or https
    #[arg(long)]
    http_schema: Option<String>,

    /// Database name (0.x/1.x)
    #[arg(long)]
    dbname: Option<String>,

    /// User name (0.x/1.x)
    #[arg(short, long)]
    user: Option<String>,

    /// Password (0.x/1.x)
    #[arg(short, long)]
    password: Option<String>,

    /// Organization (2.x)
    #[arg(long)]
    org: Option<String>,

    /// Bucket (2.x)
    #[arg(long)]
    bucket: Option<String>,

    /// Access token (2.x)
    #[arg(long)]
    token: Option<String>,

    /// Server version; skips version negotiation
    #[arg(long)]
    protocol_version: Option<String>,

    /// Measurement name
    #[arg(short, long)]
    measurement: Option<String>,

    /// CSV delimiter
    #[arg(short, long)]
    delimiter: Option<String>,

    /// CSV line terminator
    #[arg(long)]
    line_terminator: Option<String>,

    /// Time column name
    #[arg(short, long)]
    time_column: Option<String>,

    /// Pattern of non-numeric time values
    #[arg(long)]
    time_format: Option<String>,

    /// Time zone of formatted time values
    #[arg(long)]
    time_zone: Option<String>,

    /// Field columns, comma-separated; '*' for all
    #[arg(long, value_delimiter = ',')]
    field_columns: Option<Vec<String>>,

    /// Tag columns, comma-separated; '*' for all
    #[arg(long, value_delimiter = ',')]
    tag_columns: Option<Vec<String>>,

    /// Points per write
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Columns whose text values are length-limited
    #[arg(long, value_delimiter = ',')]
    limit_string_length_columns: Option<Vec<String>>,

    /// Length limit for --limit-string-length-columns
    #[arg(long)]
    limit_length: Option<usize>,

    /// Drop and recreate the database/bucket first
    #[arg(long)]
    drop_database: bool,

    /// Drop the measurement and its count measurement first
    #[arg(long)]
    drop_measurement: bool,

    /// Columns that must all match
    #[arg(long, value_delimiter = ',')]
    match_columns: Option<Vec<String>>,

    /// Literal match values
    #[arg(long, value_delimiter = ',')]
    match_by_string: Option<Vec<String>>,

    /// Case-insensitive match regexes
    #[arg(long, value_delimiter = ',')]
    match_by_regex: Option<Vec<String>>,

    /// Columns of which any hit excludes the row
    #[arg(long, value_delimiter = ',')]
    filter_columns: Option<Vec<String>>,

    /// Literal filter values
    #[arg(long, value_delimiter = ',')]
    filter_by_string: Option<Vec<String>>,

    /// Case-insensitive filter regexes
    #[arg(long, value_delimiter = ',')]
    filter_by_regex: Option<Vec<String>>,

    /// Write a <measurement>.count point per file
    #[arg(long)]
    enable_count_measurement: bool,

    /// Export files even when unchanged since the last run
    #[arg(long)]
    force_insert_even_csv_no_update: Option<bool>,

    /// Columns forced to text
    #[arg(long, value_delimiter = ',')]
    force_string_columns: Option<Vec<String>>,

    /// Columns forced to integer
    #[arg(long, value_delimiter = ',')]
    force_int_columns: Option<Vec<String>>,

    /// Columns forced to float
    #[arg(long, value_delimiter = ',')]
    force_float_columns: Option<Vec<String>>,

    /// Add a random uniq field and tag to every point
    #[arg(long)]
    unique: bool,

    /// Log points instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Log dry-run points as JSON instead of line protocol
    #[arg(long)]
    json: bool,
}

impl Cli {
    /// Apply flags on top of the file configuration
    fn apply(self, mut config: AppConfig) -> AppConfig {
        let conn = &mut config.connection;
        set(&mut conn.server, self.server);
        set(&mut conn.http_schema, self.http_schema);
        set(&mut conn.user, self.user);
        set(&mut conn.password, self.password);
        set(&mut conn.org, self.org);
        set(&mut conn.bucket, self.bucket);
        if self.dbname.is_some() {
            conn.database = self.dbname;
        }
        if self.token.is_some() {
            conn.token = self.token;
        }
        if self.protocol_version.is_some() {
            conn.protocol_version = self.protocol_version;
        }

        let export = &mut config.export;
        set(&mut export.measurement, self.measurement);
        set(&mut export.delimiter, self.delimiter);
        set(&mut export.line_terminator, self.line_terminator);
        set(&mut export.time_column, self.time_column);
        set(&mut export.time_format, self.time_format);
        set(&mut export.time_zone, self.time_zone);
        set(&mut export.field_columns, self.field_columns);
        set(&mut export.tag_columns, self.tag_columns);
        set(&mut export.batch_size, self.batch_size);
        set(&mut export.limit_string_length_columns, self.limit_string_length_columns);
        set(&mut export.limit_length, self.limit_length);
        set(&mut export.match_columns, self.match_columns);
        set(&mut export.match_by_string, self.match_by_string);
        set(&mut export.match_by_regex, self.match_by_regex);
        set(&mut export.filter_columns, self.filter_columns);
        set(&mut export.filter_by_string, self.filter_by_string);
        set(&mut export.filter_by_regex, self.filter_by_regex);
        set(&mut export.force_insert_even_csv_no_update, self.force_insert_even_csv_no_update);
        set(&mut export.force_string_columns, self.force_string_columns);
        set(&mut export.force_int_columns, self.force_int_columns);
        set(&mut export.force_float_columns, self.force_float_columns);
        export.drop_database |= self.drop_database;
        export.drop_measurement |= self.drop_measurement;
        export.enable_count_measurement |= self.enable_count_measurement;
        export.unique |= self.unique;

        config
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    info!("Loading configuration from {}", path.display());
    AppConfig::from_file(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone();
    let csv = cli.csv.clone();
    let dry_run = cli.dry_run;
    let format = if cli.json {
        DryRunFormat::Json
    } else {
        DryRunFormat::LineProtocol
    };

    let config = cli.apply(load_config(&config_path)?);
    config.export.validate().context("Invalid configuration")?;

    let files = discover_csv_files(&csv)
        .with_context(|| format!("Failed to list CSV files in {}", csv.display()))?;
    if files.is_empty() {
        anyhow::bail!("No CSV files found in {}", csv.display());
    }

    info!("Configuration:");
    info!("  Measurement: {}", config.export.measurement);
    info!("  Field columns: {:?}", config.export.field_columns);
    info!("  Tag columns: {:?}", config.export.tag_columns);
    info!("  Time column: {}", config.export.time_column);
    info!("  Batch size: {}", config.export.batch_size);
    info!("  Files: {}", files.len());

    if dry_run {
        run(config.export, DryRunSink::new(format), &files)
    } else {
        let sink = connect(&config.connection, config.export.batch_size)?;
        run(config.export, sink, &files)
    }
}

fn connect(connection: &ConnectionConfig, batch_size: usize) -> Result<InfluxSink> {
    info!("Connecting to {}", connection.base_url());
    InfluxSink::connect(connection, batch_size)
        .with_context(|| format!("Failed to connect to {}", connection.base_url()))
}

fn run<S: Sink>(config: ExportConfig, sink: S, files: &[PathBuf]) -> Result<()> {
    let start = Instant::now();
    let mut exporter = Exporter::new(config, sink).context("Invalid configuration")?;
    exporter.prepare().context("Failed to prepare the database")?;

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}",
        )
        .context("Invalid progress style template")?
        .progress_chars("#>-"),
    );

    let mut exported = 0;
    let mut skipped = 0;
    let mut points = 0;
    for file in files {
        progress.set_message(file.display().to_string());
        let report = progress.suspend(|| exporter.export_file(file));
        let report = report.with_context(|| format!("Failed to export {}", file.display()))?;
        match report.status {
            FileStatus::Exported => exported += 1,
            _ => skipped += 1,
        }
        points += report.points;
        progress.inc(1);
    }
    progress.finish_with_message("done");

    println!("\nExport complete:");
    println!("  Files exported: {}", exported);
    println!("  Files skipped: {}", skipped);
    println!("  Points written: {}", points);
    println!("  Total time: {:.2}s", start.elapsed().as_secs_f64());
    Ok(())
}
