use csvflux_core::{FieldValue, Point};
use csvflux_exporter::checksum::{sidecar_path, CHECKSUM_COLUMN};
use csvflux_exporter::coerce::UNIQUE_KEY;
use csvflux_exporter::{
    discover_csv_files, ExportConfig, ExportError, Exporter, FileStatus, RecordingSink,
};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    fn exporter(&self, config: ExportConfig) -> Exporter<RecordingSink> {
        Exporter::new(config, RecordingSink::new()).unwrap()
    }
}

fn config(fields: &[&str]) -> ExportConfig {
    ExportConfig::new("weather", fields.iter().map(|s| s.to_string()).collect())
}

fn points(exporter: &Exporter<RecordingSink>) -> Vec<Point> {
    exporter.sink().points().cloned().collect()
}

fn read_sidecar(path: &PathBuf) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(sidecar_path(path)).unwrap();
    let headers = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

#[test]
fn points_are_flushed_in_fixed_size_batches() {
    let env = TestEnv::new();
    let mut content = String::from("timestamp,value\n");
    for i in 0..1200 {
        content.push_str(&format!("{},{}\n", i, i));
    }
    let path = env.write("data.csv", &content);

    let mut exporter = env.exporter(config(&["value"]));
    let report = exporter.export_file(&path).unwrap();

    assert_eq!(report.rows, 1200);
    assert_eq!(report.points, 1200);
    assert_eq!(exporter.sink().batch_sizes(), vec![500, 500, 200]);

    let last = exporter.sink().points().last().unwrap();
    assert_eq!(last.timestamp, 1199 * 1_000_000_000);
    assert_eq!(last.get_field("value"), Some(&FieldValue::Integer(1199)));
}

#[test]
fn unchanged_file_is_skipped_and_changed_file_is_reprocessed() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,value\n1577836800,1\n1577836860,2\n");

    let mut first = env.exporter(config(&["value"]));
    assert_eq!(first.export_file(&path).unwrap().status, FileStatus::Exported);
    assert_eq!(points(&first).len(), 2);

    let (headers, rows) = read_sidecar(&path);
    assert_eq!(headers, vec!["timestamp", "value", CHECKSUM_COLUMN]);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2].len(), 32);

    let mut second = env.exporter(config(&["value"]));
    let report = second.export_file(&path).unwrap();
    assert_eq!(report.status, FileStatus::Unchanged);
    assert!(second.sink().batches().is_empty());

    // one byte changed
    env.write("data.csv", "timestamp,value\n1577836800,1\n1577836860,3\n");
    let mut third = env.exporter(config(&["value"]));
    assert_eq!(third.export_file(&path).unwrap().status, FileStatus::Exported);
    assert_eq!(
        points(&third)[1].get_field("value"),
        Some(&FieldValue::Integer(3))
    );
}

#[test]
fn forced_insert_exports_unchanged_file() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,value\n1,1\n");

    env.exporter(config(&["value"])).export_file(&path).unwrap();

    let mut cfg = config(&["value"]);
    cfg.force_insert_even_csv_no_update = true;
    let mut forced = env.exporter(cfg);
    assert_eq!(forced.export_file(&path).unwrap().status, FileStatus::Exported);
    assert_eq!(points(&forced).len(), 1);
}

#[test]
fn numeric_time_formats_resolve_to_the_same_timestamp() {
    let env = TestEnv::new();
    let path = env.write(
        "data.csv",
        "timestamp,value\n1577836800,1\n1577836800.000,2\n2020-01-01 00:00:00,3\n",
    );

    let mut exporter = env.exporter(config(&["value"]));
    exporter.export_file(&path).unwrap();

    for point in points(&exporter) {
        assert_eq!(point.timestamp, 1_577_836_800_000_000_000);
    }
}

#[test]
fn empty_values_get_type_sentinels() {
    let env = TestEnv::new();
    let path = env.write(
        "data.csv",
        "timestamp,count,temp,note,forced\n1,5,1.5,a,2.5\n2,,,,\n",
    );

    let mut cfg = config(&["count", "temp", "note", "forced"]);
    cfg.force_string_columns = vec!["forced".into()];
    let mut exporter = env.exporter(cfg);
    exporter.export_file(&path).unwrap();

    let points = points(&exporter);
    assert_eq!(points[0].get_field("count"), Some(&FieldValue::Integer(5)));
    assert_eq!(points[0].get_field("forced"), Some(&FieldValue::String("2.5".into())));

    let empty = &points[1];
    assert_eq!(empty.get_field("count"), Some(&FieldValue::Integer(-999)));
    assert_eq!(empty.get_field("temp"), Some(&FieldValue::Float(-999.0)));
    assert_eq!(empty.get_field("note"), Some(&FieldValue::String("-".into())));
    assert_eq!(empty.get_field("forced"), Some(&FieldValue::String("-".into())));
}

#[test]
fn match_and_filter_drive_admission_and_count_measurement() {
    let env = TestEnv::new();
    let path = env.write(
        "logs.csv",
        "timestamp,level,host,value\n1,warn,prod,1\n2,warn,test,2\n3,info,TEST,3\n4,info,prod,4\n",
    );

    let mut cfg = config(&["value"]);
    cfg.tag_columns = vec!["host".into()];
    cfg.match_columns = vec!["level".into()];
    cfg.match_by_string = vec!["warn".into()];
    cfg.filter_columns = vec!["host".into()];
    cfg.filter_by_regex = vec!["^test".into()];
    cfg.enable_count_measurement = true;
    let mut exporter = env.exporter(cfg);

    let report = exporter.export_file(&path).unwrap();
    assert_eq!(report.rows, 4);
    assert_eq!(report.admitted, 3);
    assert_eq!(report.points, 4);

    let points = points(&exporter);
    let values: Vec<_> = points[..3]
        .iter()
        .map(|p| p.get_field("value").cloned())
        .collect();
    assert_eq!(
        values,
        vec![
            Some(FieldValue::Integer(1)),
            Some(FieldValue::Integer(2)),
            Some(FieldValue::Integer(4)),
        ]
    );

    let count = &points[3];
    assert_eq!(count.measurement, "weather.count");
    assert!(count.tags.is_empty());
    assert_eq!(count.timestamp, 4_000_000_000);
    assert_eq!(count.get_field("total"), Some(&FieldValue::Integer(4)));
    assert_eq!(count.get_field("match_level"), Some(&FieldValue::Integer(2)));
    assert_eq!(count.get_field("filter_host"), Some(&FieldValue::Integer(2)));
}

#[test]
fn count_measurement_without_admitted_rows_uses_zero_timestamp() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,level,value\n5,info,1\n");

    let mut cfg = config(&["value"]);
    cfg.match_columns = vec!["level".into()];
    cfg.match_by_string = vec!["warn".into()];
    cfg.enable_count_measurement = true;
    let mut exporter = env.exporter(cfg);
    exporter.export_file(&path).unwrap();

    let points = points(&exporter);
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].measurement, "weather.count");
    assert_eq!(points[0].timestamp, 0);
    assert_eq!(points[0].get_field("match_level"), Some(&FieldValue::Integer(0)));
}

#[test]
fn missing_time_column_uses_file_modification_time() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "station,value\nnorth,1\nsouth,2\n");
    let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_577_836_800);
    std::fs::File::options()
        .write(true)
        .open(&path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();

    let mut cfg = config(&["value"]);
    cfg.tag_columns = vec!["station".into()];
    let mut exporter = env.exporter(cfg);
    exporter.export_file(&path).unwrap();

    for point in points(&exporter) {
        assert_eq!(point.timestamp, 1_577_836_800_000_000_000);
        assert_eq!(point.get_tag("timestamp"), Some("2020-01-01 00:00:00"));
        assert_eq!(
            point.get_field("timestamp"),
            Some(&FieldValue::String("2020-01-01 00:00:00".into()))
        );
    }

    let (headers, rows) = read_sidecar(&path);
    assert_eq!(headers, vec!["station", "value", "timestamp", CHECKSUM_COLUMN]);
    assert_eq!(rows[0][2], "2020-01-01 00:00:00");
}

#[test]
fn sink_type_conflict_aborts_and_keeps_previous_record() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,value\n1,1\n");

    let mut sink = RecordingSink::new();
    sink.fail_writes("field type conflict: input field \"value\" is type integer");
    let mut exporter = Exporter::new(config(&["value"]), sink).unwrap();

    let err = exporter.export_file(&path).unwrap_err();
    assert!(matches!(err, ExportError::TypeConflict { .. }));
    assert!(err.to_string().contains("--force-float-columns"));
    assert!(!sidecar_path(&path).exists());
}

#[test]
fn unparseable_time_aborts_the_run() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,value\n01/02/2020,1\n");

    let mut exporter = env.exporter(config(&["value"]));
    let err = exporter.export_file(&path).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Unexpected time with format: 01/02/2020, %Y-%m-%d %H:%M:%S"
    );
}

#[test]
fn directory_export_ignores_sidecars() {
    let env = TestEnv::new();
    env.write("a.csv", "timestamp,value\n1,1\n");
    env.write("b.csv", "timestamp,value\n2,2\n");
    env.write("notes.txt", "not a csv");

    let files = discover_csv_files(env.dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let mut exporter = env.exporter(config(&["value"]));
    let reports = exporter.export_all(&files).unwrap();
    assert!(reports.iter().all(|r| r.status == FileStatus::Exported));

    // sidecars now exist but are not inputs
    let files = discover_csv_files(env.dir.path()).unwrap();
    assert_eq!(files.len(), 2);

    let mut rerun = env.exporter(config(&["value"]));
    let reports = rerun.export_all(&files).unwrap();
    assert!(reports.iter().all(|r| r.status == FileStatus::Unchanged));
}

#[test]
fn unique_marker_is_added_as_field_and_tag() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,value\n1,1\n1,1\n");

    let mut cfg = config(&["value"]);
    cfg.tag_columns = vec!["value".into()];
    cfg.unique = true;
    let mut exporter = env.exporter(cfg);
    exporter.export_file(&path).unwrap();

    let points = points(&exporter);
    let first = points[0].get_tag(UNIQUE_KEY).unwrap();
    let second = points[1].get_tag(UNIQUE_KEY).unwrap();
    assert!(first.starts_with("uniq-"));
    assert_eq!(first.len(), "uniq-".len() + 8);
    assert_ne!(first, second);
    assert!(points[0].get_field(UNIQUE_KEY).is_some());
}

#[test]
fn wildcard_columns_select_every_header() {
    let env = TestEnv::new();
    let path = env.write("data.csv", "timestamp,a,b\n1,x,2\n");

    let mut cfg = config(&["*"]);
    cfg.tag_columns = vec!["a".into(), "missing".into()];
    let mut exporter = env.exporter(cfg);
    exporter.export_file(&path).unwrap();

    let point = &points(&exporter)[0];
    assert_eq!(point.fields.len(), 3);
    assert_eq!(point.get_tag("a"), Some("x"));
    assert_eq!(point.tags.len(), 1);
}
