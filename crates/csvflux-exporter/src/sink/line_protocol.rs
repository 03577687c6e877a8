//! InfluxDB line protocol encoding

use csvflux_core::{FieldValue, Point};

/// Convert points to newline-separated line protocol
pub fn points_to_line_protocol(points: &[Point]) -> String {
    let mut lines = Vec::with_capacity(points.len());

    for point in points {
        lines.push(point_to_line(point));
    }

    lines.join("\n")
}

/// Encode a single point
pub fn point_to_line(point: &Point) -> String {
    let mut line = escape_measurement(&point.measurement);

    for tag in &point.tags {
        // The protocol has no representation for an empty tag value
        if tag.value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(&tag.key));
        line.push('=');
        line.push_str(&escape_key(&tag.value));
    }

    line.push(' ');
    let fields: Vec<String> = point
        .fields
        .iter()
        .map(|f| format!("{}={}", escape_key(&f.key), field_value(&f.value)))
        .collect();
    line.push_str(&fields.join(","));

    line.push(' ');
    line.push_str(&point.timestamp.to_string());
    line
}

fn field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Float(_) => value.to_string(),
        FieldValue::Integer(v) => format!("{}i", v),
        FieldValue::String(v) => format!("\"{}\"", escape_string_value(v)),
    }
}

/// Line breaks end a line, so they are escaped everywhere
fn escape_line_breaks(s: &str) -> String {
    s.replace('\n', "\\n").replace('\r', "\\r")
}

/// Escape special characters in measurement names
fn escape_measurement(s: &str) -> String {
    escape_line_breaks(&s.replace(',', "\\,").replace(' ', "\\ "))
}

/// Escape special characters in tag keys, tag values and field keys
fn escape_key(s: &str) -> String {
    escape_line_breaks(
        &s.replace(',', "\\,")
            .replace('=', "\\=")
            .replace(' ', "\\ "),
    )
}

/// Escape special characters in string field values
fn escape_string_value(s: &str) -> String {
    escape_line_breaks(&s.replace('\\', "\\\\").replace('"', "\\\""))
}
