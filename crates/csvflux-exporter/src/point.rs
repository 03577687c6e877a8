//! Row to point assembly

use crate::coerce::TypeCoercer;
use crate::columns::ColumnSet;
use crate::error::Result;
use crate::source::{Row, TypeHints};
use csvflux_core::{Point, Timestamp};

/// Builds the points of one file
///
/// The measurement, column roles and type hints are fixed per file; the
/// timestamp is supplied per row.
pub struct RowPointBuilder<'a> {
    measurement: &'a str,
    columns: &'a ColumnSet,
    hints: &'a TypeHints,
    coercer: &'a TypeCoercer,
}

impl<'a> RowPointBuilder<'a> {
    pub fn new(
        measurement: &'a str,
        columns: &'a ColumnSet,
        hints: &'a TypeHints,
        coercer: &'a TypeCoercer,
    ) -> Self {
        Self {
            measurement,
            columns,
            hints,
            coercer,
        }
    }

    /// Assemble the point for an admitted row
    ///
    /// Tag values are rendered as text; field values keep their coerced type.
    pub fn build(&self, row: &Row, timestamp: Timestamp) -> Result<Point> {
        let mut builder = Point::builder(self.measurement).timestamp(timestamp);

        for (key, value) in self.coercer.coerce_row(&self.columns.tags, row, self.hints) {
            builder = builder.tag(key, value.to_text());
        }
        for (key, value) in self.coercer.coerce_row(&self.columns.fields, row, self.hints) {
            builder = builder.field(key, value);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExportConfig;
    use crate::source::{Header, TypeHint};
    use csvflux_core::FieldValue;
    use std::sync::Arc;

    #[test]
    fn test_build_point_from_row() {
        let config = ExportConfig::new("weather", vec!["temp".into()]);
        let coercer = TypeCoercer::from_config(&config);
        let columns = ColumnSet {
            fields: vec!["temp".into(), "note".into()],
            tags: vec!["station".into(), "temp".into()],
            ..Default::default()
        };
        let mut hints = TypeHints::default();
        hints.insert(
            "temp",
            TypeHint {
                int_like: false,
                float_like: true,
            },
        );

        let header = Arc::new(Header::new(vec!["station".into(), "temp".into(), "note".into()]));
        let row = Row::new(header, vec!["north".into(), "21.5".into(), "".into()]);

        let point = RowPointBuilder::new("weather", &columns, &hints, &coercer)
            .build(&row, 42)
            .unwrap();

        assert_eq!(point.measurement, "weather");
        assert_eq!(point.timestamp, 42);
        assert_eq!(point.get_tag("station"), Some("north"));
        assert_eq!(point.get_tag("temp"), Some("21.5"));
        assert_eq!(point.get_field("temp"), Some(&FieldValue::Float(21.5)));
        assert_eq!(point.get_field("note"), Some(&FieldValue::String("-".into())));
    }

    #[test]
    fn test_build_point_without_tags() {
        let config = ExportConfig::new("m", vec!["v".into()]);
        let coercer = TypeCoercer::from_config(&config);
        let columns = ColumnSet {
            fields: vec!["v".into()],
            ..Default::default()
        };
        let header = Arc::new(Header::new(vec!["v".into()]));
        let row = Row::new(header, vec!["x".into()]);

        let point = RowPointBuilder::new("m", &columns, &TypeHints::default(), &coercer)
            .build(&row, 0)
            .unwrap();
        assert!(point.tags.is_empty());
        assert_eq!(point.fields.len(), 1);
    }
}
