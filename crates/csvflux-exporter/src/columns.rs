//! Column list resolution against a file's headers

use tracing::warn;

/// Wildcard that selects every header
pub const ALL_COLUMNS: &str = "*";

/// Resolve a configured column list against the discovered headers.
///
/// `["*"]` expands to all headers. Configured columns missing from the headers
/// are dropped with a warning; the rest keep their configured order. An empty
/// result means the file has no usable columns for this role.
pub fn resolve_columns(headers: &[String], configured: &[String]) -> Vec<String> {
    if configured.len() == 1 && configured[0] == ALL_COLUMNS {
        return headers.to_vec();
    }

    let (present, missing): (Vec<&String>, Vec<&String>) =
        configured.iter().partition(|c| headers.contains(c));

    if !missing.is_empty() {
        warn!(
            "Not all columns {:?} in csv headers {:?}. Those columns will be ignored: {:?}",
            configured, headers, missing
        );
    }

    let mut resolved: Vec<String> = Vec::with_capacity(present.len());
    for column in present {
        if !resolved.contains(column) {
            resolved.push(column.clone());
        }
    }
    resolved
}

/// The four column roles of one file, resolved against its headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    pub fields: Vec<String>,
    pub tags: Vec<String>,
    pub matches: Vec<String>,
    pub filters: Vec<String>,
}

impl ColumnSet {
    pub fn resolve(
        headers: &[String],
        fields: &[String],
        tags: &[String],
        matches: &[String],
        filters: &[String],
    ) -> Self {
        Self {
            fields: resolve_columns(headers, fields),
            tags: resolve_columns(headers, tags),
            matches: resolve_columns(headers, matches),
            filters: resolve_columns(headers, filters),
        }
    }

    /// Add an injected column as both field and tag
    pub fn add_field_and_tag(&mut self, column: &str) {
        if !self.fields.iter().any(|c| c == column) {
            self.fields.push(column.to_string());
        }
        if !self.tags.iter().any(|c| c == column) {
            self.tags.push(column.to_string());
        }
    }
}
