//! Per-value type coercion
//!
//! Each value goes through an ordered list of [`CoerceRule`]s (truncate, then
//! force string, int, float), followed by the empty-value sentinel policy: an
//! empty result becomes `-999`, `-999.0` or `-` depending on the inferred
//! column type, and a forced type on the column overrides that choice.
//!
//! Coercion is best effort. A value that cannot be forced keeps its previous
//! representation and a warning is logged.

use crate::config::ExportConfig;
use crate::source::{Row, TypeHint, TypeHints};
use csvflux_core::FieldValue;
use std::collections::HashSet;
use tracing::warn;

/// Key of the synthetic field/tag added when `unique` is enabled
pub const UNIQUE_KEY: &str = "uniq";

/// Prefix of the synthetic `uniq` value
pub const UNIQUE_PREFIX: &str = "uniq-";

/// Sentinel for empty integer-like values
pub const EMPTY_INT: i64 = -999;

/// Sentinel for empty float-like values
pub const EMPTY_FLOAT: f64 = -999.0;

/// Sentinel for empty text values
pub const EMPTY_TEXT: &str = "-";

/// Target type of a force directive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedType {
    String,
    Int,
    Float,
}

impl ForcedType {
    /// Sentinel an empty value takes when this type is forced
    pub fn sentinel(self) -> FieldValue {
        match self {
            ForcedType::String => FieldValue::String(EMPTY_TEXT.to_string()),
            ForcedType::Int => FieldValue::Integer(EMPTY_INT),
            ForcedType::Float => FieldValue::Float(EMPTY_FLOAT),
        }
    }
}

/// One step of the coercion pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoerceRule {
    /// Keep at most this many characters of the text form
    Truncate(usize),
    /// Convert to the given type
    Force(ForcedType),
}

impl CoerceRule {
    /// Apply this rule; a failed conversion returns the value unchanged
    pub fn apply(&self, value: FieldValue) -> FieldValue {
        match self {
            CoerceRule::Truncate(max) => {
                FieldValue::String(value.to_text().chars().take(*max).collect())
            }
            CoerceRule::Force(ForcedType::String) => FieldValue::String(value.to_text()),
            CoerceRule::Force(ForcedType::Int) => match value.to_integer() {
                Some(v) => FieldValue::Integer(v),
                None => {
                    warn!("Failed to force \"{}\" to int, skip...", value);
                    value
                }
            },
            CoerceRule::Force(ForcedType::Float) => match value.to_float() {
                Some(v) => FieldValue::Float(v),
                None => {
                    warn!("Failed to force \"{}\" to float, skip...", value);
                    value
                }
            },
        }
    }
}

/// One step of the empty-value policy; later rules override earlier ones
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelRule {
    /// Sentinel picked from the inferred column type
    Inferred(TypeHint),
    /// Sentinel dictated by a force directive
    Forced(ForcedType),
}

impl SentinelRule {
    pub fn sentinel(&self) -> FieldValue {
        match self {
            SentinelRule::Inferred(hint) if hint.int_like => FieldValue::Integer(EMPTY_INT),
            SentinelRule::Inferred(hint) if hint.float_like => FieldValue::Float(EMPTY_FLOAT),
            SentinelRule::Inferred(_) => FieldValue::String(EMPTY_TEXT.to_string()),
            SentinelRule::Forced(forced) => forced.sentinel(),
        }
    }
}

/// Evaluate sentinel rules in order; each applicable rule overrides the previous one
pub fn resolve_sentinel(rules: &[SentinelRule]) -> FieldValue {
    rules
        .last()
        .map(SentinelRule::sentinel)
        .unwrap_or_else(|| FieldValue::String(EMPTY_TEXT.to_string()))
}

/// Column-aware coercion driven by the export configuration
#[derive(Debug, Clone, Default)]
pub struct TypeCoercer {
    limit_columns: HashSet<String>,
    limit_length: usize,
    force_string: HashSet<String>,
    force_int: HashSet<String>,
    force_float: HashSet<String>,
    unique: bool,
}

impl TypeCoercer {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            limit_columns: config.limit_string_length_columns.iter().cloned().collect(),
            limit_length: config.limit_length,
            force_string: config.force_string_columns.iter().cloned().collect(),
            force_int: config.force_int_columns.iter().cloned().collect(),
            force_float: config.force_float_columns.iter().cloned().collect(),
            unique: config.unique,
        }
    }

    /// Force directives configured for a column, in evaluation order
    pub fn forced_types(&self, column: &str) -> Vec<ForcedType> {
        let mut forced = Vec::new();
        if self.force_string.contains(column) {
            forced.push(ForcedType::String);
        }
        if self.force_int.contains(column) {
            forced.push(ForcedType::Int);
        }
        if self.force_float.contains(column) {
            forced.push(ForcedType::Float);
        }
        forced
    }

    /// Coercion rules for a column, in evaluation order
    pub fn rules_for(&self, column: &str) -> Vec<CoerceRule> {
        let mut rules = Vec::new();
        if self.limit_columns.contains(column) {
            rules.push(CoerceRule::Truncate(self.limit_length + 1));
        }
        rules.extend(self.forced_types(column).into_iter().map(CoerceRule::Force));
        rules
    }

    /// Sentinel rules for a column, in evaluation order
    pub fn sentinel_rules_for(&self, column: &str, hint: TypeHint) -> Vec<SentinelRule> {
        let mut rules = vec![SentinelRule::Inferred(hint)];
        rules.extend(self.forced_types(column).into_iter().map(SentinelRule::Forced));
        rules
    }

    /// Coerce one raw value of `column`
    pub fn coerce_value(&self, column: &str, raw: &str, hint: TypeHint) -> FieldValue {
        let value = self
            .rules_for(column)
            .iter()
            .fold(hint.type_value(raw), |value, rule| rule.apply(value));

        if value.is_empty_text() {
            resolve_sentinel(&self.sentinel_rules_for(column, hint))
        } else {
            value
        }
    }

    /// Coerce the given columns of a row, appending the `uniq` marker when enabled
    pub fn coerce_row(
        &self,
        columns: &[String],
        row: &Row,
        hints: &TypeHints,
    ) -> Vec<(String, FieldValue)> {
        let mut values: Vec<(String, FieldValue)> = columns
            .iter()
            .map(|column| {
                let raw = row.get(column).unwrap_or_default();
                (
                    column.clone(),
                    self.coerce_value(column, raw, hints.get(column)),
                )
            })
            .collect();

        if self.unique {
            values.push((UNIQUE_KEY.to_string(), FieldValue::String(unique_marker())));
        }
        values
    }
}

/// `uniq-` followed by 8 hex characters of a fresh random UUID
pub fn unique_marker() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", UNIQUE_PREFIX, &id[..8])
}
