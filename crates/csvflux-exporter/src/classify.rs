//! Match/filter row classification
//!
//! A row is checked twice: once against the match columns and once against the
//! filter columns. A column "hits" when its raw value equals one of the
//! configured literals or any configured regex finds it (case-insensitive).
//!
//! - Match status is the AND of the per-column hits.
//! - Filter status is the OR of the per-column hits.
//! - An empty checked set yields `false` for both.
//!
//! Hit counters live in [`FileCounters`], created per file and handed back to
//! the caller for the count measurement.

use regex::Regex;
use std::collections::{BTreeMap, HashSet};

use crate::source::Row;

/// Which of the two checks is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    Match,
    Filter,
}

/// Literal values and patterns that make a column hit
#[derive(Debug, Clone, Default)]
pub struct CheckRule {
    columns: Vec<String>,
    literals: HashSet<String>,
    patterns: Vec<Regex>,
}

impl CheckRule {
    /// `patterns` are expected to be compiled case-insensitive
    pub fn new(columns: Vec<String>, literals: Vec<String>, patterns: Vec<Regex>) -> Self {
        Self {
            columns,
            literals: literals.into_iter().collect(),
            patterns,
        }
    }

    /// Whether any check column survived validation
    pub fn is_configured(&self) -> bool {
        !self.columns.is_empty()
    }

    fn is_check_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Does this raw value hit?
    pub fn hits(&self, value: &str) -> bool {
        self.literals.contains(value) || self.patterns.iter().any(|p| p.is_match(value))
    }
}

/// Per-file hit counters
///
/// Match counters start at 0 and count hits. Filter counters start at the
/// file's row count and count down, so they read as rows not filtered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCounters {
    row_count: i64,
    matches: BTreeMap<String, i64>,
    filters: BTreeMap<String, i64>,
}

impl FileCounters {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count: row_count as i64,
            ..Default::default()
        }
    }

    pub fn row_count(&self) -> i64 {
        self.row_count
    }

    pub fn matches(&self) -> &BTreeMap<String, i64> {
        &self.matches
    }

    pub fn filters(&self) -> &BTreeMap<String, i64> {
        &self.filters
    }

    fn init(&mut self, mode: CheckMode, column: &str) {
        match mode {
            CheckMode::Match => {
                self.matches.entry(column.to_string()).or_insert(0);
            }
            CheckMode::Filter => {
                let start = self.row_count;
                self.filters.entry(column.to_string()).or_insert(start);
            }
        }
    }

    fn record_hit(&mut self, mode: CheckMode, column: &str) {
        match mode {
            CheckMode::Match => *self.matches.entry(column.to_string()).or_insert(0) += 1,
            CheckMode::Filter => {
                let start = self.row_count;
                *self.filters.entry(column.to_string()).or_insert(start) -= 1
            }
        }
    }

    /// Empty all counters; the row count is kept
    pub fn reset(&mut self) {
        self.matches.clear();
        self.filters.clear();
    }
}

/// Run one check over a row, updating the counters
///
/// Returns the row-level status: AND of per-column hits for
/// [`CheckMode::Match`], OR for [`CheckMode::Filter`], `false` when no check
/// column appears in the row.
pub fn check_row(row: &Row, rule: &CheckRule, mode: CheckMode, counters: &mut FileCounters) -> bool {
    let mut statuses = Vec::with_capacity(rule.columns.len());

    for (column, value) in row.iter() {
        if !rule.is_check_column(column) {
            continue;
        }
        counters.init(mode, column);

        let hit = rule.hits(value);
        if hit {
            counters.record_hit(mode, column);
        }
        statuses.push(hit);
    }

    if statuses.is_empty() {
        return false;
    }
    match mode {
        CheckMode::Match => statuses.iter().all(|s| *s),
        CheckMode::Filter => statuses.iter().any(|s| *s),
    }
}

/// Admission decision from the two statuses
///
/// | match configured | filter configured | admitted when |
/// |---|---|---|
/// | yes | no | match status |
/// | no | yes | not filter status |
/// | yes | yes | not (no match and filtered) |
/// | no | no | always |
pub fn admit(
    match_configured: bool,
    filter_configured: bool,
    match_status: bool,
    filter_status: bool,
) -> bool {
    match (match_configured, filter_configured) {
        (true, false) => match_status,
        (false, true) => !filter_status,
        (true, true) => !(!match_status && filter_status),
        (false, false) => true,
    }
}

/// Match and filter rules of one file
#[derive(Debug, Clone, Default)]
pub struct MatchFilterEngine {
    match_rule: CheckRule,
    filter_rule: CheckRule,
}

impl MatchFilterEngine {
    pub fn new(match_rule: CheckRule, filter_rule: CheckRule) -> Self {
        Self {
            match_rule,
            filter_rule,
        }
    }

    /// Check a row against both rules and decide whether it is exported
    pub fn classify(&self, row: &Row, counters: &mut FileCounters) -> bool {
        let match_status = check_row(row, &self.match_rule, CheckMode::Match, counters);
        let filter_status = check_row(row, &self.filter_rule, CheckMode::Filter, counters);
        admit(
            self.match_rule.is_configured(),
            self.filter_rule.is_configured(),
            match_status,
            filter_status,
        )
    }
}
