//! Best-effort emulation of a saved view's filter expression.
//!
//! GitHub's project filter language is much richer than what is handled
//! here. Only three kinds of terms are recognized:
//!
//! - `status:<value>[,<value>...]` → exact (case-insensitive) match on the
//!   `field:Status` column; skipped when no record has that column
//! - `assignee:` / `assignees:` → substring of the `assignees` column, with a
//!   leading `@` stripped and `@me` expanded to the viewer's login
//! - `label:` / `labels:` → substring of the `labels` column
//!
//! Terms of the same kind are OR-ed together; the kinds are AND-ed. Every
//! other term (negations, date ranges, `sort:`, free text) is collected as
//! ignored, so a view using only advanced syntax exports unfiltered. Parsing
//! never fails.

use crate::flatten::{FlatRecord, field_column};
use crate::snapshot::Schema;

/// Name of the custom field the `status:` qualifier targets.
pub const STATUS_FIELD: &str = "Status";

const ME: &str = "@me";

/// One token of a filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Status(Vec<String>),
    Assignee(Vec<String>),
    Label(Vec<String>),
    /// Anything not in the supported subset, kept verbatim.
    Ignored(String),
}

/// Split an expression on whitespace, keeping double-quoted runs together.
fn tokenize(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in expr.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Split a qualifier value on commas, unquote and lowercase each part.
fn split_values(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|v| v.trim().trim_matches('"').trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

/// Classify a single token.
pub fn parse_term(token: &str) -> Term {
    let ignored = || Term::Ignored(token.to_owned());

    let Some((key, raw_value)) = token.split_once(':') else {
        return ignored();
    };
    let values = split_values(raw_value);
    if values.is_empty() {
        return ignored();
    }

    match key.to_lowercase().as_str() {
        "status" => Term::Status(values),
        "assignee" | "assignees" => Term::Assignee(
            values
                .into_iter()
                .map(|v| {
                    if v == ME {
                        v
                    } else {
                        v.trim_start_matches('@').to_owned()
                    }
                })
                .filter(|v| !v.is_empty())
                .collect(),
        ),
        "label" | "labels" => Term::Label(values),
        _ => ignored(),
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewFilter {
    status: Vec<String>,
    assignees: Vec<String>,
    labels: Vec<String>,
    ignored: Vec<String>,
}

impl ViewFilter {
    pub fn parse(expr: &str) -> Self {
        let mut filter = Self::default();
        for token in tokenize(expr) {
            match parse_term(&token) {
                Term::Status(v) => filter.status.extend(v),
                Term::Assignee(v) if !v.is_empty() => filter.assignees.extend(v),
                Term::Label(v) => filter.labels.extend(v),
                Term::Assignee(_) => filter.ignored.push(token),
                Term::Ignored(t) => filter.ignored.push(t),
            }
        }
        filter
    }

    /// Expand `@me` to `login`. Without a login, `@me` degrades to the
    /// literal substring `me`.
    pub fn with_viewer(mut self, login: Option<&str>) -> Self {
        let replacement = login.map_or_else(|| "me".to_owned(), str::to_lowercase);
        for value in &mut self.assignees {
            if value == ME {
                value.clone_from(&replacement);
            }
        }
        self
    }

    /// Whether no recognized term was found.
    pub fn is_empty(&self) -> bool {
        self.status.is_empty() && self.assignees.is_empty() && self.labels.is_empty()
    }

    /// Terms that were not understood and therefore not applied.
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    pub fn status_values(&self) -> &[String] {
        &self.status
    }

    pub fn assignee_values(&self) -> &[String] {
        &self.assignees
    }

    pub fn label_values(&self) -> &[String] {
        &self.labels
    }

    /// Keep the records matching every recognized group, preserving order.
    pub fn apply(&self, records: Vec<FlatRecord>) -> Vec<FlatRecord> {
        if self.is_empty() {
            return records;
        }

        let status_column = field_column(STATUS_FIELD);
        let status_active =
            !self.status.is_empty() && Schema::collect(&records).has_column(&status_column);
        if !self.status.is_empty() && !status_active {
            tracing::info!("filter: no {status_column} column; status terms skipped");
        }

        records
            .into_iter()
            .filter(|record| {
                if status_active {
                    let status = record.get(&status_column).unwrap_or("").to_lowercase();
                    if !self.status.contains(&status) {
                        return false;
                    }
                }
                contains_any(record.assignees.as_deref(), &self.assignees)
                    && contains_any(record.labels.as_deref(), &self.labels)
            })
            .collect()
    }
}

/// `true` when `wanted` is empty or any entry is a substring of `cell`.
fn contains_any(cell: Option<&str>, wanted: &[String]) -> bool {
    if wanted.is_empty() {
        return true;
    }
    let cell = cell.unwrap_or("").to_lowercase();
    wanted.iter().any(|w| cell.contains(w.as_str()))
}

/// Narrow `records` by a view's filter expression.
///
/// Absent or blank expressions return the input unchanged. With no viewer
/// login at hand, `@me` matches the substring `me`.
pub fn apply(records: Vec<FlatRecord>, expr: Option<&str>) -> Vec<FlatRecord> {
    match expr.map(str::trim) {
        Some(expr) if !expr.is_empty() => {
            ViewFilter::parse(expr).with_viewer(None).apply(records)
        }
        _ => records,
    }
}
