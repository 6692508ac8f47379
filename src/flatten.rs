//! Project item → flat record conversion.
//!
//! Every item becomes one [`FlatRecord`]: a fixed set of base columns taken
//! from the item's content, plus one `field:<name>` column per custom field
//! value the item carries.

use indexmap::IndexMap;

use crate::types::{FieldValue, ItemContent, ProjectItem, TrackedContent};

/// Prefix separating custom-field columns from base columns.
pub const FIELD_COLUMN_PREFIX: &str = "field:";

/// Base column headers, in output order.
pub const BASE_COLUMNS: [&str; 13] = [
    "project_item_id",
    "type",
    "title",
    "url",
    "repo",
    "number",
    "state",
    "assignees",
    "labels",
    "milestone",
    "milestone_due",
    "createdAt",
    "updatedAt",
];

/// Column key for a custom field name.
pub fn field_column(name: &str) -> String {
    format!("{FIELD_COLUMN_PREFIX}{name}")
}

/// One exported row.
///
/// Base columns are `None` when not applicable to the item's content type
/// and `Some("")` when intentionally blank. Both serialize as an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRecord {
    pub item_id: String,
    pub kind: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub repo: Option<String>,
    pub number: Option<String>,
    pub state: Option<String>,
    pub assignees: Option<String>,
    pub labels: Option<String>,
    pub milestone: Option<String>,
    pub milestone_due: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// `field:<name>` → display value, in the order the item listed them.
    pub custom: IndexMap<String, String>,
}

impl FlatRecord {
    /// Base column values, aligned with [`BASE_COLUMNS`].
    pub fn base_values(&self) -> [Option<&str>; 13] {
        [
            Some(self.item_id.as_str()),
            self.kind.as_deref(),
            self.title.as_deref(),
            self.url.as_deref(),
            self.repo.as_deref(),
            self.number.as_deref(),
            self.state.as_deref(),
            self.assignees.as_deref(),
            self.labels.as_deref(),
            self.milestone.as_deref(),
            self.milestone_due.as_deref(),
            self.created_at.as_deref(),
            self.updated_at.as_deref(),
        ]
    }

    /// Look up any column by header name, base or custom.
    pub fn get(&self, column: &str) -> Option<&str> {
        if let Some(idx) = BASE_COLUMNS.iter().position(|c| *c == column) {
            return self.base_values()[idx];
        }
        self.custom.get(column).map(String::as_str)
    }
}

/// Flatten one project item. Pure: no I/O, same input → same record.
pub fn flatten(item: &ProjectItem) -> FlatRecord {
    let mut record = FlatRecord {
        item_id: item.id.clone(),
        kind: item.content.type_tag().map(str::to_owned),
        ..FlatRecord::default()
    };

    match &item.content {
        ItemContent::Issue(content) | ItemContent::PullRequest(content) => {
            copy_tracked(&mut record, content);
        }
        ItemContent::DraftIssue { title } => {
            record.title.clone_from(title);
            record.url = Some(String::new());
        }
        ItemContent::Other { .. } => {}
    }

    for field_value in &item.field_values {
        let Some(name) = field_value.field_name.as_deref().filter(|n| !n.is_empty()) else {
            continue;
        };
        // A repeated name keeps its first position; the later value wins.
        record
            .custom
            .insert(field_column(name), render_field_value(&field_value.value));
    }

    record
}

fn copy_tracked(record: &mut FlatRecord, content: &TrackedContent) {
    record.title.clone_from(&content.title);
    record.url.clone_from(&content.url);
    record.number = content.number.map(|n| n.to_string());
    record.state.clone_from(&content.state);
    record.repo.clone_from(&content.repo);
    record.assignees = Some(content.assignees.join(", "));
    record.labels = Some(content.labels.join(", "));
    if let Some(milestone) = &content.milestone {
        record.milestone = Some(milestone.title.clone());
        record.milestone_due.clone_from(&milestone.due_on);
    }
    record.created_at.clone_from(&content.created_at);
    record.updated_at.clone_from(&content.updated_at);
}

/// Render a custom field value as a single display string.
///
/// Unknown value types and missing nested data render as `""`.
pub fn render_field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Text(text) | FieldValue::Date(text) | FieldValue::Repository(text) => {
            text.clone().unwrap_or_default()
        }
        FieldValue::Number(number) => number.map(format_number).unwrap_or_default(),
        FieldValue::SingleSelect { name, .. } => name.clone().unwrap_or_default(),
        FieldValue::Iteration { title, .. } => title.clone().unwrap_or_default(),
        FieldValue::Milestone(milestone) => milestone
            .as_ref()
            .map(|m| m.title.clone())
            .unwrap_or_default(),
        FieldValue::PullRequests(prs) => prs
            .iter()
            .map(|pr| format!("#{}", pr.number))
            .collect::<Vec<_>>()
            .join(", "),
        FieldValue::Users(logins) => logins.join(", "),
        FieldValue::Unsupported { .. } => String::new(),
    }
}

/// Integral numbers render without a fractional part (`3`, not `3.0`).
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        #[allow(clippy::cast_possible_truncation)]
        let whole = n as i64;
        whole.to_string()
    } else {
        n.to_string()
    }
}
