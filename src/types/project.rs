use serde::Deserialize;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Declared data type of a project custom field (`ProjectV2FieldType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldDataType {
    Assignees,
    Date,
    IssueType,
    Iteration,
    Labels,
    LinkedPullRequests,
    Milestone,
    Number,
    ParentIssue,
    Repository,
    Reviewers,
    SingleSelect,
    SubIssuesProgress,
    Text,
    Title,
    TrackedBy,
    Tracks,
    #[serde(other)]
    Unknown,
}

impl FieldDataType {
    /// Stable display name, matching the GraphQL enum spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assignees => "ASSIGNEES",
            Self::Date => "DATE",
            Self::IssueType => "ISSUE_TYPE",
            Self::Iteration => "ITERATION",
            Self::Labels => "LABELS",
            Self::LinkedPullRequests => "LINKED_PULL_REQUESTS",
            Self::Milestone => "MILESTONE",
            Self::Number => "NUMBER",
            Self::ParentIssue => "PARENT_ISSUE",
            Self::Repository => "REPOSITORY",
            Self::Reviewers => "REVIEWERS",
            Self::SingleSelect => "SINGLE_SELECT",
            Self::SubIssuesProgress => "SUB_ISSUES_PROGRESS",
            Self::Text => "TEXT",
            Self::Title => "TITLE",
            Self::TrackedBy => "TRACKED_BY",
            Self::Tracks => "TRACKS",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// Whose namespace the project number is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OwnerKind {
    #[default]
    User,
    Organization,
}

/// Owner login plus the namespace it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Owner {
    pub login: String,
    pub kind: OwnerKind,
}

impl Owner {
    pub fn user(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: OwnerKind::User,
        }
    }

    pub fn organization(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            kind: OwnerKind::Organization,
        }
    }
}

// ---------------------------------------------------------------------------
// Project descriptor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: String,
    pub name: String,
    pub data_type: FieldDataType,
    /// Only set for single-select fields.
    pub options: Option<Vec<SelectOption>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub id: String,
    pub name: String,
    /// Raw filter text as typed in the web UI.
    pub filter: Option<String>,
}

/// Resolved project metadata. Immutable for the duration of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDescriptor {
    pub id: String,
    pub title: String,
    pub number: u32,
    pub url: String,
    pub fields: Vec<FieldDescriptor>,
    pub views: Vec<ViewDescriptor>,
    /// Login of the authenticated user, used to expand `@me` in filters.
    pub viewer_login: Option<String>,
}

impl ProjectDescriptor {
    /// Find a saved view by name, ignoring case and surrounding whitespace.
    pub fn find_view(&self, name: &str) -> Option<&ViewDescriptor> {
        let wanted = name.trim().to_lowercase();
        self.views
            .iter()
            .find(|v| v.name.trim().to_lowercase() == wanted)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}
