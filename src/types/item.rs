// ---------------------------------------------------------------------------
// Item content
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Milestone {
    pub title: String,
    pub due_on: Option<String>,
}

/// The fields shared by issues and pull requests.
///
/// Timestamps and state are kept as the API spelled them; the export copies
/// them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackedContent {
    pub number: Option<u64>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub state: Option<String>,
    /// `owner/name` of the repository.
    pub repo: Option<String>,
    pub assignees: Vec<String>,
    pub labels: Vec<String>,
    pub milestone: Option<Milestone>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// What a project item points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemContent {
    Issue(TrackedContent),
    PullRequest(TrackedContent),
    DraftIssue {
        title: Option<String>,
    },
    /// Any content type this exporter does not model, or no content at all
    /// (`typename` is `None` when the API returned `content: null`).
    Other {
        typename: Option<String>,
    },
}

impl ItemContent {
    /// The GraphQL type name, as written to the `type` column.
    pub fn type_tag(&self) -> Option<&str> {
        match self {
            Self::Issue(_) => Some("Issue"),
            Self::PullRequest(_) => Some("PullRequest"),
            Self::DraftIssue { .. } => Some("DraftIssue"),
            Self::Other { typename } => typename.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Custom field values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: Option<String>,
}

/// A custom field value, one case per `ProjectV2ItemField*Value` type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Number(Option<f64>),
    Date(Option<String>),
    SingleSelect {
        name: Option<String>,
        option_id: Option<String>,
    },
    Iteration {
        title: Option<String>,
        start_date: Option<String>,
        duration: Option<u32>,
    },
    Milestone(Option<Milestone>),
    /// `owner/name` of the referenced repository.
    Repository(Option<String>),
    PullRequests(Vec<PullRequestRef>),
    /// Logins.
    Users(Vec<String>),
    /// A value type the exporter does not understand yet.
    Unsupported { typename: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemFieldValue {
    /// Name of the custom field this value belongs to. `None` when the API
    /// did not report one; such values are not exported.
    pub field_name: Option<String>,
    pub value: FieldValue,
}

/// One entry on the project board, as returned by the item listing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectItem {
    pub id: String,
    pub content: ItemContent,
    pub field_values: Vec<ItemFieldValue>,
}
